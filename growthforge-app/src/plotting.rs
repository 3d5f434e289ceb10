//! PNG rendering of fitted growth curves and chemostat simulations.

use anyhow::Result;
use growthforge_core::simulation::chemostat::ChemostatRun;
use growthforge_schemas::{chemostat::SteadyState, metadata::ConditionKey};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

const PALETTE: [RGBColor; 6] = [
    RGBColor(255, 127, 14),
    RGBColor(214, 39, 40),
    RGBColor(140, 86, 75),
    RGBColor(127, 127, 127),
    RGBColor(23, 190, 207),
    RGBColor(44, 160, 44),
];

/// Observed and fitted curves of one concentration level.
#[derive(Debug, Clone)]
pub struct LevelCurve {
    pub cs_conc: f64,
    pub observed: Vec<(f64, f64)>,
    pub fitted: Vec<(f64, f64)>,
}

fn upper_limit<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let max = values.copied().filter(|v| v.is_finite()).fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// File name for a combination's figure, with anything but ASCII letters and
/// digits replaced.
pub fn figure_name(key: &ConditionKey) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    };
    format!("fit_{}_{}.png", clean(&key.species), clean(&key.carbon_source))
}

/// Draws observed data as solid lines and the fitted trajectories as dashed
/// lines, one colour per concentration level.
pub fn plot_fit_comparison(
    output_dir: &Path,
    key: &ConditionKey,
    curves: &[LevelCurve],
) -> Result<PathBuf> {
    let path = output_dir.join(figure_name(key));
    let root = BitMapBackend::new(&path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let all_points = || curves.iter().flat_map(|c| c.observed.iter().chain(&c.fitted));
    let max_time = upper_limit(all_points().map(|(t, _)| t)) / 1.1;
    let max_od = upper_limit(all_points().map(|(_, od)| od));

    let mut chart = ChartBuilder::on(&root)
        .caption(key.to_string(), ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..max_time, 0f64..max_od)?;

    chart.configure_mesh().x_desc("Time (h)").y_desc("OD600").draw()?;

    for (i, curve) in curves.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        chart.draw_series(LineSeries::new(curve.observed.iter().copied(), color.stroke_width(1)))?;
        chart
            .draw_series(DashedLineSeries::new(
                curve.fitted.iter().copied(),
                6,
                4,
                color.stroke_width(2),
            ))?
            .label(format!("{:.3}", curve.cs_conc))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(path.clone())
}

/// Species density and resource concentration of a chemostat run, side by side.
pub fn plot_chemostat_dynamics(output_dir: &Path, run: &ChemostatRun) -> Result<PathBuf> {
    let path = output_dir.join("chemostat_dynamics.png");
    let root = BitMapBackend::new(&path, (1400, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));
    let max_time = run.time.last().copied().unwrap_or(1.0).max(f64::MIN_POSITIVE);

    let series = [
        ("Species density", "OD", &run.density, BLUE),
        ("Resource concentration", "Concentration [mM]", &run.resource, RED),
    ];
    for (panel, (title, y_desc, values, color)) in panels.iter().zip(series) {
        let mut chart = ChartBuilder::on(panel)
            .caption(title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..max_time, 0f64..upper_limit(values.iter()))?;
        chart.configure_mesh().x_desc("Time [h]").y_desc(y_desc).draw()?;
        chart.draw_series(LineSeries::new(
            run.time.iter().copied().zip(values.iter().copied()),
            color.stroke_width(2),
        ))?;
    }

    root.present()?;
    Ok(path.clone())
}

/// R* and N* across dilution rates up to washout.
pub fn plot_steady_states(output_dir: &Path, curve: &[SteadyState]) -> Result<PathBuf> {
    let path = output_dir.join("chemostat_steady_states.png");
    let root = BitMapBackend::new(&path, (1400, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));
    let max_dilution = upper_limit(curve.iter().map(|s| &s.dilution)) / 1.1;

    let r_star: Vec<(f64, f64)> = curve.iter().map(|s| (s.dilution, s.r_star)).collect();
    let n_star: Vec<(f64, f64)> = curve.iter().map(|s| (s.dilution, s.n_star)).collect();
    let series = [
        ("R* across dilution rates", "R* [mM]", r_star, GREEN),
        ("N* across dilution rates", "N* [OD]", n_star, MAGENTA),
    ];
    for (panel, (title, y_desc, points, color)) in panels.iter().zip(series) {
        let mut chart = ChartBuilder::on(panel)
            .caption(title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(
                0f64..max_dilution,
                0f64..upper_limit(points.iter().map(|(_, y)| y)),
            )?;
        chart
            .configure_mesh()
            .x_desc("Dilution rates [1/h]")
            .y_desc(y_desc)
            .draw()?;
        chart.draw_series(LineSeries::new(points, color.stroke_width(2)))?;
    }

    root.present()?;
    Ok(path.clone())
}
