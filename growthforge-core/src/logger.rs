use csv::Writer;
use growthforge_schemas::{fit::LevelFit, metadata::ConditionKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// One predicted point of a fitted trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub species: String,
    pub carbon_source: String,
    pub cs_conc: f64,
    pub time: f64,
    pub predicted: f64,
}

pub struct TrajectoryLogger {
    writer: Writer<fs::File>,
}

impl TrajectoryLogger {
    pub fn new(path: &str) -> Result<Self, io::Error> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log_level(&mut self, key: &ConditionKey, level: &LevelFit) -> Result<(), anyhow::Error> {
        for point in &level.trajectory {
            self.writer.serialize(TrajectoryRow {
                species: key.species.clone(),
                carbon_source: key.carbon_source.clone(),
                cs_conc: level.cs_conc,
                time: point.time,
                predicted: point.predicted,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::load_trajectory_log;
    use growthforge_schemas::fit::TrajectoryPoint;
    use tempfile::tempdir;

    #[test]
    fn written_rows_read_back_grouped_by_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trajectories.csv");
        let path = path.to_str().unwrap();
        let key = ConditionKey::new("E. coli", "Glucose");

        let mut logger = TrajectoryLogger::new(path).unwrap();
        for conc in [20.0, 5.0] {
            let level = LevelFit {
                cs_conc: conc,
                linegroups: vec![format!("lg-{conc}")],
                trajectory: vec![
                    TrajectoryPoint { time: 1.5, predicted: 0.1 },
                    TrajectoryPoint { time: 2.0, predicted: 0.15 },
                ],
                skipped: None,
            };
            logger.log_level(&key, &level).unwrap();
        }
        drop(logger);

        let header = std::fs::read_to_string(path).unwrap();
        assert!(header.starts_with("species,carbon_source,cs_conc,time,predicted\n"));

        let levels = load_trajectory_log(path).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].0, (key.clone(), 20.0));
        assert_eq!(levels[1].1.len(), 2);
        assert_eq!(levels[1].1[1].predicted, 0.15);
    }
}
