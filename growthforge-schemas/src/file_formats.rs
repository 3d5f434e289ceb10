use crate::settings::FitSettings;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SettingsFile {
    pub schema_version: String,
    #[serde(default)]
    pub settings: FitSettings,
}
