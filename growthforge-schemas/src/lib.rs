pub mod chemostat;
pub mod file_formats;
pub mod fit;
pub mod measurement;
pub mod metadata;
pub mod settings;
