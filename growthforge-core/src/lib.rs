pub mod analysis;
pub mod error;
pub mod estimation;
pub mod fitting;
pub mod logger;
pub mod preprocess;
pub mod simulation;
pub mod window;
