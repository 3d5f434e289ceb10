pub mod chemostat;
pub mod integrator;
pub mod monod;
