// Diffusion Sweep Module

pub mod config;
pub mod event_sinks;
pub mod runner;
pub mod stats;

// Re-export commonly used types
pub use config::SweepScenario;
pub use runner::SweepRunner;
pub use stats::seed_hex;
