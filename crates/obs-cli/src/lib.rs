pub mod commands;
pub mod config;
pub mod pipeline;

pub use config::{Overrides, Settings};
pub use pipeline::{rerender_report, run_analysis, RunSummary};
