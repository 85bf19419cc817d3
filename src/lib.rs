pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod types;

// Ports between the pipeline and its collaborators
pub mod app;
pub mod infra;

pub mod observability;
pub mod pipeline;
