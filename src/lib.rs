pub mod constants;
pub mod config;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

// Application use cases and the file-backed adapters behind their ports
pub mod app;
pub mod infra;
