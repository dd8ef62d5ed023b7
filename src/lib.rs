// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod alignment;
pub mod api;
pub mod app;
pub mod app_dirs;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod feedback;
pub mod library;
pub mod logging;
pub mod model;
pub mod passage;
pub mod pipeline;
pub mod playback;
pub mod runtime;
pub mod text;
pub mod ui;
