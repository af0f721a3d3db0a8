//! Application bootstrap
//!
//! Loads settings, installs logging and serves the proxy router until a
//! shutdown signal arrives.

pub mod app;
pub mod logging;

pub use app::Application;
