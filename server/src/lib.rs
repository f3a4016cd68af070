//! HTTP surface for the employee record store.

pub mod config;
pub mod http;

pub use config::AppConfig;
pub use http::{AppState, ServeConfig, build_router, serve};
