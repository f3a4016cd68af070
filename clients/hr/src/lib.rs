//! HTTP client for the employee records API.
//!
//! One method per operation the list/form views need; each is a single round
//! trip against the path-keyed routes.

mod client;
mod config;
mod error;

pub use client::EmployeeClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};

pub use products_hr::{EmpId, Employee, Experience, Skill};
