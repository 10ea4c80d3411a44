//! Tech Check - Backend Library
//!
//! Timed technical-assessment sessions with token authentication,
//! role-based permissions and a session engine.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
