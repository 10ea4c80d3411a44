//! API module - HTTP handlers and middleware.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;
use crate::services::Services;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Services,
}

impl AppState {
    pub fn new(config: Arc<Config>, services: Services) -> Self {
        Self { config, services }
    }
}

pub type SharedState = Arc<AppState>;
