//! HTTP request handlers.

pub mod auth;
pub mod categories;
pub mod health;
pub mod permissions;
pub mod questions;
pub mod roles;
pub mod session_questions;
pub mod sessions;
pub mod users;
