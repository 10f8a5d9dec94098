#![doc = "The `task_tracker` library crate."]
#![doc = ""]
#![doc = "Session and verification token lifecycle for the task tracker backend: token"]
#![doc = "codec, cache contract and backends, the authorization, authentication and"]
#![doc = "verification services, and the HTTP routes exposing them. The binary"]
#![doc = "(`main.rs`) wires these together from configuration."]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod users;

pub use crate::error::{AppError, AuthError};
