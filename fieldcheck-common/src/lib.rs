//! # Fieldcheck Common Library
//!
//! Shared code for the fieldcheck inspection backend:
//! - Error types
//! - Configuration loading
//! - Database schema and connection pool
//! - Node-kind enums (question / answer / photo kinds, roles, lifecycle)

pub mod config;
pub mod db;
pub mod error;
pub mod kinds;

pub use error::{Error, FieldError, Result};
