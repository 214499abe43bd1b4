//! Common error types for fieldcheck

use serde::Serialize;
use thiserror::Error;

/// Common result type for fieldcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// One field-level validation failure, reported back to the caller
/// as part of a structured error list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path into the submitted document (e.g. `bloques[2].pregunta.tipo_de_pregunta`)
    pub campo: String,
    /// Human-readable description of the violated rule
    pub mensaje: String,
}

impl FieldError {
    pub fn new(campo: impl Into<String>, mensaje: impl Into<String>) -> Self {
        Self {
            campo: campo.into(),
            mensaje: mensaje.into(),
        }
    }
}

/// Common error types across the fieldcheck crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found, or outside the caller's organization.
    /// Both cases are reported identically so tenant boundaries leak nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-fixable input problem: unknown enum value, missing required
    /// field for a kind, structural-invariant violation, dangling photo id.
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// Uniqueness violation on a natural key (e.g. duplicate questionnaire
    /// version for an organization + inspection type)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A storage-level constraint fired after application validation passed.
    /// Always a defect: the validator has a gap relative to the schema.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Single-field validation error shortcut
    pub fn validation(campo: impl Into<String>, mensaje: impl Into<String>) -> Self {
        Error::Validation(vec![FieldError::new(campo, mensaje)])
    }

    /// Whether the wrapped sqlx error is a unique-constraint violation.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Whether the wrapped sqlx error is any constraint violation
    /// (unique, foreign key, or CHECK).
    pub fn is_constraint_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => {
                db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation()
            }
            _ => false,
        }
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.campo, f.mensaje))
        .collect::<Vec<_>>()
        .join("; ")
}
