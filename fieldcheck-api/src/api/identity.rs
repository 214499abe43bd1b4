//! Caller identity middleware
//!
//! Authentication proper lives outside this service; requests arrive with an
//! already-authenticated profile id in `X-Profile-Id`. This middleware
//! resolves it to a profile row and injects the caller's organization and
//! role as a request extension. Every scoped query downstream filters by
//! `Identity::organization_id`.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use fieldcheck_common::kinds::Role;
use serde_json::json;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use crate::AppState;

/// Resolved caller identity, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct Identity {
    pub profile_id: String,
    pub organization_id: String,
    pub role: Role,
}

/// Identity resolution middleware for protected routes.
///
/// Returns 401 when the header is missing or references no known profile.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, IdentityError> {
    let profile_id = request
        .headers()
        .get("X-Profile-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or(IdentityError::MissingHeader)?
        .to_string();

    let row = sqlx::query("SELECT organization_id, rol FROM profiles WHERE id = ?")
        .bind(&profile_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| IdentityError::Lookup(e.to_string()))?;

    let row = match row {
        Some(row) => row,
        None => {
            warn!("unknown profile id: {}", profile_id);
            return Err(IdentityError::UnknownProfile);
        }
    };

    let organization_id: String = row.get("organization_id");
    let rol: String = row.get("rol");
    let role = Role::from_str(&rol).map_err(IdentityError::Lookup)?;

    request.extensions_mut().insert(Identity {
        profile_id,
        organization_id,
        role,
    });

    Ok(next.run(request).await)
}

/// Identity resolution failures
#[derive(Debug)]
pub enum IdentityError {
    MissingHeader,
    UnknownProfile,
    Lookup(String),
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            IdentityError::MissingHeader => {
                (StatusCode::UNAUTHORIZED, "missing X-Profile-Id".to_string())
            }
            IdentityError::UnknownProfile => {
                (StatusCode::UNAUTHORIZED, "unknown profile".to_string())
            }
            IdentityError::Lookup(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("identity lookup failed: {}", msg))
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
