//! Asset endpoints
//!
//! Assets are client-named (plant codes, not uuids) and organization-scoped.
//! POST accepts a single document or an array for bulk loads; PUT replaces
//! the tag set of one asset.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use fieldcheck_common::kinds::TagKind;
use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::api::extract::Json;
use crate::api::types::{AssetDoc, AssetResponse, AssetSubmission, TagDoc};
use crate::api::Identity;
use crate::db::{assets, tags};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/activos
pub async fn list_assets(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<AssetResponse>>> {
    let list = assets::fetch_assets(&state.db, &identity.organization_id).await?;
    Ok(Json(list))
}

/// POST /api/activos
///
/// Accepts one asset or an array. Existing assets are updated in place, so
/// re-posting a spreadsheet load is idempotent.
pub async fn create_assets(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(submission): Json<AssetSubmission>,
) -> ApiResult<(StatusCode, Json<Vec<AssetResponse>>)> {
    let docs = match submission {
        AssetSubmission::One(doc) => vec![doc],
        AssetSubmission::Many(docs) => docs,
    };
    if docs.is_empty() {
        return Err(ApiError::BadRequest("la lista de activos esta vacia".into()));
    }
    if docs.iter().any(|d| d.id.trim().is_empty()) {
        return Err(ApiError::BadRequest("todo activo necesita un id".into()));
    }

    let mut tx = state.db.begin().await?;
    let mut saved = Vec::with_capacity(docs.len());
    for doc in &docs {
        save_asset(&mut tx, &state, &identity, doc).await?;
        saved.push(AssetResponse {
            id: doc.id.clone(),
            organizacion: identity.organization_id.clone(),
            etiquetas: doc.etiquetas.clone(),
        });
    }
    tx.commit().await?;

    info!("stored {} asset(s) for {}", saved.len(), identity.organization_id);
    Ok((StatusCode::CREATED, Json(saved)))
}

#[derive(Debug, Deserialize)]
pub struct AssetTagsBody {
    #[serde(default)]
    pub etiquetas: Vec<TagDoc>,
}

/// PUT /api/activos/:id
///
/// Creates the asset when missing, otherwise replaces its tag set.
/// 201 on create, 200 on replace.
pub async fn upsert_asset(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<AssetTagsBody>,
) -> ApiResult<(StatusCode, Json<AssetResponse>)> {
    let doc = AssetDoc { id, etiquetas: body.etiquetas };

    let mut tx = state.db.begin().await?;
    let created = save_asset(&mut tx, &state, &identity, &doc).await?;
    tx.commit().await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(AssetResponse {
            id: doc.id,
            organizacion: identity.organization_id,
            etiquetas: doc.etiquetas,
        }),
    ))
}

/// DELETE /api/activos/:id
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if assets::delete_asset(&state.db, &id, &identity.organization_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("activo {} no encontrado", id)))
    }
}

/// Upsert one asset row and replace its tag set. Returns true when the row
/// was created.
async fn save_asset(
    conn: &mut SqliteConnection,
    state: &AppState,
    identity: &Identity,
    doc: &AssetDoc,
) -> ApiResult<bool> {
    let created = assets::upsert_asset(conn, &doc.id, &identity.organization_id).await?;
    assets::clear_asset_tags(conn, &doc.id, &identity.organization_id).await?;

    let scope = state.config.tag_scope.key_for(&identity.organization_id);
    for tag in &doc.etiquetas {
        let tag_id =
            tags::get_or_create(conn, TagKind::Asset, &scope, &tag.clave, &tag.valor).await?;
        assets::link_asset_tag(conn, &doc.id, &identity.organization_id, tag_id).await?;
    }
    Ok(created)
}
