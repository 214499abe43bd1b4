//! Hierarchical tag vocabulary endpoints
//!
//! Each organization keeps named JSON vocabulary trees, one namespace for
//! asset tags and one for question tags, that the mobile clients use to
//! offer structured (clave, valor) choices. POST with an existing name
//! replaces the tree in place, so clients re-push whole vocabularies.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use fieldcheck_common::kinds::TagKind;
use tracing::info;

use crate::api::extract::Json;
use crate::api::types::VocabularyDoc;
use crate::api::Identity;
use crate::db::vocabularies;
use crate::{ApiError, ApiResult, AppState};

/// GET /api/etiquetas-jerarquicas/activos
pub async fn list_asset_vocabularies(
    state: State<AppState>,
    identity: Extension<Identity>,
) -> ApiResult<Json<Vec<VocabularyDoc>>> {
    list(state, identity, TagKind::Asset).await
}

/// POST /api/etiquetas-jerarquicas/activos
pub async fn upsert_asset_vocabulary(
    state: State<AppState>,
    identity: Extension<Identity>,
    doc: Json<VocabularyDoc>,
) -> ApiResult<(StatusCode, Json<VocabularyDoc>)> {
    upsert(state, identity, TagKind::Asset, doc).await
}

/// GET /api/etiquetas-jerarquicas/activos/:nombre
pub async fn get_asset_vocabulary(
    state: State<AppState>,
    identity: Extension<Identity>,
    nombre: Path<String>,
) -> ApiResult<Json<VocabularyDoc>> {
    get(state, identity, TagKind::Asset, nombre).await
}

/// DELETE /api/etiquetas-jerarquicas/activos/:nombre
pub async fn delete_asset_vocabulary(
    state: State<AppState>,
    identity: Extension<Identity>,
    nombre: Path<String>,
) -> ApiResult<StatusCode> {
    delete(state, identity, TagKind::Asset, nombre).await
}

/// GET /api/etiquetas-jerarquicas/preguntas
pub async fn list_question_vocabularies(
    state: State<AppState>,
    identity: Extension<Identity>,
) -> ApiResult<Json<Vec<VocabularyDoc>>> {
    list(state, identity, TagKind::Question).await
}

/// POST /api/etiquetas-jerarquicas/preguntas
pub async fn upsert_question_vocabulary(
    state: State<AppState>,
    identity: Extension<Identity>,
    doc: Json<VocabularyDoc>,
) -> ApiResult<(StatusCode, Json<VocabularyDoc>)> {
    upsert(state, identity, TagKind::Question, doc).await
}

/// GET /api/etiquetas-jerarquicas/preguntas/:nombre
pub async fn get_question_vocabulary(
    state: State<AppState>,
    identity: Extension<Identity>,
    nombre: Path<String>,
) -> ApiResult<Json<VocabularyDoc>> {
    get(state, identity, TagKind::Question, nombre).await
}

/// DELETE /api/etiquetas-jerarquicas/preguntas/:nombre
pub async fn delete_question_vocabulary(
    state: State<AppState>,
    identity: Extension<Identity>,
    nombre: Path<String>,
) -> ApiResult<StatusCode> {
    delete(state, identity, TagKind::Question, nombre).await
}

async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    kind: TagKind,
) -> ApiResult<Json<Vec<VocabularyDoc>>> {
    let rows = vocabularies::fetch_all(&state.db, kind, &identity.organization_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(nombre, json)| VocabularyDoc { nombre, json })
            .collect(),
    ))
}

/// 201 when the name was new, 200 when an existing tree was replaced.
async fn upsert(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    kind: TagKind,
    Json(doc): Json<VocabularyDoc>,
) -> ApiResult<(StatusCode, Json<VocabularyDoc>)> {
    if doc.nombre.trim().is_empty() {
        return Err(ApiError::BadRequest("el vocabulario necesita un nombre".into()));
    }

    let mut conn = state.db.acquire().await?;
    let created = vocabularies::upsert(
        &mut conn,
        kind,
        &identity.organization_id,
        &doc.nombre,
        &doc.json,
    )
    .await?;

    info!(
        "{} {} vocabulary '{}' for {}",
        if created { "created" } else { "replaced" },
        kind.as_str(),
        doc.nombre,
        identity.organization_id
    );
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(doc)))
}

async fn get(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    kind: TagKind,
    Path(nombre): Path<String>,
) -> ApiResult<Json<VocabularyDoc>> {
    match vocabularies::fetch(&state.db, kind, &identity.organization_id, &nombre).await? {
        Some(json) => Ok(Json(VocabularyDoc { nombre, json })),
        None => Err(ApiError::NotFound(format!("vocabulario {} no encontrado", nombre))),
    }
}

async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    kind: TagKind,
    Path(nombre): Path<String>,
) -> ApiResult<StatusCode> {
    if vocabularies::delete(&state.db, kind, &identity.organization_id, &nombre).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("vocabulario {} no encontrado", nombre)))
    }
}
