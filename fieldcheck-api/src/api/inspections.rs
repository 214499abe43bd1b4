//! Inspection endpoints
//!
//! An inspection upload carries the whole answer tree. PUT replaces the
//! previous tree under the same id; criticality figures are computed
//! server-side and cached on the inspection row.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use tracing::info;

use crate::api::extract::Json;
use crate::api::types::{InspectionDoc, InspectionResponse, InspectionSummary};
use crate::api::Identity;
use crate::db::inspections;
use crate::domain::answer_builder;
use crate::{ApiError, ApiResult, AppState};

/// GET /api/inspecciones
pub async fn list_inspections(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<InspectionSummary>>> {
    let list = inspections::fetch_summaries(&state.db, &identity.organization_id).await?;
    Ok(Json(list))
}

/// POST /api/inspecciones
pub async fn create_inspection(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(doc): Json<InspectionDoc>,
) -> ApiResult<(StatusCode, Json<InspectionResponse>)> {
    answer_builder::save_inspection(&state.db, &state.config, &identity, &doc, false).await?;
    info!("created inspection {} on asset {}", doc.id, doc.activo);

    let response = read_back(&state, &identity, &doc.id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/inspecciones/:id
pub async fn get_inspection(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<InspectionResponse>> {
    Ok(Json(read_back(&state, &identity, &id).await?))
}

/// PUT /api/inspecciones/:id
///
/// Upsert: 201 when the id was new, 200 when the existing answer tree was
/// replaced.
pub async fn upsert_inspection(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(doc): Json<InspectionDoc>,
) -> ApiResult<(StatusCode, Json<InspectionResponse>)> {
    if doc.id != id {
        return Err(ApiError::BadRequest(
            "el id del documento no coincide con la ruta".into(),
        ));
    }

    let created =
        answer_builder::save_inspection(&state.db, &state.config, &identity, &doc, true).await?;
    info!(
        "{} inspection {} on asset {}",
        if created { "created" } else { "replaced" },
        doc.id,
        doc.activo
    );

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    let response = read_back(&state, &identity, &id).await?;
    Ok((status, Json(response)))
}

/// DELETE /api/inspecciones/:id
pub async fn delete_inspection(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if inspections::delete_inspection(&state.db, &id, &identity.organization_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("inspeccion {} no encontrada", id)))
    }
}

async fn read_back(
    state: &AppState,
    identity: &Identity,
    id: &str,
) -> ApiResult<InspectionResponse> {
    inspections::fetch_full(&state.db, &identity.organization_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("inspeccion {} no encontrada", id)))
}
