//! Questionnaire endpoints
//!
//! Writes take the whole nested document; PUT is replace-on-update, so a
//! modified questionnaire is rebuilt from scratch under the same id.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use tracing::info;
use uuid::Uuid;

use crate::api::extract::Json;
use crate::api::types::{QuestionnaireDoc, QuestionnaireResponse, QuestionnaireSummary};
use crate::api::Identity;
use crate::db::questionnaires;
use crate::domain::questionnaire_builder;
use crate::{ApiError, ApiResult, AppState};

/// GET /api/cuestionarios
pub async fn list_questionnaires(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<QuestionnaireSummary>>> {
    let list = questionnaires::fetch_summaries(&state.db, &identity.organization_id).await?;
    Ok(Json(list))
}

/// POST /api/cuestionarios
pub async fn create_questionnaire(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(doc): Json<QuestionnaireDoc>,
) -> ApiResult<(StatusCode, Json<QuestionnaireResponse>)> {
    questionnaire_builder::save_questionnaire(&state.db, &state.config, &identity, &doc, false)
        .await?;
    info!("created questionnaire {} ({} v{})", doc.id, doc.tipo_de_inspeccion, doc.version);

    let response = read_back(&state, &identity, doc.id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/cuestionarios/:id
pub async fn get_questionnaire(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<QuestionnaireResponse>> {
    Ok(Json(read_back(&state, &identity, id).await?))
}

/// PUT /api/cuestionarios/:id
///
/// Upsert: 201 when the id was new, 200 when an existing questionnaire was
/// replaced.
pub async fn upsert_questionnaire(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(doc): Json<QuestionnaireDoc>,
) -> ApiResult<(StatusCode, Json<QuestionnaireResponse>)> {
    if doc.id != id {
        return Err(ApiError::BadRequest(
            "el id del documento no coincide con la ruta".into(),
        ));
    }

    let created =
        questionnaire_builder::save_questionnaire(&state.db, &state.config, &identity, &doc, true)
            .await?;
    info!(
        "{} questionnaire {} ({} v{})",
        if created { "created" } else { "replaced" },
        doc.id,
        doc.tipo_de_inspeccion,
        doc.version
    );

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    let response = read_back(&state, &identity, id).await?;
    Ok((status, Json(response)))
}

/// DELETE /api/cuestionarios/:id
pub async fn delete_questionnaire(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = state.db.acquire().await?;
    if questionnaires::delete_questionnaire(&mut conn, id, &identity.organization_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("cuestionario {} no encontrado", id)))
    }
}

async fn read_back(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
) -> ApiResult<QuestionnaireResponse> {
    questionnaires::fetch_full(&state.db, &identity.organization_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("cuestionario {} no encontrado", id)))
}
