//! Photo upload endpoints
//!
//! Photos are uploaded ahead of the document that references them. The
//! response maps each submitted filename to a stored photo id; the client
//! substitutes those ids into the questionnaire or inspection document.
//! Ids left unclaimed past the grace period are swept after later uploads.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::api::types::UploadedPhotos;
use crate::db::photos;
use crate::{ApiError, ApiResult, AppState};

const QUESTIONNAIRE_DIR: &str = "fotos_cuestionarios";
const INSPECTION_DIR: &str = "fotos_inspecciones";

/// POST /api/cuestionarios/fotos
pub async fn upload_questionnaire_photos(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadedPhotos>)> {
    upload(state, multipart, QUESTIONNAIRE_DIR).await
}

/// POST /api/inspecciones/fotos
pub async fn upload_inspection_photos(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadedPhotos>)> {
    upload(state, multipart, INSPECTION_DIR).await
}

async fn upload(
    state: AppState,
    mut multipart: Multipart,
    subdir: &str,
) -> ApiResult<(StatusCode, Json<UploadedPhotos>)> {
    let dir = state.config.media_dir.join(subdir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot create media dir: {}", e)))?;

    let mut uploaded = UploadedPhotos::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest(format!("el archivo {} esta vacio", filename)));
        }

        let id = Uuid::new_v4();
        let stored_name = match Path::new(&filename).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", id, ext.to_ascii_lowercase()),
            None => id.to_string(),
        };
        let relative = format!("{}/{}", subdir, stored_name);
        tokio::fs::write(dir.join(&stored_name), &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to store upload: {}", e)))?;

        let mut conn = state.db.acquire().await?;
        let result = if subdir == QUESTIONNAIRE_DIR {
            photos::insert_questionnaire_photo(&mut conn, id, &relative, Utc::now()).await
        } else {
            photos::insert_answer_photo(&mut conn, id, &relative, Utc::now()).await
        };
        if let Err(e) = result {
            // keep the filesystem consistent with the row that failed
            let _ = tokio::fs::remove_file(dir.join(&stored_name)).await;
            return Err(e.into());
        }

        uploaded.insert(filename, id);
    }

    if uploaded.is_empty() {
        return Err(ApiError::BadRequest("no se recibieron archivos".into()));
    }

    info!("stored {} photo(s) under {}", uploaded.len(), subdir);
    Ok((StatusCode::CREATED, Json(uploaded)))
}
