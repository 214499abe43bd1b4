//! Photo rows: uploaded unattached, claimed during tree construction.
//!
//! Attachment is a guarded UPDATE: it only succeeds when the photo exists
//! and is still unclaimed, so a dangling or already-claimed id fails the
//! enclosing build.

use chrono::{DateTime, Utc};
use fieldcheck_common::kinds::PhotoKind;
use fieldcheck_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

pub async fn insert_questionnaire_photo(
    conn: &mut SqliteConnection,
    id: Uuid,
    file_path: &str,
    uploaded_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO questionnaire_photos (id, file_path, uploaded_at) VALUES (?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(file_path)
    .bind(uploaded_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_answer_photo(
    conn: &mut SqliteConnection,
    id: Uuid,
    file_path: &str,
    uploaded_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO answer_photos (id, file_path, uploaded_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(file_path)
        .bind(uploaded_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Claim a questionnaire photo for a title. Returns false when the photo is
/// unknown or already attached somewhere.
pub async fn attach_title_photo(
    conn: &mut SqliteConnection,
    photo_id: Uuid,
    title_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE questionnaire_photos SET title_id = ?
         WHERE id = ? AND title_id IS NULL AND question_id IS NULL",
    )
    .bind(title_id.to_string())
    .bind(photo_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Claim a questionnaire photo as a question's guide photo.
pub async fn attach_question_photo(
    conn: &mut SqliteConnection,
    photo_id: Uuid,
    question_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE questionnaire_photos SET question_id = ?
         WHERE id = ? AND title_id IS NULL AND question_id IS NULL",
    )
    .bind(question_id.to_string())
    .bind(photo_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Claim an answer photo with its classification. The classification is set
/// here, at attachment time; an unattached photo has none.
pub async fn attach_answer_photo(
    conn: &mut SqliteConnection,
    photo_id: Uuid,
    answer_id: Uuid,
    kind: PhotoKind,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE answer_photos SET answer_id = ?, tipo = ?
         WHERE id = ? AND answer_id IS NULL",
    )
    .bind(answer_id.to_string())
    .bind(kind.as_str())
    .bind(photo_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Delete unattached answer photos older than the cutoff. Returns the file
/// paths of the deleted rows so the caller can unlink the stored files.
/// The grace period keeps uploads of in-flight builds from being reaped.
pub async fn delete_orphan_answer_photos(
    pool: &SqlitePool,
    older_than: DateTime<Utc>,
) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "DELETE FROM answer_photos
         WHERE answer_id IS NULL AND uploaded_at < ?
         RETURNING file_path",
    )
    .bind(older_than.to_rfc3339())
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|r| r.get::<String, _>("file_path")).collect())
}
