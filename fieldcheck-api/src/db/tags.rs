//! Tag registry: deduplicated (clave, valor) labels.
//!
//! `get_or_create` is safe under concurrent callers: a lost race on the
//! unique (kind, scope, clave, valor) key falls through the insert-or-ignore
//! and reads the winner's row.

use fieldcheck_common::kinds::TagKind;
use fieldcheck_common::{Error, Result};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Look up or lazily create the tag identified by its natural key.
/// Idempotent: repeated calls return the same id and never duplicate.
pub async fn get_or_create(
    conn: &mut SqliteConnection,
    kind: TagKind,
    scope: &str,
    clave: &str,
    valor: &str,
) -> Result<Uuid> {
    if let Some(id) = find(conn, kind, scope, clave, valor).await? {
        return Ok(id);
    }

    // Insert-or-ignore: under a race exactly one writer inserts, the rest
    // fall through and read the winner below.
    sqlx::query(
        "INSERT INTO tags (id, kind, scope, clave, valor)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (kind, scope, clave, valor) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(kind.as_str())
    .bind(scope)
    .bind(clave)
    .bind(valor)
    .execute(&mut *conn)
    .await?;

    match find(conn, kind, scope, clave, valor).await? {
        Some(id) => Ok(id),
        None => Err(Error::Internal(format!(
            "tag ({}, {}) missing after insert",
            clave, valor
        ))),
    }
}

async fn find(
    conn: &mut SqliteConnection,
    kind: TagKind,
    scope: &str,
    clave: &str,
    valor: &str,
) -> Result<Option<Uuid>> {
    let row = sqlx::query(
        "SELECT id FROM tags WHERE kind = ? AND scope = ? AND clave = ? AND valor = ?",
    )
    .bind(kind.as_str())
    .bind(scope)
    .bind(clave)
    .bind(valor)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            Ok(Some(Uuid::parse_str(&id).map_err(|e| {
                Error::Internal(format!("malformed tag id: {}", e))
            })?))
        }
        None => Ok(None),
    }
}
