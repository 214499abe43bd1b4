//! Named hierarchical tag vocabularies.
//!
//! A vocabulary is an organization-owned JSON tree under a client-chosen
//! name, one namespace per tag kind (asset vs question). The server stores
//! and serves the tree verbatim; posting an existing name replaces it.

use fieldcheck_common::kinds::TagKind;
use fieldcheck_common::Result;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Insert or replace the vocabulary under this name. Returns true when the
/// name was new.
pub async fn upsert(
    conn: &mut SqliteConnection,
    kind: TagKind,
    organization_id: &str,
    nombre: &str,
    arbol: &Value,
) -> Result<bool> {
    let existing: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tag_vocabularies
         WHERE kind = ? AND organization_id = ? AND nombre = ?",
    )
    .bind(kind.as_str())
    .bind(organization_id)
    .bind(nombre)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO tag_vocabularies (kind, organization_id, nombre, arbol)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (kind, organization_id, nombre) DO UPDATE SET arbol = excluded.arbol",
    )
    .bind(kind.as_str())
    .bind(organization_id)
    .bind(nombre)
    .bind(Json(arbol))
    .execute(&mut *conn)
    .await?;

    Ok(existing == 0)
}

pub async fn fetch_all(
    pool: &SqlitePool,
    kind: TagKind,
    organization_id: &str,
) -> Result<Vec<(String, Value)>> {
    let rows = sqlx::query(
        "SELECT nombre, arbol FROM tag_vocabularies
         WHERE kind = ? AND organization_id = ?
         ORDER BY nombre",
    )
    .bind(kind.as_str())
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let Json(arbol): Json<Value> = row.get("arbol");
            (row.get("nombre"), arbol)
        })
        .collect())
}

pub async fn fetch(
    pool: &SqlitePool,
    kind: TagKind,
    organization_id: &str,
    nombre: &str,
) -> Result<Option<Value>> {
    let row = sqlx::query(
        "SELECT arbol FROM tag_vocabularies
         WHERE kind = ? AND organization_id = ? AND nombre = ?",
    )
    .bind(kind.as_str())
    .bind(organization_id)
    .bind(nombre)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let Json(arbol): Json<Value> = row.get("arbol");
        arbol
    }))
}

pub async fn delete(
    pool: &SqlitePool,
    kind: TagKind,
    organization_id: &str,
    nombre: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM tag_vocabularies
         WHERE kind = ? AND organization_id = ? AND nombre = ?",
    )
    .bind(kind.as_str())
    .bind(organization_id)
    .bind(nombre)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
