//! Asset rows and their tag sets.
//!
//! An asset's identity is organization-scoped: (id, organization_id). Tag
//! updates are full replacement: clear the association set, re-attach from
//! the submitted list.

use crate::api::types::{AssetResponse, TagDoc};
use fieldcheck_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// Insert the asset row if it does not exist yet. Returns true when a new
/// row was created.
pub async fn upsert_asset(
    conn: &mut SqliteConnection,
    id: &str,
    organization_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO assets (id, organization_id) VALUES (?, ?)
         ON CONFLICT (id, organization_id) DO NOTHING",
    )
    .bind(id)
    .bind(organization_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn asset_exists(
    conn: &mut SqliteConnection,
    id: &str,
    organization_id: &str,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM assets WHERE id = ? AND organization_id = ?",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

/// Clear the asset's tag associations (the tags themselves stay in the
/// registry for other assets).
pub async fn clear_asset_tags(
    conn: &mut SqliteConnection,
    id: &str,
    organization_id: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM asset_tags WHERE asset_id = ? AND organization_id = ?")
        .bind(id)
        .bind(organization_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn link_asset_tag(
    conn: &mut SqliteConnection,
    id: &str,
    organization_id: &str,
    tag_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO asset_tags (asset_id, organization_id, tag_id) VALUES (?, ?, ?)",
    )
    .bind(id)
    .bind(organization_id)
    .bind(tag_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_asset(pool: &SqlitePool, id: &str, organization_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM assets WHERE id = ? AND organization_id = ?")
        .bind(id)
        .bind(organization_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// All assets of the organization with their tag pairs.
pub async fn fetch_assets(pool: &SqlitePool, organization_id: &str) -> Result<Vec<AssetResponse>> {
    let asset_rows = sqlx::query("SELECT id FROM assets WHERE organization_id = ? ORDER BY id")
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

    let tag_rows = sqlx::query(
        "SELECT at.asset_id, t.clave, t.valor
         FROM asset_tags at JOIN tags t ON t.id = at.tag_id
         WHERE at.organization_id = ?
         ORDER BY at.rowid",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    let mut tags_by_asset: HashMap<String, Vec<TagDoc>> = HashMap::new();
    for row in &tag_rows {
        tags_by_asset
            .entry(row.get("asset_id"))
            .or_default()
            .push(TagDoc {
                clave: row.get("clave"),
                valor: row.get("valor"),
            });
    }

    Ok(asset_rows
        .iter()
        .map(|row| {
            let id: String = row.get("id");
            let etiquetas = tags_by_asset.remove(&id).unwrap_or_default();
            AssetResponse {
                id,
                organizacion: organization_id.to_string(),
                etiquetas,
            }
        })
        .collect())
}
