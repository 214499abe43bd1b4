//! Inspection storage: header rows, flat answer rows for the builder, and
//! nested read-back of the answer tree.
//!
//! Updates replace the whole answer set: `delete_answers` drops the old tree
//! (photos cascade with it) and the builder re-inserts inside the same
//! transaction.

use crate::api::types::{AnswerResponse, InspectionResponse, InspectionSummary, PhotoRef};
use chrono::{DateTime, Utc};
use fieldcheck_common::kinds::{AnswerKind, InspectionState};
use fieldcheck_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Every answer row of an inspection, top-level and nested.
const ATREE_CTE: &str = "
    WITH RECURSIVE atree(id) AS (
        SELECT a.id FROM answers a WHERE a.inspection_id = ?1
        UNION ALL
        SELECT a.id FROM answers a
        JOIN atree ON a.parent_grid_answer_id = atree.id
                   OR a.parent_multi_answer_id = atree.id
    )
";

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("malformed uuid in storage: {}", e)))
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("malformed timestamp in storage: {}", e)))
}

// ---------------------------------------------------------------------------
// Writes (inside the builder's transaction)
// ---------------------------------------------------------------------------

/// Stored questionnaire and asset linkage of an inspection, or None when no
/// inspection with this id exists in the organization.
pub async fn fetch_links(
    conn: &mut SqliteConnection,
    id: &str,
    organization_id: &str,
) -> Result<Option<(String, String)>> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT questionnaire_id, activo_id FROM inspections
         WHERE id = ? AND organization_id = ?",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Whether the id exists in any organization. Ids are globally unique, so a
/// caller that cannot see the row still cannot claim its id.
pub async fn inspection_id_taken(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inspections WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_inspection(
    conn: &mut SqliteConnection,
    id: &str,
    questionnaire_id: Uuid,
    organization_id: &str,
    activo_id: &str,
    inspector_id: &str,
    momento_inicio: DateTime<Utc>,
    momento_subida: DateTime<Utc>,
    estado: InspectionState,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO inspections
             (id, questionnaire_id, organization_id, activo_id, inspector_id,
              momento_inicio, momento_subida, estado)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(questionnaire_id.to_string())
    .bind(organization_id)
    .bind(activo_id)
    .bind(inspector_id)
    .bind(momento_inicio.to_rfc3339())
    .bind(momento_subida.to_rfc3339())
    .bind(estado.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Refresh the header for a replacing upload. The questionnaire and asset
/// linkage is immutable; only the submission metadata moves.
pub async fn update_inspection(
    conn: &mut SqliteConnection,
    id: &str,
    inspector_id: &str,
    momento_inicio: DateTime<Utc>,
    momento_subida: DateTime<Utc>,
    estado: InspectionState,
) -> Result<()> {
    sqlx::query(
        "UPDATE inspections
         SET inspector_id = ?, momento_inicio = ?, momento_subida = ?, estado = ?
         WHERE id = ?",
    )
    .bind(inspector_id)
    .bind(momento_inicio.to_rfc3339())
    .bind(momento_subida.to_rfc3339())
    .bind(estado.as_str())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Drop the inspection's whole answer tree. Nested answers and attached
/// photos go with it through the cascading foreign keys.
pub async fn delete_answers(conn: &mut SqliteConnection, inspection_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM answers WHERE inspection_id = ?")
        .bind(inspection_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update_cached_scores(
    conn: &mut SqliteConnection,
    inspection_id: &str,
    criticidad_calculada: i64,
    criticidad_calculada_con_reparaciones: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE inspections
         SET criticidad_calculada = ?, criticidad_calculada_con_reparaciones = ?
         WHERE id = ?",
    )
    .bind(criticidad_calculada)
    .bind(criticidad_calculada_con_reparaciones)
    .bind(inspection_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_inspection(
    pool: &SqlitePool,
    id: &str,
    organization_id: &str,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM inspections WHERE id = ? AND organization_id = ?")
        .bind(id)
        .bind(organization_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// One answer row ready for insertion; exactly one parent field is set.
#[derive(Debug)]
pub struct NewAnswer<'a> {
    pub id: Uuid,
    pub inspection_id: Option<&'a str>,
    pub parent_grid_answer_id: Option<Uuid>,
    pub parent_multi_answer_id: Option<Uuid>,
    pub question_id: Option<Uuid>,
    pub kind: AnswerKind,
    pub observacion: &'a str,
    pub reparado: bool,
    pub observacion_reparacion: &'a str,
    pub momento_respuesta: Option<DateTime<Utc>>,
    pub criticidad_del_inspector: Option<i64>,
    pub criticidad_calculada: i64,
    pub criticidad_calculada_con_reparaciones: i64,
    pub opcion_seleccionada_id: Option<Uuid>,
    pub opcion_respondida_id: Option<Uuid>,
    pub opcion_respondida_esta_seleccionada: Option<bool>,
    pub valor_numerico: Option<f64>,
}

pub async fn insert_answer(conn: &mut SqliteConnection, a: &NewAnswer<'_>) -> Result<()> {
    sqlx::query(
        "INSERT INTO answers
             (id, inspection_id, parent_grid_answer_id, parent_multi_answer_id, question_id,
              tipo_de_respuesta, observacion, reparado, observacion_reparacion,
              momento_respuesta, criticidad_del_inspector,
              criticidad_calculada, criticidad_calculada_con_reparaciones,
              opcion_seleccionada_id, opcion_respondida_id,
              opcion_respondida_esta_seleccionada, valor_numerico)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(a.id.to_string())
    .bind(a.inspection_id)
    .bind(a.parent_grid_answer_id.map(|id| id.to_string()))
    .bind(a.parent_multi_answer_id.map(|id| id.to_string()))
    .bind(a.question_id.map(|id| id.to_string()))
    .bind(a.kind.as_str())
    .bind(a.observacion)
    .bind(a.reparado)
    .bind(a.observacion_reparacion)
    .bind(a.momento_respuesta.map(|t| t.to_rfc3339()))
    .bind(a.criticidad_del_inspector)
    .bind(a.criticidad_calculada)
    .bind(a.criticidad_calculada_con_reparaciones)
    .bind(a.opcion_seleccionada_id.map(|id| id.to_string()))
    .bind(a.opcion_respondida_id.map(|id| id.to_string()))
    .bind(a.opcion_respondida_esta_seleccionada)
    .bind(a.valor_numerico)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn summary_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<InspectionSummary> {
    Ok(InspectionSummary {
        id: row.get("id"),
        cuestionario: parse_uuid(row.get("questionnaire_id"))?,
        activo: row.get("activo_id"),
        inspector: row.get("inspector_id"),
        momento_inicio: parse_ts(row.get("momento_inicio"))?,
        momento_subida: parse_ts(row.get("momento_subida"))?,
        estado: InspectionState::from_str(row.get("estado")).map_err(Error::Internal)?,
        criticidad_calculada: row.get("criticidad_calculada"),
        criticidad_calculada_con_reparaciones: row
            .get("criticidad_calculada_con_reparaciones"),
    })
}

pub async fn fetch_summaries(
    pool: &SqlitePool,
    organization_id: &str,
) -> Result<Vec<InspectionSummary>> {
    let rows = sqlx::query(
        "SELECT id, questionnaire_id, activo_id, inspector_id, momento_inicio,
                momento_subida, estado, criticidad_calculada,
                criticidad_calculada_con_reparaciones
         FROM inspections WHERE organization_id = ?
         ORDER BY momento_subida DESC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

/// Read one inspection back with its nested answer tree. Returns None when
/// it does not exist in the organization.
pub async fn fetch_full(
    pool: &SqlitePool,
    organization_id: &str,
    id: &str,
) -> Result<Option<InspectionResponse>> {
    let Some(header) = sqlx::query(
        "SELECT id, questionnaire_id, activo_id, inspector_id, momento_inicio,
                momento_subida, estado, criticidad_calculada,
                criticidad_calculada_con_reparaciones
         FROM inspections WHERE id = ? AND organization_id = ?",
    )
    .bind(id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };
    let summary = summary_from_row(&header)?;

    let answer_sql = format!(
        "{ATREE_CTE}
         SELECT a.id, a.inspection_id, a.parent_grid_answer_id, a.parent_multi_answer_id,
                a.question_id, a.tipo_de_respuesta, a.observacion, a.reparado,
                a.observacion_reparacion, a.momento_respuesta, a.criticidad_del_inspector,
                a.criticidad_calculada, a.criticidad_calculada_con_reparaciones,
                a.opcion_seleccionada_id, a.opcion_respondida_id,
                a.opcion_respondida_esta_seleccionada, a.valor_numerico
         FROM answers a WHERE a.id IN (SELECT id FROM atree)
         ORDER BY a.rowid"
    );
    let answer_rows = sqlx::query(&answer_sql).bind(id).fetch_all(pool).await?;

    let photo_sql = format!(
        "{ATREE_CTE}
         SELECT p.id, p.answer_id, p.tipo, p.file_path
         FROM answer_photos p WHERE p.answer_id IN (SELECT id FROM atree)
         ORDER BY p.rowid"
    );
    let photo_rows = sqlx::query(&photo_sql).bind(id).fetch_all(pool).await?;

    let mut base_photos: HashMap<String, Vec<PhotoRef>> = HashMap::new();
    let mut repair_photos: HashMap<String, Vec<PhotoRef>> = HashMap::new();
    for row in &photo_rows {
        let photo = PhotoRef {
            id: parse_uuid(row.get("id"))?,
            url: format!("/media/{}", row.get::<String, _>("file_path")),
        };
        let answer_id: String = row.get("answer_id");
        match row.get::<Option<String>, _>("tipo").as_deref() {
            Some("reparacion") => repair_photos.entry(answer_id).or_default().push(photo),
            _ => base_photos.entry(answer_id).or_default().push(photo),
        }
    }

    enum Parent {
        Inspection,
        Grid(String),
        Multi(String),
    }

    let mut nodes: Vec<(Parent, AnswerResponse)> = Vec::new();
    for row in &answer_rows {
        let aid: String = row.get("id");
        let node = AnswerResponse {
            id: parse_uuid(&aid)?,
            pregunta: row
                .get::<Option<String>, _>("question_id")
                .map(|s| parse_uuid(&s))
                .transpose()?,
            tipo_de_respuesta: AnswerKind::from_str(row.get("tipo_de_respuesta"))
                .map_err(Error::Internal)?,
            observacion: row.get("observacion"),
            reparado: row.get("reparado"),
            observacion_reparacion: row.get("observacion_reparacion"),
            momento_respuesta: row
                .get::<Option<String>, _>("momento_respuesta")
                .map(|s| parse_ts(&s))
                .transpose()?,
            criticidad_del_inspector: row.get("criticidad_del_inspector"),
            criticidad_calculada: row.get("criticidad_calculada"),
            criticidad_calculada_con_reparaciones: row
                .get("criticidad_calculada_con_reparaciones"),
            opcion_seleccionada: row
                .get::<Option<String>, _>("opcion_seleccionada_id")
                .map(|s| parse_uuid(&s))
                .transpose()?,
            opcion_respondida: row
                .get::<Option<String>, _>("opcion_respondida_id")
                .map(|s| parse_uuid(&s))
                .transpose()?,
            opcion_respondida_esta_seleccionada: row.get("opcion_respondida_esta_seleccionada"),
            valor_numerico: row.get("valor_numerico"),
            fotos_base_url: base_photos.remove(&aid).unwrap_or_default(),
            fotos_reparacion_url: repair_photos.remove(&aid).unwrap_or_default(),
            subrespuestas_cuadricula: Vec::new(),
            subrespuestas_multiple: Vec::new(),
        };
        let parent = if row.get::<Option<String>, _>("inspection_id").is_some() {
            Parent::Inspection
        } else if let Some(p) = row.get::<Option<String>, _>("parent_grid_answer_id") {
            Parent::Grid(p)
        } else if let Some(p) = row.get::<Option<String>, _>("parent_multi_answer_id") {
            Parent::Multi(p)
        } else {
            return Err(Error::Integrity(format!("answer {} has no parent linkage", aid)));
        };
        nodes.push((parent, node));
    }

    // rows are in insertion (pre-order) order; popping in reverse lets every
    // child join its parent before the parent is finalized.
    let mut grid_children: HashMap<String, Vec<AnswerResponse>> = HashMap::new();
    let mut multi_children: HashMap<String, Vec<AnswerResponse>> = HashMap::new();
    let mut respuestas = Vec::new();
    while let Some((parent, mut node)) = nodes.pop() {
        let key = node.id.to_string();
        if let Some(mut kids) = grid_children.remove(&key) {
            kids.reverse();
            node.subrespuestas_cuadricula = kids;
        }
        if let Some(mut kids) = multi_children.remove(&key) {
            kids.reverse();
            node.subrespuestas_multiple = kids;
        }
        match parent {
            Parent::Inspection => respuestas.push(node),
            Parent::Grid(p) => grid_children.entry(p).or_default().push(node),
            Parent::Multi(p) => multi_children.entry(p).or_default().push(node),
        }
    }
    respuestas.reverse();

    Ok(Some(InspectionResponse {
        id: summary.id,
        cuestionario: summary.cuestionario,
        activo: summary.activo,
        inspector: summary.inspector,
        momento_inicio: summary.momento_inicio,
        momento_subida: summary.momento_subida,
        estado: summary.estado,
        criticidad_calculada: summary.criticidad_calculada,
        criticidad_calculada_con_reparaciones: summary.criticidad_calculada_con_reparaciones,
        respuestas,
    }))
}
