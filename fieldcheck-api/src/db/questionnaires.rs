//! Questionnaire storage: row inserts for the tree builder, nested read-back
//! for API responses, and the question/option/band lookups the answer
//! builder validates against.
//!
//! The question tree is stored flat with parent pointers; reads collect the
//! whole tree with one recursive CTE and reassemble the nesting in memory.

use crate::api::types::{
    AnswerOptionResponse, BlockResponse, NumericBandResponse, PhotoRef, QuestionResponse,
    QuestionnaireResponse, QuestionnaireSummary, TagDoc, TitleResponse,
};
use crate::domain::criticality::Band;
use crate::domain::validator::QuestionInfo;
use fieldcheck_common::kinds::{GridKind, QuestionKind};
use fieldcheck_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Select the ids of every question in a questionnaire, block-level and
/// nested grid members alike.
const QTREE_CTE: &str = "
    WITH RECURSIVE qtree(id) AS (
        SELECT q.id FROM questions q
        JOIN blocks b ON q.block_id = b.id
        WHERE b.questionnaire_id = ?1
        UNION ALL
        SELECT q.id FROM questions q JOIN qtree ON q.parent_question_id = qtree.id
    )
";

// ---------------------------------------------------------------------------
// Writes (inside the builder's transaction)
// ---------------------------------------------------------------------------

pub async fn questionnaire_exists(
    conn: &mut SqliteConnection,
    id: Uuid,
    organization_id: &str,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM questionnaires WHERE id = ? AND organization_id = ?",
    )
    .bind(id.to_string())
    .bind(organization_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

/// Whether the id exists in any organization. Ids are globally unique, so a
/// caller that cannot see the row still cannot claim its id.
pub async fn questionnaire_id_taken(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questionnaires WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Cascade-deletes the whole owned subtree (blocks, titles, questions,
/// options, bands, attached photos).
pub async fn delete_questionnaire(
    conn: &mut SqliteConnection,
    id: Uuid,
    organization_id: &str,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM questionnaires WHERE id = ? AND organization_id = ?")
        .bind(id.to_string())
        .bind(organization_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_questionnaire(
    conn: &mut SqliteConnection,
    id: Uuid,
    organization_id: &str,
    tipo_de_inspeccion: &str,
    version: i64,
    periodicidad_dias: i64,
    creador_id: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO questionnaires
             (id, organization_id, tipo_de_inspeccion, version, periodicidad_dias, creador_id)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(organization_id)
    .bind(tipo_de_inspeccion)
    .bind(version)
    .bind(periodicidad_dias)
    .bind(creador_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn link_questionnaire_tag(
    conn: &mut SqliteConnection,
    questionnaire_id: Uuid,
    tag_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO questionnaire_tags (questionnaire_id, tag_id) VALUES (?, ?)",
    )
    .bind(questionnaire_id.to_string())
    .bind(tag_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_block(
    conn: &mut SqliteConnection,
    id: Uuid,
    questionnaire_id: Uuid,
    n_orden: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO blocks (id, questionnaire_id, n_orden) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(questionnaire_id.to_string())
        .bind(n_orden)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_title(
    conn: &mut SqliteConnection,
    id: Uuid,
    block_id: Uuid,
    titulo: &str,
    descripcion: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO titles (id, block_id, titulo, descripcion) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(block_id.to_string())
        .bind(titulo)
        .bind(descripcion)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// One question row ready for insertion; exactly one of `block_id` /
/// `parent_question_id` is set by the builder.
#[derive(Debug)]
pub struct NewQuestion<'a> {
    pub id: Uuid,
    pub block_id: Option<Uuid>,
    pub parent_question_id: Option<Uuid>,
    pub titulo: &'a str,
    pub descripcion: &'a str,
    pub criticidad: i64,
    pub kind: QuestionKind,
    pub grid_kind: Option<GridKind>,
    pub unidades: Option<&'a str>,
}

pub async fn insert_question(conn: &mut SqliteConnection, q: &NewQuestion<'_>) -> Result<()> {
    sqlx::query(
        "INSERT INTO questions
             (id, block_id, parent_question_id, titulo, descripcion, criticidad,
              tipo_de_pregunta, tipo_de_cuadricula, unidades)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(q.id.to_string())
    .bind(q.block_id.map(|id| id.to_string()))
    .bind(q.parent_question_id.map(|id| id.to_string()))
    .bind(q.titulo)
    .bind(q.descripcion)
    .bind(q.criticidad)
    .bind(q.kind.as_str())
    .bind(q.grid_kind.map(|k| k.as_str()))
    .bind(q.unidades)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn link_question_tag(
    conn: &mut SqliteConnection,
    question_id: Uuid,
    tag_id: Uuid,
) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO question_tags (question_id, tag_id) VALUES (?, ?)")
        .bind(question_id.to_string())
        .bind(tag_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_answer_option(
    conn: &mut SqliteConnection,
    id: Uuid,
    question_id: Uuid,
    titulo: &str,
    descripcion: &str,
    criticidad: i64,
    requiere_criticidad_del_inspector: bool,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO answer_options
             (id, question_id, titulo, descripcion, criticidad, requiere_criticidad_del_inspector)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(question_id.to_string())
    .bind(titulo)
    .bind(descripcion)
    .bind(criticidad)
    .bind(requiere_criticidad_del_inspector)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_numeric_band(
    conn: &mut SqliteConnection,
    id: Uuid,
    question_id: Uuid,
    valor_minimo: f64,
    valor_maximo: f64,
    criticidad: i64,
    posicion: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO numeric_bands (id, question_id, valor_minimo, valor_maximo, criticidad, posicion)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(question_id.to_string())
    .bind(valor_minimo)
    .bind(valor_maximo)
    .bind(criticidad)
    .bind(posicion)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Lookups for the answer builder
// ---------------------------------------------------------------------------

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("malformed uuid in storage: {}", e)))
}

/// Kind and linkage of every question in the questionnaire.
pub async fn load_question_infos(
    conn: &mut SqliteConnection,
    questionnaire_id: Uuid,
) -> Result<HashMap<Uuid, QuestionInfo>> {
    let sql = format!(
        "{QTREE_CTE}
         SELECT q.id, q.tipo_de_pregunta, q.tipo_de_cuadricula, q.parent_question_id
         FROM questions q WHERE q.id IN (SELECT id FROM qtree)"
    );
    let rows = sqlx::query(&sql)
        .bind(questionnaire_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    let mut infos = HashMap::with_capacity(rows.len());
    for row in rows {
        let id = parse_uuid(row.get("id"))?;
        let kind = QuestionKind::from_str(row.get("tipo_de_pregunta"))
            .map_err(Error::Internal)?;
        let grid_kind = row
            .get::<Option<String>, _>("tipo_de_cuadricula")
            .map(|s| GridKind::from_str(&s).map_err(Error::Internal))
            .transpose()?;
        let parent_question_id = row
            .get::<Option<String>, _>("parent_question_id")
            .map(|s| parse_uuid(&s))
            .transpose()?;
        infos.insert(id, QuestionInfo { kind, grid_kind, parent_question_id });
    }
    Ok(infos)
}

/// Owning question and configured weight of every answer option in the
/// questionnaire.
#[derive(Debug, Clone, Copy)]
pub struct OptionInfo {
    pub question_id: Uuid,
    pub criticidad: i64,
    pub requiere_criticidad_del_inspector: bool,
}

pub async fn load_option_infos(
    conn: &mut SqliteConnection,
    questionnaire_id: Uuid,
) -> Result<HashMap<Uuid, OptionInfo>> {
    let sql = format!(
        "{QTREE_CTE}
         SELECT o.id, o.question_id, o.criticidad, o.requiere_criticidad_del_inspector
         FROM answer_options o WHERE o.question_id IN (SELECT id FROM qtree)"
    );
    let rows = sqlx::query(&sql)
        .bind(questionnaire_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    let mut infos = HashMap::with_capacity(rows.len());
    for row in rows {
        infos.insert(
            parse_uuid(row.get("id"))?,
            OptionInfo {
                question_id: parse_uuid(row.get("question_id"))?,
                criticidad: row.get("criticidad"),
                requiere_criticidad_del_inspector: row.get("requiere_criticidad_del_inspector"),
            },
        );
    }
    Ok(infos)
}

/// Numeric bands per question, in stored position order (first match wins).
pub async fn load_bands_by_question(
    conn: &mut SqliteConnection,
    questionnaire_id: Uuid,
) -> Result<HashMap<Uuid, Vec<Band>>> {
    let sql = format!(
        "{QTREE_CTE}
         SELECT b.question_id, b.valor_minimo, b.valor_maximo, b.criticidad
         FROM numeric_bands b WHERE b.question_id IN (SELECT id FROM qtree)
         ORDER BY b.posicion"
    );
    let rows = sqlx::query(&sql)
        .bind(questionnaire_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    let mut bands: HashMap<Uuid, Vec<Band>> = HashMap::new();
    for row in rows {
        bands
            .entry(parse_uuid(row.get("question_id"))?)
            .or_default()
            .push(Band {
                valor_minimo: row.get("valor_minimo"),
                valor_maximo: row.get("valor_maximo"),
                criticidad: row.get("criticidad"),
            });
    }
    Ok(bands)
}

pub async fn organization_of(
    conn: &mut SqliteConnection,
    questionnaire_id: Uuid,
) -> Result<Option<String>> {
    let org = sqlx::query_scalar("SELECT organization_id FROM questionnaires WHERE id = ?")
        .bind(questionnaire_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(org)
}

// ---------------------------------------------------------------------------
// Reads (nested response assembly)
// ---------------------------------------------------------------------------

pub async fn fetch_summaries(
    pool: &SqlitePool,
    organization_id: &str,
) -> Result<Vec<QuestionnaireSummary>> {
    let rows = sqlx::query(
        "SELECT id, tipo_de_inspeccion, version, periodicidad_dias, creador_id
         FROM questionnaires WHERE organization_id = ?
         ORDER BY tipo_de_inspeccion, version",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    let tag_rows = sqlx::query(
        "SELECT qt.questionnaire_id, t.clave, t.valor
         FROM questionnaire_tags qt
         JOIN tags t ON t.id = qt.tag_id
         JOIN questionnaires q ON q.id = qt.questionnaire_id
         WHERE q.organization_id = ?
         ORDER BY qt.rowid",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    let mut tags_by_q: HashMap<String, Vec<TagDoc>> = HashMap::new();
    for row in &tag_rows {
        tags_by_q
            .entry(row.get("questionnaire_id"))
            .or_default()
            .push(TagDoc { clave: row.get("clave"), valor: row.get("valor") });
    }

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            Ok(QuestionnaireSummary {
                id: parse_uuid(&id)?,
                tipo_de_inspeccion: row.get("tipo_de_inspeccion"),
                version: row.get("version"),
                periodicidad_dias: row.get("periodicidad_dias"),
                creador: row.get("creador_id"),
                etiquetas_aplicables: tags_by_q.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}

/// Read one questionnaire back as the full nested document, photos resolved
/// to URLs. Returns None when it does not exist in the organization.
pub async fn fetch_full(
    pool: &SqlitePool,
    organization_id: &str,
    id: Uuid,
) -> Result<Option<QuestionnaireResponse>> {
    let Some(header) = sqlx::query(
        "SELECT tipo_de_inspeccion, version, periodicidad_dias, creador_id
         FROM questionnaires WHERE id = ? AND organization_id = ?",
    )
    .bind(id.to_string())
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let applicable_tags = sqlx::query(
        "SELECT t.clave, t.valor FROM questionnaire_tags qt
         JOIN tags t ON t.id = qt.tag_id WHERE qt.questionnaire_id = ?
         ORDER BY qt.rowid",
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?
    .iter()
    .map(|r| TagDoc { clave: r.get("clave"), valor: r.get("valor") })
    .collect();

    let block_rows = sqlx::query(
        "SELECT id, n_orden FROM blocks WHERE questionnaire_id = ? ORDER BY n_orden",
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?;

    let title_rows = sqlx::query(
        "SELECT t.id, t.block_id, t.titulo, t.descripcion FROM titles t
         JOIN blocks b ON b.id = t.block_id WHERE b.questionnaire_id = ?",
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?;

    let question_sql = format!(
        "{QTREE_CTE}
         SELECT q.id, q.block_id, q.parent_question_id, q.titulo, q.descripcion,
                q.criticidad, q.tipo_de_pregunta, q.tipo_de_cuadricula, q.unidades
         FROM questions q WHERE q.id IN (SELECT id FROM qtree)
         ORDER BY q.rowid"
    );
    let question_rows = sqlx::query(&question_sql)
        .bind(id.to_string())
        .fetch_all(pool)
        .await?;

    let option_sql = format!(
        "{QTREE_CTE}
         SELECT o.id, o.question_id, o.titulo, o.descripcion, o.criticidad,
                o.requiere_criticidad_del_inspector
         FROM answer_options o WHERE o.question_id IN (SELECT id FROM qtree)
         ORDER BY o.rowid"
    );
    let option_rows = sqlx::query(&option_sql)
        .bind(id.to_string())
        .fetch_all(pool)
        .await?;

    let band_sql = format!(
        "{QTREE_CTE}
         SELECT b.id, b.question_id, b.valor_minimo, b.valor_maximo, b.criticidad
         FROM numeric_bands b WHERE b.question_id IN (SELECT id FROM qtree)
         ORDER BY b.posicion"
    );
    let band_rows = sqlx::query(&band_sql)
        .bind(id.to_string())
        .fetch_all(pool)
        .await?;

    let qtag_sql = format!(
        "{QTREE_CTE}
         SELECT qt.question_id, t.clave, t.valor
         FROM question_tags qt JOIN tags t ON t.id = qt.tag_id
         WHERE qt.question_id IN (SELECT id FROM qtree)
         ORDER BY qt.rowid"
    );
    let qtag_rows = sqlx::query(&qtag_sql)
        .bind(id.to_string())
        .fetch_all(pool)
        .await?;

    let photo_sql = format!(
        "{QTREE_CTE}
         SELECT p.id, p.file_path, p.title_id, p.question_id
         FROM questionnaire_photos p
         WHERE p.question_id IN (SELECT id FROM qtree)
            OR p.title_id IN (SELECT t.id FROM titles t
                              JOIN blocks b ON b.id = t.block_id
                              WHERE b.questionnaire_id = ?1)
         ORDER BY p.rowid"
    );
    let photo_rows = sqlx::query(&photo_sql)
        .bind(id.to_string())
        .fetch_all(pool)
        .await?;

    // group per-question collections
    let mut options_by_q: HashMap<String, Vec<AnswerOptionResponse>> = HashMap::new();
    for row in &option_rows {
        options_by_q
            .entry(row.get("question_id"))
            .or_default()
            .push(AnswerOptionResponse {
                id: parse_uuid(row.get("id"))?,
                titulo: row.get("titulo"),
                descripcion: row.get("descripcion"),
                criticidad: row.get("criticidad"),
                requiere_criticidad_del_inspector: row.get("requiere_criticidad_del_inspector"),
            });
    }

    let mut bands_by_q: HashMap<String, Vec<NumericBandResponse>> = HashMap::new();
    for row in &band_rows {
        bands_by_q
            .entry(row.get("question_id"))
            .or_default()
            .push(NumericBandResponse {
                id: parse_uuid(row.get("id"))?,
                valor_minimo: row.get("valor_minimo"),
                valor_maximo: row.get("valor_maximo"),
                criticidad: row.get("criticidad"),
            });
    }

    let mut tags_by_q: HashMap<String, Vec<TagDoc>> = HashMap::new();
    for row in &qtag_rows {
        tags_by_q
            .entry(row.get("question_id"))
            .or_default()
            .push(TagDoc { clave: row.get("clave"), valor: row.get("valor") });
    }

    let mut photos_by_title: HashMap<String, Vec<PhotoRef>> = HashMap::new();
    let mut photos_by_question: HashMap<String, Vec<PhotoRef>> = HashMap::new();
    for row in &photo_rows {
        let photo = PhotoRef {
            id: parse_uuid(row.get("id"))?,
            url: format!("/media/{}", row.get::<String, _>("file_path")),
        };
        if let Some(title_id) = row.get::<Option<String>, _>("title_id") {
            photos_by_title.entry(title_id).or_default().push(photo);
        } else if let Some(question_id) = row.get::<Option<String>, _>("question_id") {
            photos_by_question.entry(question_id).or_default().push(photo);
        }
    }

    // build question nodes, then fold grid members into their parents.
    // rows are in insertion (pre-order) order, so reversing lets children
    // join their parent before the parent joins its block.
    let mut nodes: Vec<(Option<String>, Option<String>, QuestionResponse)> = Vec::new();
    for row in &question_rows {
        let qid: String = row.get("id");
        let node = QuestionResponse {
            id: parse_uuid(&qid)?,
            titulo: row.get("titulo"),
            descripcion: row.get("descripcion"),
            criticidad: row.get("criticidad"),
            tipo_de_pregunta: QuestionKind::from_str(row.get("tipo_de_pregunta"))
                .map_err(Error::Internal)?,
            tipo_de_cuadricula: row
                .get::<Option<String>, _>("tipo_de_cuadricula")
                .map(|s| GridKind::from_str(&s).map_err(Error::Internal))
                .transpose()?,
            unidades: row.get("unidades"),
            etiquetas: tags_by_q.remove(&qid).unwrap_or_default(),
            fotos_guia_urls: photos_by_question.remove(&qid).unwrap_or_default(),
            opciones_de_respuesta: options_by_q.remove(&qid).unwrap_or_default(),
            criticidades_numericas: bands_by_q.remove(&qid).unwrap_or_default(),
            preguntas: Vec::new(),
        };
        nodes.push((
            row.get::<Option<String>, _>("block_id"),
            row.get::<Option<String>, _>("parent_question_id"),
            node,
        ));
    }

    let mut children_of: HashMap<String, Vec<QuestionResponse>> = HashMap::new();
    let mut block_questions: HashMap<String, QuestionResponse> = HashMap::new();
    while let Some((block_id, parent_id, mut node)) = nodes.pop() {
        if let Some(mut kids) = children_of.remove(&node.id.to_string()) {
            // reversed pop order; restore insertion order
            kids.reverse();
            node.preguntas = kids;
        }
        match (block_id, parent_id) {
            (Some(block_id), _) => {
                block_questions.insert(block_id, node);
            }
            (None, Some(parent_id)) => {
                children_of.entry(parent_id).or_default().push(node);
            }
            (None, None) => {
                return Err(Error::Integrity(format!(
                    "question {} has no parent linkage",
                    node.id
                )));
            }
        }
    }

    let mut titles_by_block: HashMap<String, TitleResponse> = HashMap::new();
    for row in &title_rows {
        let tid: String = row.get("id");
        titles_by_block.insert(
            row.get("block_id"),
            TitleResponse {
                id: parse_uuid(&tid)?,
                titulo: row.get("titulo"),
                descripcion: row.get("descripcion"),
                fotos_urls: photos_by_title.remove(&tid).unwrap_or_default(),
            },
        );
    }

    let mut bloques = Vec::with_capacity(block_rows.len());
    for row in &block_rows {
        let bid: String = row.get("id");
        bloques.push(BlockResponse {
            id: parse_uuid(&bid)?,
            n_orden: row.get("n_orden"),
            titulo: titles_by_block.remove(&bid),
            pregunta: block_questions.remove(&bid),
        });
    }

    Ok(Some(QuestionnaireResponse {
        id,
        tipo_de_inspeccion: header.get("tipo_de_inspeccion"),
        version: header.get("version"),
        periodicidad_dias: header.get("periodicidad_dias"),
        creador: header.get("creador_id"),
        etiquetas_aplicables: applicable_tags,
        bloques,
    }))
}
