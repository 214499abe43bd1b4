//! Build and persist an inspection with its answer tree.
//!
//! The submitted tree is flattened into an arena in pre-order with an
//! explicit stack. Pre-order gives two properties the rest of the build
//! leans on: walking the arena forward inserts every parent before its
//! children, and walking it backward visits every child before its parent,
//! which is exactly the order criticality rollups need.

use crate::api::Identity;
use crate::api::types::{AnswerDoc, InspectionDoc};
use crate::db::{assets, inspections, photos, questionnaires};
use crate::domain::criticality;
use crate::domain::validator::{self, AnswerPosition, QuestionInfo};
use chrono::Utc;
use fieldcheck_common::config::Config;
use fieldcheck_common::kinds::{AnswerKind, InspectionState, PhotoKind};
use fieldcheck_common::{Error, FieldError, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// One flattened answer node.
struct Node<'a> {
    doc: &'a AnswerDoc,
    parent: Option<usize>,
    position: AnswerPosition,
    path: String,
}

/// Validate and persist the inspection. With `allow_replace` an existing
/// inspection with the same id has its answer tree dropped and rebuilt;
/// without it an id collision is a conflict. Returns true when a new
/// inspection was created rather than replaced.
pub async fn save_inspection(
    pool: &SqlitePool,
    config: &Config,
    identity: &Identity,
    doc: &InspectionDoc,
    allow_replace: bool,
) -> Result<bool> {
    if doc.id.trim().is_empty() {
        return Err(Error::Validation(vec![FieldError::new("id", "requerido")]));
    }

    let mut tx = pool.begin().await?;

    match questionnaires::organization_of(&mut tx, doc.cuestionario).await? {
        Some(org) if org == identity.organization_id => {}
        _ => {
            return Err(Error::NotFound(format!(
                "cuestionario {} no encontrado",
                doc.cuestionario
            )))
        }
    }
    if !assets::asset_exists(&mut tx, &doc.activo, &identity.organization_id).await? {
        return Err(Error::NotFound(format!("activo {} no encontrado", doc.activo)));
    }

    let question_infos = questionnaires::load_question_infos(&mut tx, doc.cuestionario).await?;
    let option_infos = questionnaires::load_option_infos(&mut tx, doc.cuestionario).await?;
    let bands = questionnaires::load_bands_by_question(&mut tx, doc.cuestionario).await?;

    let arena = flatten(&doc.respuestas);
    validate_arena(&arena, &question_infos, &option_infos)?;
    let scores = score_arena(&arena, &option_infos, &bands);

    let links = inspections::fetch_links(&mut tx, &doc.id, &identity.organization_id).await?;
    let existed = links.is_some();
    let now = Utc::now();
    let estado = doc.estado.unwrap_or(InspectionState::Draft);
    if let Some((stored_questionnaire, stored_asset)) = links {
        if !allow_replace {
            return Err(Error::Conflict(format!("la inspeccion {} ya existe", doc.id)));
        }
        // a replace rewrites the answer tree, never the linkage
        let mut errors = Vec::new();
        if stored_questionnaire != doc.cuestionario.to_string() {
            errors.push(FieldError::new(
                "cuestionario",
                "no coincide con la inspeccion existente",
            ));
        }
        if stored_asset != doc.activo {
            errors.push(FieldError::new("activo", "no coincide con la inspeccion existente"));
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        inspections::update_inspection(
            &mut tx,
            &doc.id,
            &identity.profile_id,
            doc.momento_inicio,
            now,
            estado,
        )
        .await?;
        inspections::delete_answers(&mut tx, &doc.id).await?;
    } else {
        // the id may still be held by an inspection the caller cannot see
        if inspections::inspection_id_taken(&mut tx, &doc.id).await? {
            return Err(Error::Conflict(format!("el id {} ya esta en uso", doc.id)));
        }
        inspections::insert_inspection(
            &mut tx,
            &doc.id,
            doc.cuestionario,
            &identity.organization_id,
            &doc.activo,
            &identity.profile_id,
            doc.momento_inicio,
            now,
            estado,
        )
        .await?;
    }

    // server-side ids where the client omitted them
    let ids: Vec<Uuid> = arena
        .iter()
        .map(|node| node.doc.id.unwrap_or_else(Uuid::new_v4))
        .collect();

    for (i, node) in arena.iter().enumerate() {
        let (inspection_id, parent_grid, parent_multi) = match (node.parent, node.position) {
            (None, _) => (Some(doc.id.as_str()), None, None),
            (Some(p), AnswerPosition::GridChild { .. }) => (None, Some(ids[p]), None),
            (Some(p), AnswerPosition::MultiChoiceChild) => (None, None, Some(ids[p])),
            (Some(_), AnswerPosition::TopLevel) => {
                return Err(Error::Internal("flattened answer with bad linkage".into()))
            }
        };
        // validated up front, so the kind is always present here
        let kind = node
            .doc
            .tipo_de_respuesta
            .ok_or_else(|| Error::Internal("unvalidated answer reached the builder".into()))?;

        inspections::insert_answer(
            &mut tx,
            &inspections::NewAnswer {
                id: ids[i],
                inspection_id,
                parent_grid_answer_id: parent_grid,
                parent_multi_answer_id: parent_multi,
                question_id: node.doc.pregunta,
                kind,
                observacion: &node.doc.observacion,
                reparado: node.doc.reparado,
                observacion_reparacion: &node.doc.observacion_reparacion,
                momento_respuesta: node.doc.momento_respuesta,
                criticidad_del_inspector: node.doc.criticidad_del_inspector,
                criticidad_calculada: scores.as_answered[i],
                criticidad_calculada_con_reparaciones: scores.with_repairs[i],
                opcion_seleccionada_id: node.doc.opcion_seleccionada,
                opcion_respondida_id: node.doc.opcion_respondida,
                opcion_respondida_esta_seleccionada: node.doc.opcion_respondida_esta_seleccionada,
                valor_numerico: node.doc.valor_numerico,
            },
        )
        .await?;

        for photo_id in &node.doc.fotos_base {
            if !photos::attach_answer_photo(&mut tx, *photo_id, ids[i], PhotoKind::Base).await? {
                return Err(Error::Validation(vec![FieldError::new(
                    format!("{}.fotos_base", node.path),
                    format!("la foto {} no existe o ya esta asignada", photo_id),
                )]));
            }
        }
        for photo_id in &node.doc.fotos_reparacion {
            if !photos::attach_answer_photo(&mut tx, *photo_id, ids[i], PhotoKind::Repair).await? {
                return Err(Error::Validation(vec![FieldError::new(
                    format!("{}.fotos_reparacion", node.path),
                    format!("la foto {} no existe o ya esta asignada", photo_id),
                )]));
            }
        }
    }

    let top_level = |values: &[i64]| {
        criticality::rollup(
            arena
                .iter()
                .enumerate()
                .filter(|(_, n)| n.parent.is_none())
                .map(|(i, _)| values[i]),
        )
    };
    inspections::update_cached_scores(
        &mut tx,
        &doc.id,
        top_level(&scores.as_answered),
        top_level(&scores.with_repairs),
    )
    .await?;

    tx.commit().await?;

    collect_orphan_photos(pool, config).await;

    Ok(!existed)
}

/// Best-effort sweep of unattached answer photos past the grace period.
/// Runs after a successful commit; failures are logged and never surface.
async fn collect_orphan_photos(pool: &SqlitePool, config: &Config) {
    let cutoff = Utc::now() - chrono::Duration::seconds(config.orphan_photo_grace_secs);
    match photos::delete_orphan_answer_photos(pool, cutoff).await {
        Ok(paths) => {
            for path in paths {
                let full = config.media_dir.join(&path);
                if let Err(e) = std::fs::remove_file(&full) {
                    warn!("failed to remove orphan photo {}: {}", full.display(), e);
                } else {
                    debug!("removed orphan photo {}", path);
                }
            }
        }
        Err(e) => warn!("orphan photo sweep failed: {}", e),
    }
}

/// Flatten the answer tree in pre-order, children in document order.
fn flatten(top_level: &[AnswerDoc]) -> Vec<Node<'_>> {
    let mut arena = Vec::new();
    let mut stack: Vec<(Option<usize>, AnswerPosition, String, &AnswerDoc)> = top_level
        .iter()
        .enumerate()
        .rev()
        .map(|(i, doc)| (None, AnswerPosition::TopLevel, format!("respuestas[{}]", i), doc))
        .collect();

    while let Some((parent, position, path, doc)) = stack.pop() {
        let index = arena.len();
        // grid children can only be position-checked against a named grid
        // question; when it is missing the parent is rejected anyway
        if let Some(grid_question) = doc.pregunta {
            for (j, child) in doc.subrespuestas_cuadricula.iter().enumerate().rev() {
                stack.push((
                    Some(index),
                    AnswerPosition::GridChild { grid_question },
                    format!("{}.subrespuestas_cuadricula[{}]", path, j),
                    child,
                ));
            }
        }
        for (j, child) in doc.subrespuestas_multiple.iter().enumerate().rev() {
            stack.push((
                Some(index),
                AnswerPosition::MultiChoiceChild,
                format!("{}.subrespuestas_multiple[{}]", path, j),
                child,
            ));
        }
        arena.push(Node { doc, parent, position, path });
    }

    arena
}

/// Validate every node, collecting field errors across the whole tree.
/// Option references are checked here because the validator has no access
/// to the persisted option set.
fn validate_arena(
    arena: &[Node<'_>],
    questions: &HashMap<Uuid, QuestionInfo>,
    options: &HashMap<Uuid, questionnaires::OptionInfo>,
) -> Result<()> {
    let mut errors = Vec::new();

    for node in arena {
        errors.extend(validator::validate_answer(node.doc, node.position, questions, &node.path));

        // a grid member's options live on its parent grid
        let legal_owner = |option_question: Uuid, answered: Uuid| {
            option_question == answered
                || questions
                    .get(&answered)
                    .map(|info| info.parent_question_id == Some(option_question))
                    .unwrap_or(false)
        };

        if let Some(option_id) = node.doc.opcion_seleccionada {
            let answered = node.doc.pregunta;
            match (options.get(&option_id), answered) {
                (Some(info), Some(answered)) if legal_owner(info.question_id, answered) => {}
                _ => errors.push(FieldError::new(
                    format!("{}.opcion_seleccionada", node.path),
                    "la opcion no pertenece a la pregunta respondida",
                )),
            }
        }

        if let Some(option_id) = node.doc.opcion_respondida {
            // the answered question is on the parent multi-choice answer
            let answered = node
                .parent
                .and_then(|p| arena[p].doc.pregunta);
            match (options.get(&option_id), answered) {
                (Some(info), Some(answered)) if legal_owner(info.question_id, answered) => {}
                _ => errors.push(FieldError::new(
                    format!("{}.opcion_respondida", node.path),
                    "la opcion no pertenece a la pregunta respondida",
                )),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

struct Scores {
    as_answered: Vec<i64>,
    with_repairs: Vec<i64>,
}

/// Compute both criticality figures for every node. Containers take the
/// maximum over their children; the inspector's figure, when present,
/// replaces a node's own resolved value before it rolls up.
fn score_arena(
    arena: &[Node<'_>],
    options: &HashMap<Uuid, questionnaires::OptionInfo>,
    bands: &HashMap<Uuid, Vec<criticality::Band>>,
) -> Scores {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];
    for (i, node) in arena.iter().enumerate() {
        if let Some(p) = node.parent {
            children[p].push(i);
        }
    }

    let mut as_answered = vec![0i64; arena.len()];
    let mut with_repairs = vec![0i64; arena.len()];

    for i in (0..arena.len()).rev() {
        let node = &arena[i];
        let kind = match node.doc.tipo_de_respuesta {
            Some(kind) => kind,
            None => continue,
        };

        let own = match kind {
            AnswerKind::SingleChoice => node
                .doc
                .opcion_seleccionada
                .and_then(|id| options.get(&id))
                .map(|info| info.criticidad)
                .unwrap_or(0),
            AnswerKind::MultiChoiceMember => {
                let weight = node
                    .doc
                    .opcion_respondida
                    .and_then(|id| options.get(&id))
                    .map(|info| info.criticidad)
                    .unwrap_or(0);
                criticality::member_criticality(
                    weight,
                    node.doc.opcion_respondida_esta_seleccionada.unwrap_or(false),
                )
            }
            AnswerKind::Numeric => {
                let value = node.doc.valor_numerico.unwrap_or(0.0);
                node.doc
                    .pregunta
                    .and_then(|q| bands.get(&q))
                    .map(|bands| criticality::band_criticality(bands, value))
                    .unwrap_or(0)
            }
            AnswerKind::Grid | AnswerKind::MultiChoice => {
                criticality::rollup(children[i].iter().map(|&c| as_answered[c]))
            }
        };
        let own = node.doc.criticidad_del_inspector.unwrap_or(own);
        as_answered[i] = own;

        let repaired_base = match kind {
            AnswerKind::Grid | AnswerKind::MultiChoice => {
                criticality::rollup(children[i].iter().map(|&c| with_repairs[c]))
            }
            _ => own,
        };
        with_repairs[i] = criticality::with_repairs(node.doc.reparado, repaired_base);
    }

    Scores { as_answered, with_repairs }
}
