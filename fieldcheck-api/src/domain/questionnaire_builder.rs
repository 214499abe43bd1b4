//! Build and persist a questionnaire tree from a submitted document.
//!
//! The whole document is validated before any row is written; the write is
//! one transaction, so a failed build leaves no partial tree. The walk is an
//! explicit stack in pre-order so parents always exist before their children.

use crate::api::Identity;
use crate::api::types::{QuestionDoc, QuestionnaireDoc};
use crate::db::{photos, questionnaires, tags};
use crate::domain::validator::{self, QuestionPosition};
use fieldcheck_common::config::Config;
use fieldcheck_common::kinds::{QuestionKind, TagKind};
use fieldcheck_common::{Error, FieldError, Result};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Validate and persist the questionnaire. With `allow_replace` an existing
/// questionnaire with the same id is dropped and rebuilt in place; without
/// it an id collision is a conflict. Returns true when a new questionnaire
/// was created rather than replaced.
pub async fn save_questionnaire(
    pool: &SqlitePool,
    config: &Config,
    identity: &Identity,
    doc: &QuestionnaireDoc,
    allow_replace: bool,
) -> Result<bool> {
    validate_document(doc)?;

    let mut tx = pool.begin().await?;

    let existed = questionnaires::questionnaire_exists(&mut tx, doc.id, &identity.organization_id)
        .await?;
    if existed {
        if !allow_replace {
            return Err(Error::Conflict(format!(
                "el cuestionario {} ya existe",
                doc.id
            )));
        }
        questionnaires::delete_questionnaire(&mut tx, doc.id, &identity.organization_id).await?;
    } else if questionnaires::questionnaire_id_taken(&mut tx, doc.id).await? {
        // the id may still be held by a questionnaire the caller cannot see
        return Err(Error::Conflict(format!("el id {} ya esta en uso", doc.id)));
    }

    questionnaires::insert_questionnaire(
        &mut tx,
        doc.id,
        &identity.organization_id,
        &doc.tipo_de_inspeccion,
        doc.version,
        doc.periodicidad_dias,
        &identity.profile_id,
    )
    .await
    .map_err(|e| match e {
        Error::Database(ref db) if Error::is_unique_violation(db) => {
            Error::Conflict(format!(
                "ya existe la version {} del cuestionario '{}'",
                doc.version, doc.tipo_de_inspeccion
            ))
        }
        other => other,
    })?;

    let scope = config.tag_scope.key_for(&identity.organization_id);
    for tag in &doc.etiquetas_aplicables {
        let tag_id =
            tags::get_or_create(&mut tx, TagKind::Asset, &scope, &tag.clave, &tag.valor).await?;
        questionnaires::link_questionnaire_tag(&mut tx, doc.id, tag_id).await?;
    }

    for block in &doc.bloques {
        let block_id = Uuid::new_v4();
        questionnaires::insert_block(&mut tx, block_id, doc.id, block.n_orden).await?;

        if let Some(title) = &block.titulo {
            questionnaires::insert_title(
                &mut tx,
                title.id,
                block_id,
                &title.titulo,
                &title.descripcion,
            )
            .await?;
            for photo_id in &title.fotos {
                if !photos::attach_title_photo(&mut tx, *photo_id, title.id).await? {
                    return Err(Error::Validation(vec![FieldError::new(
                        "fotos",
                        format!("la foto {} no existe o ya esta asignada", photo_id),
                    )]));
                }
            }
        }

        if let Some(question) = &block.pregunta {
            insert_question_tree(&mut tx, &scope, block_id, question).await?;
        }
    }

    tx.commit().await?;
    Ok(!existed)
}

enum Owner {
    Block(Uuid),
    Grid(Uuid),
}

/// Insert a block question and its grid members, parent before child.
async fn insert_question_tree(
    conn: &mut SqliteConnection,
    scope: &str,
    block_id: Uuid,
    root: &QuestionDoc,
) -> Result<()> {
    let mut stack: Vec<(Owner, &QuestionDoc)> = vec![(Owner::Block(block_id), root)];

    while let Some((owner, doc)) = stack.pop() {
        // validated up front, so the kind is always present here
        let kind = doc
            .tipo_de_pregunta
            .ok_or_else(|| Error::Internal("unvalidated question reached the builder".into()))?;

        let (block_id, parent_question_id) = match owner {
            Owner::Block(id) => (Some(id), None),
            Owner::Grid(id) => (None, Some(id)),
        };
        questionnaires::insert_question(
            conn,
            &questionnaires::NewQuestion {
                id: doc.id,
                block_id,
                parent_question_id,
                titulo: &doc.titulo,
                descripcion: &doc.descripcion,
                criticidad: doc.criticidad,
                kind,
                grid_kind: doc.tipo_de_cuadricula,
                unidades: doc.unidades.as_deref(),
            },
        )
        .await?;

        for tag in &doc.etiquetas {
            let tag_id =
                tags::get_or_create(conn, TagKind::Question, scope, &tag.clave, &tag.valor)
                    .await?;
            questionnaires::link_question_tag(conn, doc.id, tag_id).await?;
        }

        for photo_id in &doc.fotos_guia {
            if !photos::attach_question_photo(conn, *photo_id, doc.id).await? {
                return Err(Error::Validation(vec![FieldError::new(
                    "fotos_guia",
                    format!("la foto {} no existe o ya esta asignada", photo_id),
                )]));
            }
        }

        for option in &doc.opciones_de_respuesta {
            questionnaires::insert_answer_option(
                conn,
                option.id,
                doc.id,
                &option.titulo,
                &option.descripcion,
                option.criticidad,
                option.requiere_criticidad_del_inspector,
            )
            .await?;
        }

        for (posicion, band) in doc.criticidades_numericas.iter().enumerate() {
            questionnaires::insert_numeric_band(
                conn,
                band.id,
                doc.id,
                band.valor_minimo,
                band.valor_maximo,
                band.criticidad,
                posicion as i64,
            )
            .await?;
        }

        // reversed so members pop in document order
        for member in doc.preguntas.iter().rev() {
            stack.push((Owner::Grid(doc.id), member));
        }
    }

    Ok(())
}

/// Walk the whole document collecting every field error before rejecting.
fn validate_document(doc: &QuestionnaireDoc) -> Result<()> {
    let mut errors = Vec::new();

    if doc.tipo_de_inspeccion.trim().is_empty() {
        errors.push(FieldError::new("tipo_de_inspeccion", "requerido"));
    }
    if doc.version < 1 {
        errors.push(FieldError::new("version", "debe ser al menos 1"));
    }
    if doc.periodicidad_dias < 1 {
        errors.push(FieldError::new("periodicidad_dias", "debe ser al menos 1"));
    }

    for (i, block) in doc.bloques.iter().enumerate() {
        let path = format!("bloques[{}]", i);
        errors.extend(validator::validate_block(block, &path));

        if let Some(root) = &block.pregunta {
            let mut stack: Vec<(QuestionPosition, String, &QuestionDoc)> =
                vec![(QuestionPosition::Block, format!("{}.pregunta", path), root)];
            while let Some((position, qpath, question)) = stack.pop() {
                errors.extend(validator::validate_question(question, position, &qpath));
                // descend only through actual grids; bad shapes are already
                // reported above
                if question.tipo_de_pregunta == Some(QuestionKind::Grid) {
                    for (j, member) in question.preguntas.iter().enumerate() {
                        stack.push((
                            QuestionPosition::GridMember,
                            format!("{}.preguntas[{}]", qpath, j),
                            member,
                        ));
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{BlockDoc, TitleDoc};

    fn base_doc() -> QuestionnaireDoc {
        QuestionnaireDoc {
            id: Uuid::new_v4(),
            tipo_de_inspeccion: "puente".into(),
            version: 1,
            periodicidad_dias: 30,
            etiquetas_aplicables: vec![],
            bloques: vec![],
        }
    }

    #[test]
    fn rejects_empty_inspection_type() {
        let mut doc = base_doc();
        doc.tipo_de_inspeccion = "  ".into();
        let err = validate_document(&doc).unwrap_err();
        match err {
            Error::Validation(errors) => {
                assert_eq!(errors[0].campo, "tipo_de_inspeccion");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn collects_errors_across_blocks() {
        let mut doc = base_doc();
        doc.bloques = vec![
            BlockDoc { n_orden: 0, titulo: None, pregunta: None },
            BlockDoc {
                n_orden: 1,
                titulo: Some(TitleDoc {
                    id: Uuid::new_v4(),
                    titulo: "t".into(),
                    descripcion: String::new(),
                    fotos: vec![],
                }),
                pregunta: None,
            },
        ];
        let err = validate_document(&doc).unwrap_err();
        match err {
            Error::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].campo, "bloques[0]");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn validates_nested_grid_members() {
        let mut doc = base_doc();
        let mut grid = QuestionDoc {
            id: Uuid::new_v4(),
            titulo: "g".into(),
            descripcion: String::new(),
            criticidad: 1,
            tipo_de_pregunta: Some(QuestionKind::Grid),
            tipo_de_cuadricula: Some(fieldcheck_common::kinds::GridKind::SingleChoice),
            unidades: None,
            etiquetas: vec![],
            fotos_guia: vec![],
            opciones_de_respuesta: vec![],
            criticidades_numericas: vec![],
            preguntas: vec![],
        };
        let mut member = grid.clone();
        member.tipo_de_pregunta = Some(QuestionKind::Numeric);
        member.tipo_de_cuadricula = None;
        grid.preguntas = vec![member];
        doc.bloques = vec![BlockDoc { n_orden: 0, titulo: None, pregunta: Some(grid) }];

        let err = validate_document(&doc).unwrap_err();
        match err {
            Error::Validation(errors) => {
                assert!(errors
                    .iter()
                    .any(|e| e.campo == "bloques[0].pregunta.preguntas[0].tipo_de_pregunta"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
