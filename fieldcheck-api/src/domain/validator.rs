//! Structural and semantic validation of questionnaire and answer nodes.
//!
//! Application-side validation is the single source of truth; the schema's
//! CHECK constraints reassert a subset of these rules as a backstop. Every
//! rule a CHECK enforces must be rejected here first, so a constraint firing
//! in production is always a defect.

use crate::api::types::{AnswerDoc, BlockDoc, QuestionDoc};
use fieldcheck_common::kinds::{AnswerKind, GridKind, QuestionKind};
use fieldcheck_common::FieldError;
use std::collections::HashMap;
use uuid::Uuid;

/// Where a question node sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionPosition {
    /// Directly owned by a block
    Block,
    /// Nested under a grid question
    GridMember,
}

/// Where an answer node sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPosition {
    /// Directly owned by the inspection
    TopLevel,
    /// Child of a grid answer over the given grid question
    GridChild { grid_question: Uuid },
    /// Child of a multi-choice answer
    MultiChoiceChild,
}

/// What the answer validator needs to know about a persisted question.
#[derive(Debug, Clone)]
pub struct QuestionInfo {
    pub kind: QuestionKind,
    pub grid_kind: Option<GridKind>,
    pub parent_question_id: Option<Uuid>,
}

/// A block must hold exactly one of {title, question}.
pub fn validate_block(doc: &BlockDoc, path: &str) -> Vec<FieldError> {
    match (&doc.titulo, &doc.pregunta) {
        (Some(_), Some(_)) => vec![FieldError::new(
            path,
            "un bloque no puede tener titulo y pregunta a la vez",
        )],
        (None, None) => vec![FieldError::new(
            path,
            "un bloque debe tener un titulo o una pregunta",
        )],
        _ => vec![],
    }
}

/// Validate one question node against the kind rule table. Children are
/// validated separately as the builder walks them.
pub fn validate_question(doc: &QuestionDoc, position: QuestionPosition, path: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let kind = match doc.tipo_de_pregunta {
        Some(kind) => kind,
        None => {
            errors.push(FieldError::new(
                format!("{}.tipo_de_pregunta", path),
                "requerido",
            ));
            return errors;
        }
    };

    // structural position vs kind
    match (position, kind) {
        (QuestionPosition::Block, QuestionKind::GridMember) => {
            errors.push(FieldError::new(
                format!("{}.tipo_de_pregunta", path),
                "una parte de cuadricula debe estar anidada en una cuadricula",
            ));
        }
        (QuestionPosition::GridMember, k) if k != QuestionKind::GridMember => {
            errors.push(FieldError::new(
                format!("{}.tipo_de_pregunta", path),
                "las preguntas anidadas en una cuadricula deben ser parte_de_cuadricula",
            ));
        }
        _ => {}
    }

    // grid-kind biconditional
    if kind == QuestionKind::Grid && doc.tipo_de_cuadricula.is_none() {
        errors.push(FieldError::new(
            format!("{}.tipo_de_cuadricula", path),
            "requerido para preguntas de tipo cuadricula",
        ));
    }
    if kind != QuestionKind::Grid && doc.tipo_de_cuadricula.is_some() {
        errors.push(FieldError::new(
            format!("{}.tipo_de_cuadricula", path),
            "solo valido para preguntas de tipo cuadricula",
        ));
    }

    // nested questions only under a grid, and a grid needs members
    if kind == QuestionKind::Grid && doc.preguntas.is_empty() {
        errors.push(FieldError::new(
            format!("{}.preguntas", path),
            "una cuadricula debe tener preguntas",
        ));
    }
    if kind != QuestionKind::Grid && !doc.preguntas.is_empty() {
        errors.push(FieldError::new(
            format!("{}.preguntas", path),
            "solo las cuadriculas tienen preguntas anidadas",
        ));
    }

    // answer options: grid members inherit from the grid, numeric has bands
    if matches!(kind, QuestionKind::GridMember | QuestionKind::Numeric)
        && !doc.opciones_de_respuesta.is_empty()
    {
        errors.push(FieldError::new(
            format!("{}.opciones_de_respuesta", path),
            "no permitido para este tipo de pregunta",
        ));
    }

    // numeric bands and units are numeric-only
    if kind != QuestionKind::Numeric && !doc.criticidades_numericas.is_empty() {
        errors.push(FieldError::new(
            format!("{}.criticidades_numericas", path),
            "solo valido para preguntas numericas",
        ));
    }
    if kind != QuestionKind::Numeric && doc.unidades.is_some() {
        errors.push(FieldError::new(
            format!("{}.unidades", path),
            "solo valido para preguntas numericas",
        ));
    }

    errors
}

/// The answer kind a question expects. Grid members take the answer kind of
/// their grid's configured grid-kind.
pub fn expected_answer_kind(
    question_id: Uuid,
    questions: &HashMap<Uuid, QuestionInfo>,
) -> Option<AnswerKind> {
    let info = questions.get(&question_id)?;
    match info.kind {
        QuestionKind::Grid => Some(AnswerKind::Grid),
        QuestionKind::SingleChoice => Some(AnswerKind::SingleChoice),
        QuestionKind::MultiChoice => Some(AnswerKind::MultiChoice),
        QuestionKind::Numeric => Some(AnswerKind::Numeric),
        QuestionKind::GridMember => {
            let grid = info.parent_question_id.and_then(|id| questions.get(&id))?;
            match grid.grid_kind {
                Some(GridKind::SingleChoice) => Some(AnswerKind::SingleChoice),
                Some(GridKind::MultiChoice) => Some(AnswerKind::MultiChoice),
                None => None,
            }
        }
    }
}

/// Validate one answer node: kind present, kind matches the referenced
/// question, value fields populated per kind, sub-lists only where legal.
pub fn validate_answer(
    doc: &AnswerDoc,
    position: AnswerPosition,
    questions: &HashMap<Uuid, QuestionInfo>,
    path: &str,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let kind = match doc.tipo_de_respuesta {
        Some(kind) => kind,
        None => {
            errors.push(FieldError::new(
                format!("{}.tipo_de_respuesta", path),
                "requerido",
            ));
            return errors;
        }
    };

    // position vs kind
    match position {
        AnswerPosition::MultiChoiceChild => {
            if kind != AnswerKind::MultiChoiceMember {
                errors.push(FieldError::new(
                    format!("{}.tipo_de_respuesta", path),
                    "las subrespuestas de seleccion multiple deben ser parte_de_seleccion_multiple",
                ));
                return errors;
            }
        }
        AnswerPosition::TopLevel | AnswerPosition::GridChild { .. } => {
            if kind == AnswerKind::MultiChoiceMember {
                errors.push(FieldError::new(
                    format!("{}.tipo_de_respuesta", path),
                    "parte_de_seleccion_multiple solo es valida como subrespuesta multiple",
                ));
                return errors;
            }
        }
    }

    // question reference; null is legal only for multi-choice members
    if kind == AnswerKind::MultiChoiceMember {
        if doc.opcion_respondida.is_none() {
            errors.push(FieldError::new(
                format!("{}.opcion_respondida", path),
                "requerido",
            ));
        }
        if doc.opcion_respondida_esta_seleccionada.is_none() {
            errors.push(FieldError::new(
                format!("{}.opcion_respondida_esta_seleccionada", path),
                "requerido",
            ));
        }
    } else {
        match doc.pregunta {
            None => {
                errors.push(FieldError::new(format!("{}.pregunta", path), "requerido"));
                return errors;
            }
            Some(question_id) => {
                let info = match questions.get(&question_id) {
                    Some(info) => info,
                    None => {
                        errors.push(FieldError::new(
                            format!("{}.pregunta", path),
                            "la pregunta no pertenece al cuestionario",
                        ));
                        return errors;
                    }
                };

                match expected_answer_kind(question_id, questions) {
                    Some(expected) if expected == kind => {}
                    _ => {
                        errors.push(FieldError::new(
                            format!("{}.tipo_de_respuesta", path),
                            format!(
                                "no corresponde al tipo de la pregunta ({})",
                                info.kind.as_str()
                            ),
                        ));
                    }
                }

                match position {
                    AnswerPosition::TopLevel => {
                        if info.kind == QuestionKind::GridMember {
                            errors.push(FieldError::new(
                                format!("{}.pregunta", path),
                                "una parte de cuadricula se responde dentro de su cuadricula",
                            ));
                        }
                    }
                    AnswerPosition::GridChild { grid_question } => {
                        if info.parent_question_id != Some(grid_question) {
                            errors.push(FieldError::new(
                                format!("{}.pregunta", path),
                                "la pregunta no es parte de la cuadricula respondida",
                            ));
                        }
                    }
                    AnswerPosition::MultiChoiceChild => {}
                }
            }
        }
    }

    // value fields per kind
    let requires_selected = kind == AnswerKind::SingleChoice;
    if requires_selected && doc.opcion_seleccionada.is_none() {
        errors.push(FieldError::new(
            format!("{}.opcion_seleccionada", path),
            "requerido para seleccion unica",
        ));
    }
    if !requires_selected && doc.opcion_seleccionada.is_some() {
        errors.push(FieldError::new(
            format!("{}.opcion_seleccionada", path),
            "solo valido para seleccion unica",
        ));
    }

    if kind == AnswerKind::Numeric && doc.valor_numerico.is_none() {
        errors.push(FieldError::new(
            format!("{}.valor_numerico", path),
            "requerido para respuestas numericas",
        ));
    }
    if kind != AnswerKind::Numeric && doc.valor_numerico.is_some() {
        errors.push(FieldError::new(
            format!("{}.valor_numerico", path),
            "solo valido para respuestas numericas",
        ));
    }

    if kind != AnswerKind::MultiChoiceMember && doc.opcion_respondida.is_some() {
        errors.push(FieldError::new(
            format!("{}.opcion_respondida", path),
            "solo valido para parte_de_seleccion_multiple",
        ));
    }

    // sub-answer lists only on their container kinds
    if kind != AnswerKind::Grid && !doc.subrespuestas_cuadricula.is_empty() {
        errors.push(FieldError::new(
            format!("{}.subrespuestas_cuadricula", path),
            "solo valido para respuestas de cuadricula",
        ));
    }
    if kind != AnswerKind::MultiChoice && !doc.subrespuestas_multiple.is_empty() {
        errors.push(FieldError::new(
            format!("{}.subrespuestas_multiple", path),
            "solo valido para respuestas de seleccion multiple",
        ));
    }

    errors
}
