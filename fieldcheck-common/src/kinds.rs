//! Closed node-kind enums for the questionnaire/answer trees.
//!
//! The wire protocol and the database both use the Spanish tag strings
//! (`cuadricula`, `seleccion_unica`, ...); these enums keep matching
//! exhaustive at compile time instead of comparing strings at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a question node within a questionnaire tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    /// Container grouping repeated sibling sub-questions sharing one
    /// answer-option set. Requires `tipo_de_cuadricula`.
    #[serde(rename = "cuadricula")]
    Grid,
    /// Member of a grid; owned by the grid question, never by a block.
    /// Inherits the grid's answer options.
    #[serde(rename = "parte_de_cuadricula")]
    GridMember,
    /// Leaf answered by selecting exactly one option.
    #[serde(rename = "seleccion_unica")]
    SingleChoice,
    /// Leaf answered by marking each option selected or not.
    #[serde(rename = "seleccion_multiple")]
    MultiChoice,
    /// Leaf answered with a numeric value, scored via criticality bands.
    #[serde(rename = "numerica")]
    Numeric,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Grid => "cuadricula",
            QuestionKind::GridMember => "parte_de_cuadricula",
            QuestionKind::SingleChoice => "seleccion_unica",
            QuestionKind::MultiChoice => "seleccion_multiple",
            QuestionKind::Numeric => "numerica",
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cuadricula" => Ok(QuestionKind::Grid),
            "parte_de_cuadricula" => Ok(QuestionKind::GridMember),
            "seleccion_unica" => Ok(QuestionKind::SingleChoice),
            "seleccion_multiple" => Ok(QuestionKind::MultiChoice),
            "numerica" => Ok(QuestionKind::Numeric),
            other => Err(format!("unknown question kind: {}", other)),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of answers a grid's members produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridKind {
    #[serde(rename = "seleccion_unica")]
    SingleChoice,
    #[serde(rename = "seleccion_multiple")]
    MultiChoice,
}

impl GridKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridKind::SingleChoice => "seleccion_unica",
            GridKind::MultiChoice => "seleccion_multiple",
        }
    }
}

impl FromStr for GridKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seleccion_unica" => Ok(GridKind::SingleChoice),
            "seleccion_multiple" => Ok(GridKind::MultiChoice),
            other => Err(format!("unknown grid kind: {}", other)),
        }
    }
}

/// Kind of an answer node. Mirrors [`QuestionKind`] plus the
/// multi-choice-member case, which answers one option of a
/// multi-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerKind {
    #[serde(rename = "cuadricula")]
    Grid,
    #[serde(rename = "seleccion_unica")]
    SingleChoice,
    #[serde(rename = "seleccion_multiple")]
    MultiChoice,
    #[serde(rename = "parte_de_seleccion_multiple")]
    MultiChoiceMember,
    #[serde(rename = "numerica")]
    Numeric,
}

impl AnswerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerKind::Grid => "cuadricula",
            AnswerKind::SingleChoice => "seleccion_unica",
            AnswerKind::MultiChoice => "seleccion_multiple",
            AnswerKind::MultiChoiceMember => "parte_de_seleccion_multiple",
            AnswerKind::Numeric => "numerica",
        }
    }
}

impl FromStr for AnswerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cuadricula" => Ok(AnswerKind::Grid),
            "seleccion_unica" => Ok(AnswerKind::SingleChoice),
            "seleccion_multiple" => Ok(AnswerKind::MultiChoice),
            "parte_de_seleccion_multiple" => Ok(AnswerKind::MultiChoiceMember),
            "numerica" => Ok(AnswerKind::Numeric),
            other => Err(format!("unknown answer kind: {}", other)),
        }
    }
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of an answer photo. Assigned at attachment time;
/// an unattached photo has no classification yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoKind {
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "reparacion")]
    Repair,
}

impl PhotoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoKind::Base => "base",
            PhotoKind::Repair => "reparacion",
        }
    }
}

/// Which of the two tag vocabularies a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Asset,
    Question,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Asset => "activo",
            TagKind::Question => "pregunta",
        }
    }
}

/// Lifecycle state of an inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionState {
    #[serde(rename = "borrador")]
    Draft,
    #[serde(rename = "reparacion")]
    InRepair,
    #[serde(rename = "finalizada")]
    Finalized,
}

impl InspectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionState::Draft => "borrador",
            InspectionState::InRepair => "reparacion",
            InspectionState::Finalized => "finalizada",
        }
    }
}

impl FromStr for InspectionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrador" => Ok(InspectionState::Draft),
            "reparacion" => Ok(InspectionState::InRepair),
            "finalizada" => Ok(InspectionState::Finalized),
            other => Err(format!("unknown inspection state: {}", other)),
        }
    }
}

/// Role of a profile within its organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "inspector")]
    Inspector,
    #[serde(rename = "administrador")]
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Inspector => "inspector",
            Role::Administrator => "administrador",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inspector" => Ok(Role::Inspector),
            "administrador" => Ok(Role::Administrator),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}
