//! Wire types for the fieldcheck API
//!
//! Field names are the Spanish wire names the mobile clients already speak.
//! Submit documents (`*Doc`) carry write-only photo-id lists; response
//! documents (`*Response`) replace them with resolved `{id, url}` objects
//! and add server-computed fields.

use chrono::{DateTime, Utc};
use fieldcheck_common::kinds::{AnswerKind, GridKind, InspectionState, QuestionKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A (clave, valor) tag reference. Tags are deduplicated server-side by
/// natural key; clients always submit the pair, never an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagDoc {
    pub clave: String,
    pub valor: String,
}

/// A stored photo resolved to its serving URL.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoRef {
    pub id: Uuid,
    pub url: String,
}

/// A named hierarchical tag vocabulary. The tree under `json` is authored by
/// the clients and stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabularyDoc {
    pub nombre: String,
    pub json: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AssetDoc {
    pub id: String,
    #[serde(default)]
    pub etiquetas: Vec<TagDoc>,
}

/// POST /api/activos accepts one asset or an array (bulk spreadsheet load).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AssetSubmission {
    One(AssetDoc),
    Many(Vec<AssetDoc>),
}

#[derive(Debug, Serialize)]
pub struct AssetResponse {
    pub id: String,
    pub organizacion: String,
    pub etiquetas: Vec<TagDoc>,
}

// ---------------------------------------------------------------------------
// Questionnaires
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionnaireDoc {
    pub id: Uuid,
    pub tipo_de_inspeccion: String,
    pub version: i64,
    pub periodicidad_dias: i64,
    #[serde(default)]
    pub etiquetas_aplicables: Vec<TagDoc>,
    #[serde(default)]
    pub bloques: Vec<BlockDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDoc {
    pub n_orden: i64,
    #[serde(default)]
    pub titulo: Option<TitleDoc>,
    #[serde(default)]
    pub pregunta: Option<QuestionDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleDoc {
    pub id: Uuid,
    pub titulo: String,
    #[serde(default)]
    pub descripcion: String,
    /// Pre-uploaded photo ids to claim for this title
    #[serde(default)]
    pub fotos: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDoc {
    pub id: Uuid,
    pub titulo: String,
    #[serde(default)]
    pub descripcion: String,
    pub criticidad: i64,
    /// Absent is rejected by the validator; an unknown string is rejected
    /// at deserialization.
    #[serde(default)]
    pub tipo_de_pregunta: Option<QuestionKind>,
    #[serde(default)]
    pub tipo_de_cuadricula: Option<GridKind>,
    #[serde(default)]
    pub unidades: Option<String>,
    #[serde(default)]
    pub etiquetas: Vec<TagDoc>,
    /// Pre-uploaded guide photo ids
    #[serde(default)]
    pub fotos_guia: Vec<Uuid>,
    #[serde(default)]
    pub opciones_de_respuesta: Vec<AnswerOptionDoc>,
    #[serde(default)]
    pub criticidades_numericas: Vec<NumericBandDoc>,
    /// Grid member sub-questions (grid questions only)
    #[serde(default)]
    pub preguntas: Vec<QuestionDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerOptionDoc {
    pub id: Uuid,
    pub titulo: String,
    #[serde(default)]
    pub descripcion: String,
    pub criticidad: i64,
    #[serde(default)]
    pub requiere_criticidad_del_inspector: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumericBandDoc {
    pub id: Uuid,
    pub valor_minimo: f64,
    pub valor_maximo: f64,
    pub criticidad: i64,
}

#[derive(Debug, Serialize)]
pub struct QuestionnaireSummary {
    pub id: Uuid,
    pub tipo_de_inspeccion: String,
    pub version: i64,
    pub periodicidad_dias: i64,
    pub creador: Option<String>,
    pub etiquetas_aplicables: Vec<TagDoc>,
}

#[derive(Debug, Serialize)]
pub struct QuestionnaireResponse {
    pub id: Uuid,
    pub tipo_de_inspeccion: String,
    pub version: i64,
    pub periodicidad_dias: i64,
    pub creador: Option<String>,
    pub etiquetas_aplicables: Vec<TagDoc>,
    pub bloques: Vec<BlockResponse>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub id: Uuid,
    pub n_orden: i64,
    pub titulo: Option<TitleResponse>,
    pub pregunta: Option<QuestionResponse>,
}

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: Uuid,
    pub titulo: String,
    pub descripcion: String,
    pub fotos_urls: Vec<PhotoRef>,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub titulo: String,
    pub descripcion: String,
    pub criticidad: i64,
    pub tipo_de_pregunta: QuestionKind,
    pub tipo_de_cuadricula: Option<GridKind>,
    pub unidades: Option<String>,
    pub etiquetas: Vec<TagDoc>,
    pub fotos_guia_urls: Vec<PhotoRef>,
    pub opciones_de_respuesta: Vec<AnswerOptionResponse>,
    pub criticidades_numericas: Vec<NumericBandResponse>,
    pub preguntas: Vec<QuestionResponse>,
}

#[derive(Debug, Serialize)]
pub struct AnswerOptionResponse {
    pub id: Uuid,
    pub titulo: String,
    pub descripcion: String,
    pub criticidad: i64,
    pub requiere_criticidad_del_inspector: bool,
}

#[derive(Debug, Serialize)]
pub struct NumericBandResponse {
    pub id: Uuid,
    pub valor_minimo: f64,
    pub valor_maximo: f64,
    pub criticidad: i64,
}

// ---------------------------------------------------------------------------
// Inspections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct InspectionDoc {
    pub id: String,
    pub cuestionario: Uuid,
    pub activo: String,
    pub momento_inicio: DateTime<Utc>,
    #[serde(default)]
    pub estado: Option<InspectionState>,
    #[serde(default)]
    pub respuestas: Vec<AnswerDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerDoc {
    /// Server-generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Null is legal only for multi-choice-member answers
    #[serde(default)]
    pub pregunta: Option<Uuid>,
    #[serde(default)]
    pub tipo_de_respuesta: Option<AnswerKind>,
    #[serde(default)]
    pub observacion: String,
    #[serde(default)]
    pub reparado: bool,
    #[serde(default)]
    pub observacion_reparacion: String,
    #[serde(default)]
    pub momento_respuesta: Option<DateTime<Utc>>,
    /// Inspector-supplied override; replaces the resolved score when present
    #[serde(default)]
    pub criticidad_del_inspector: Option<i64>,
    #[serde(default)]
    pub opcion_seleccionada: Option<Uuid>,
    #[serde(default)]
    pub opcion_respondida: Option<Uuid>,
    #[serde(default)]
    pub opcion_respondida_esta_seleccionada: Option<bool>,
    #[serde(default)]
    pub valor_numerico: Option<f64>,
    #[serde(default)]
    pub fotos_base: Vec<Uuid>,
    #[serde(default)]
    pub fotos_reparacion: Vec<Uuid>,
    #[serde(default)]
    pub subrespuestas_cuadricula: Vec<AnswerDoc>,
    #[serde(default)]
    pub subrespuestas_multiple: Vec<AnswerDoc>,
}

#[derive(Debug, Serialize)]
pub struct InspectionSummary {
    pub id: String,
    pub cuestionario: Uuid,
    pub activo: String,
    pub inspector: Option<String>,
    pub momento_inicio: DateTime<Utc>,
    pub momento_subida: DateTime<Utc>,
    pub estado: InspectionState,
    pub criticidad_calculada: i64,
    pub criticidad_calculada_con_reparaciones: i64,
}

#[derive(Debug, Serialize)]
pub struct InspectionResponse {
    pub id: String,
    pub cuestionario: Uuid,
    pub activo: String,
    pub inspector: Option<String>,
    pub momento_inicio: DateTime<Utc>,
    pub momento_subida: DateTime<Utc>,
    pub estado: InspectionState,
    pub criticidad_calculada: i64,
    pub criticidad_calculada_con_reparaciones: i64,
    pub respuestas: Vec<AnswerResponse>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub id: Uuid,
    pub pregunta: Option<Uuid>,
    pub tipo_de_respuesta: AnswerKind,
    pub observacion: String,
    pub reparado: bool,
    pub observacion_reparacion: String,
    pub momento_respuesta: Option<DateTime<Utc>>,
    pub criticidad_del_inspector: Option<i64>,
    pub criticidad_calculada: i64,
    pub criticidad_calculada_con_reparaciones: i64,
    pub opcion_seleccionada: Option<Uuid>,
    pub opcion_respondida: Option<Uuid>,
    pub opcion_respondida_esta_seleccionada: Option<bool>,
    pub valor_numerico: Option<f64>,
    pub fotos_base_url: Vec<PhotoRef>,
    pub fotos_reparacion_url: Vec<PhotoRef>,
    pub subrespuestas_cuadricula: Vec<AnswerResponse>,
    pub subrespuestas_multiple: Vec<AnswerResponse>,
}

/// Photo upload result: submitted filename → stored photo id.
pub type UploadedPhotos = std::collections::HashMap<String, Uuid>;
