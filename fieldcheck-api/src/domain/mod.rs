//! Domain logic: tree validation, criticality resolution, and the
//! flatten-then-persist builders for questionnaire and answer trees.

pub mod answer_builder;
pub mod criticality;
pub mod questionnaire_builder;
pub mod validator;
