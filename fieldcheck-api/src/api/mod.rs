//! HTTP API handlers for fieldcheck-api

pub mod assets;
pub mod extract;
pub mod health;
pub mod identity;
pub mod inspections;
pub mod photos;
pub mod questionnaires;
pub mod types;
pub mod vocabularies;

pub use identity::Identity;
