//! Storage queries for fieldcheck-api
//!
//! Write helpers take `&mut SqliteConnection` so they compose inside one
//! transaction; read/assembly helpers take the pool.

pub mod assets;
pub mod inspections;
pub mod photos;
pub mod questionnaires;
pub mod tags;
pub mod vocabularies;
