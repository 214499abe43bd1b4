//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line argument (handled by the binary's clap layer)
//! 2. Environment variables (`FIELDCHECK_*`)
//! 3. TOML config file
//! 4. Compiled defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Whether tag (key, value) uniqueness is shared across tenants or scoped
/// per organization. The legacy constraint was global; per-organization is
/// the tenant-isolated default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagScope {
    Global,
    Organization,
}

impl TagScope {
    /// The scope component of a tag's unique key for the given organization.
    pub fn key_for(&self, organization_id: &str) -> String {
        match self {
            TagScope::Global => "global".to_string(),
            TagScope::Organization => organization_id.to_string(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Directory uploaded photos are stored under (served at /media)
    pub media_dir: PathBuf,
    /// Tag uniqueness scope
    pub tag_scope: TagScope,
    /// Unattached photos older than this are garbage-collected after a
    /// successful answer-tree build
    pub orphan_photo_grace_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5830".to_string(),
            database_path: PathBuf::from("fieldcheck.db"),
            media_dir: PathBuf::from("media"),
            tag_scope: TagScope::Organization,
            orphan_photo_grace_secs: 3600,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply
    /// environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("invalid config file: {}", e)))?
            }
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("FIELDCHECK_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("FIELDCHECK_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("FIELDCHECK_MEDIA_DIR") {
            self.media_dir = PathBuf::from(dir);
        }
        if let Ok(scope) = std::env::var("FIELDCHECK_TAG_SCOPE") {
            match scope.as_str() {
                "global" => self.tag_scope = TagScope::Global,
                "organization" => self.tag_scope = TagScope::Organization,
                other => tracing::warn!("ignoring unknown FIELDCHECK_TAG_SCOPE: {}", other),
            }
        }
        if let Ok(secs) = std::env::var("FIELDCHECK_ORPHAN_PHOTO_GRACE_SECS") {
            match secs.parse() {
                Ok(v) => self.orphan_photo_grace_secs = v,
                Err(_) => {
                    tracing::warn!("ignoring non-numeric FIELDCHECK_ORPHAN_PHOTO_GRACE_SECS")
                }
            }
        }
    }
}
