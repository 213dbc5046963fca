//! Gateway configuration.
//!
//! ```toml
//! source_path = "docs/erd.mmd"
//! source_id = "erd.mmd"
//! audit_enabled = true
//! caller_context = "prd-generator"
//! ```

use crate::error::AuthorityError;
use anyhow::{Context, Result};
use erm_prov::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE_ID: &str = "erd.mmd";
pub const DEFAULT_ISSUER: &str = "erm-authority";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Path of the authoritative diagram file.
    pub source_path: PathBuf,
    /// Identifier mixed into every signature and record.
    pub source_id: String,
    /// Identity written into issued certificates.
    pub issuer: String,
    /// Emit an access event for every read call.
    pub audit_enabled: bool,
    /// Caller description attached to access events.
    pub caller_context: String,
    pub rejected_log_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_ID),
            source_id: DEFAULT_SOURCE_ID.to_string(),
            issuer: DEFAULT_ISSUER.to_string(),
            audit_enabled: false,
            caller_context: "unknown".to_string(),
            rejected_log_capacity: StoreConfig::default().rejected_log_capacity,
        }
    }
}

impl GatewayConfig {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            ..Self::default()
        }
    }

    pub fn with_audit(mut self, caller_context: impl Into<String>) -> Self {
        self.audit_enabled = true;
        self.caller_context = caller_context.into();
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self, AuthorityError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a TOML config file. A relative `source_path` resolves against the
    /// config file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read gateway config {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse gateway config {}", path.display()))?;
        if config.source_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.source_path = dir.join(&config.source_path);
            }
        }
        Ok(config)
    }

    pub(crate) fn store_config(&self) -> StoreConfig {
        StoreConfig {
            issuer: self.issuer.clone(),
            rejected_log_capacity: self.rejected_log_capacity,
        }
    }
}
