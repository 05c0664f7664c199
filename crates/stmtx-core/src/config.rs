//! Executor configuration loaded from TOML
//!
//! ```toml
//! default_statement_timeout = 30
//! default_fetch_size = 500
//! enabled_kinds = ["direct", "parameterized"]
//!
//! [[statement]]
//! id = "insertUser"
//! kind = "prepared"
//!
//! [statement.settings]
//! timeout = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{ExecutionSettings, MappedStatement, Result, ResultSetType, StatementError, StatementKind};

fn all_kinds() -> Vec<StatementKind> {
    StatementKind::ALL.to_vec()
}

/// Executor-wide defaults and mapped statement definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Statement timeout in seconds used when a statement sets none
    #[serde(default)]
    pub default_statement_timeout: Option<u32>,
    /// Fetch size used when a statement sets none
    #[serde(default)]
    pub default_fetch_size: Option<u32>,
    /// Result-set type used when a statement keeps the forward-only default
    #[serde(default)]
    pub default_result_set_type: Option<ResultSetType>,
    /// Statement kinds the router may select
    #[serde(default = "all_kinds")]
    pub enabled_kinds: Vec<StatementKind>,
    /// Mapped statement definitions
    #[serde(default, rename = "statement")]
    pub statements: Vec<MappedStatement>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_statement_timeout: None,
            default_fetch_size: None,
            default_result_set_type: None,
            enabled_kinds: all_kinds(),
            statements: Vec::new(),
        }
    }
}

impl ExecutorConfig {
    /// Parse and validate a configuration document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: ExecutorConfig = toml::from_str(source)
            .map_err(|e| StatementError::Configuration(format!("invalid executor config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading executor config");
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_fetch_size == Some(0) {
            return Err(StatementError::Configuration(
                "default_fetch_size must be a positive number of rows".into(),
            ));
        }
        if self.enabled_kinds.is_empty() {
            return Err(StatementError::Configuration(
                "at least one statement kind must be enabled".into(),
            ));
        }
        for statement in &self.statements {
            statement.settings.validate().map_err(|e| {
                StatementError::Configuration(format!("statement '{}': {}", statement.id, e))
            })?;
        }
        Ok(())
    }

    pub fn is_enabled(&self, kind: StatementKind) -> bool {
        self.enabled_kinds.contains(&kind)
    }

    /// Look up a mapped statement definition by id
    pub fn mapped_statement(&self, id: &str) -> Option<&MappedStatement> {
        self.statements.iter().find(|s| s.id == id)
    }

    /// Fill the gaps of a statement's settings with the configured defaults
    pub fn resolve_settings(&self, settings: &ExecutionSettings) -> ExecutionSettings {
        let mut resolved = settings.clone();
        if resolved.timeout.is_none() {
            resolved.timeout = self.default_statement_timeout;
        }
        if resolved.fetch_size.is_none() {
            resolved.fetch_size = self.default_fetch_size;
        }
        if resolved.result_set_type == ResultSetType::ForwardOnly
            && let Some(default_type) = self.default_result_set_type
        {
            resolved.result_set_type = default_type;
        }
        resolved
    }
}
