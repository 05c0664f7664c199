//! Mapped statement configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, StatementError};

/// Execution protocol used for a mapped statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Plain statement; the SQL text is sent verbatim, without placeholders
    #[serde(alias = "statement")]
    Direct,
    /// Prepared statement with positional placeholders
    #[serde(alias = "prepared")]
    Parameterized,
    /// Stored-routine call with in, out and in-out parameters
    #[serde(alias = "callable")]
    Procedural,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::Direct,
        StatementKind::Parameterized,
        StatementKind::Procedural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Direct => "direct",
            StatementKind::Parameterized => "parameterized",
            StatementKind::Procedural => "procedural",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementKind {
    type Err = StatementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "statement" => Ok(StatementKind::Direct),
            "parameterized" | "prepared" => Ok(StatementKind::Parameterized),
            "procedural" | "callable" => Ok(StatementKind::Procedural),
            _ => Err(StatementError::UnsupportedStatementKind(s.to_string())),
        }
    }
}

/// Scrolling behavior requested for result sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSetType {
    #[default]
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

impl ResultSetType {
    pub fn is_scrollable(&self) -> bool {
        !matches!(self, ResultSetType::ForwardOnly)
    }
}

/// Per-statement execution settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Rows fetched per driver round trip (driver default when unset)
    #[serde(default)]
    pub fetch_size: Option<u32>,
    /// Statement timeout in seconds (driver default when unset)
    #[serde(default)]
    pub timeout: Option<u32>,
    /// Result-set scrolling behavior
    #[serde(default)]
    pub result_set_type: ResultSetType,
    /// Ask the driver to stream rows instead of buffering them
    #[serde(default)]
    pub stream_results: bool,
}

impl ExecutionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_size(mut self, rows: u32) -> Self {
        self.fetch_size = Some(rows);
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_result_set_type(mut self, result_set_type: ResultSetType) -> Self {
        self.result_set_type = result_set_type;
        self
    }

    pub fn with_stream_results(mut self, stream: bool) -> Self {
        self.stream_results = stream;
        self
    }

    /// Reject settings no driver can honor
    pub fn validate(&self) -> Result<()> {
        if self.fetch_size == Some(0) {
            return Err(StatementError::Configuration(
                "fetch size must be a positive number of rows".into(),
            ));
        }
        Ok(())
    }
}

/// One explicit column to property mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub column: String,
    pub property: String,
}

/// Row-mapping metadata handed to result materializers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMapping {
    /// Explicit column mappings, matched case-insensitively
    #[serde(default)]
    pub columns: Vec<ResultColumn>,
    /// Map unlisted columns onto properties of the same name
    #[serde(default = "default_auto_mapping")]
    pub auto_mapping: bool,
}

fn default_auto_mapping() -> bool {
    true
}

impl Default for ResultMapping {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            auto_mapping: true,
        }
    }
}

impl ResultMapping {
    pub fn with_column(mut self, column: impl Into<String>, property: impl Into<String>) -> Self {
        self.columns.push(ResultColumn {
            column: column.into(),
            property: property.into(),
        });
        self
    }

    pub fn with_auto_mapping(mut self, auto_mapping: bool) -> Self {
        self.auto_mapping = auto_mapping;
        self
    }

    /// Property a column maps onto, or `None` when the column is not mapped
    pub fn property_for<'a>(&'a self, column: &'a str) -> Option<&'a str> {
        self.columns
            .iter()
            .find(|c| c.column.eq_ignore_ascii_case(column))
            .map(|c| c.property.as_str())
            .or(self.auto_mapping.then_some(column))
    }
}

/// How keys generated by the database are surfaced after an update
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum KeyGeneration {
    #[default]
    None,
    /// Read driver-generated keys into the listed properties, in order
    Generated { key_properties: Vec<String> },
}

/// Configuration of one mapped statement.
///
/// The kind is fixed for the lifetime of the configuration; the router uses
/// it to select the execution strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedStatement {
    pub id: String,
    pub kind: StatementKind,
    #[serde(default)]
    pub settings: ExecutionSettings,
    #[serde(default)]
    pub result_mapping: ResultMapping,
    #[serde(default)]
    pub key_generation: KeyGeneration,
}

impl MappedStatement {
    pub fn new(id: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            settings: ExecutionSettings::default(),
            result_mapping: ResultMapping::default(),
            key_generation: KeyGeneration::None,
        }
    }

    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_result_mapping(mut self, result_mapping: ResultMapping) -> Self {
        self.result_mapping = result_mapping;
        self
    }

    pub fn with_generated_keys<I, S>(mut self, key_properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_generation = KeyGeneration::Generated {
            key_properties: key_properties.into_iter().map(Into::into).collect(),
        };
        self
    }
}
