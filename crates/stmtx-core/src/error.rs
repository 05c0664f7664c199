//! Error types for stmtx

use std::fmt;

use thiserror::Error;

use crate::StatementKind;

/// Error reported by a driver implementation.
///
/// Drivers translate their native failures into one of these variants; the
/// statement strategies then wrap them with phase context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for driver-level operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Lifecycle phase in which a statement failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Prepare,
    Parameterize,
    Update,
    Query,
    Cursor,
    Batch,
    Close,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Parameterize => "parameterize",
            Phase::Update => "update",
            Phase::Query => "query",
            Phase::Cursor => "cursor",
            Phase::Batch => "batch",
            Phase::Close => "close",
        };
        f.write_str(name)
    }
}

/// Error raised by statement routing and execution
#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Failed to prepare {kind} statement: {source}")]
    Preparation {
        kind: StatementKind,
        #[source]
        source: DriverError,
    },

    #[error("Failed to bind parameters of {kind} statement: {message}")]
    ParameterBinding {
        kind: StatementKind,
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    #[error("{kind} statement failed during {phase}: {source}")]
    Execution {
        kind: StatementKind,
        phase: Phase,
        #[source]
        source: DriverError,
    },

    #[error(
        "Batch entry {index} of {kind} statement failed after {} successful entries: {source}",
        .update_counts.len()
    )]
    Batch {
        kind: StatementKind,
        index: usize,
        update_counts: Vec<u64>,
        #[source]
        source: DriverError,
    },

    #[error("Failed to process results: {0}")]
    ResultProcessing(String),

    #[error("Unsupported statement kind: {0}")]
    UnsupportedStatementKind(String),

    #[error("{kind} statement is already closed")]
    AlreadyClosed { kind: StatementKind },

    #[error("{kind} statement has not been prepared")]
    NotPrepared { kind: StatementKind },

    #[error("{kind} statement is already prepared")]
    AlreadyPrepared { kind: StatementKind },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StatementError {
    /// Build a binding error that did not originate in the driver
    pub fn binding(kind: StatementKind, message: impl Into<String>) -> Self {
        Self::ParameterBinding {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// The phase this error belongs to, when it is tied to one
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Preparation { .. } => Some(Phase::Prepare),
            Self::ParameterBinding { .. } => Some(Phase::Parameterize),
            Self::Execution { phase, .. } => Some(*phase),
            Self::Batch { .. } => Some(Phase::Batch),
            _ => None,
        }
    }

    /// The driver error wrapped by this error, if any
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Preparation { source, .. }
            | Self::Execution { source, .. }
            | Self::Batch { source, .. } => Some(source),
            Self::ParameterBinding { source, .. } => source.as_ref(),
            _ => None,
        }
    }
}

/// Result type alias for statement operations
pub type Result<T> = std::result::Result<T, StatementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_names_kind_and_phase() {
        let err = StatementError::Execution {
            kind: StatementKind::Parameterized,
            phase: Phase::Update,
            source: DriverError::Constraint("UNIQUE constraint failed: t.id".into()),
        };

        assert_eq!(
            err.to_string(),
            "parameterized statement failed during update: Constraint violation: UNIQUE constraint failed: t.id"
        );
        assert_eq!(err.phase(), Some(Phase::Update));
        assert!(matches!(err.driver_error(), Some(DriverError::Constraint(_))));
    }

    #[test]
    fn test_batch_error_reports_completed_entries() {
        let err = StatementError::Batch {
            kind: StatementKind::Direct,
            index: 2,
            update_counts: vec![1, 1],
            source: DriverError::Other("boom".into()),
        };

        assert_eq!(
            err.to_string(),
            "Batch entry 2 of direct statement failed after 2 successful entries: boom"
        );
    }

    #[test]
    fn test_binding_error_without_driver_source() {
        let err = StatementError::binding(StatementKind::Procedural, "expected 2 parameters, got 1");

        assert_eq!(err.phase(), Some(Phase::Parameterize));
        assert!(err.driver_error().is_none());
        assert_eq!(
            err.to_string(),
            "Failed to bind parameters of procedural statement: expected 2 parameters, got 1"
        );
    }
}
