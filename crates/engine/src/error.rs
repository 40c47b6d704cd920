// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Engine error type
//!
//! An [`EngineError`] is what the collaborator reports for a failed statement
//! or a failed connection attempt. Statement errors are ordinary results to the
//! harness; only the [`ErrorKind`] tells it whether the session is still usable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// SQLSTATE for statements rejected inside a failed transaction
pub const SQLSTATE_IN_FAILED_SQL_TRANSACTION: &str = "25P02";

/// How an engine error affects the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The statement failed; the session is usable
    Statement,
    /// The statement was rejected because the current transaction is aborted
    TransactionAborted,
    /// The connection is gone
    ConnectionLost,
}

/// Error reported by the SQL engine
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct EngineError {
    /// Full error message as the engine reports it
    pub message: String,
    /// SQLSTATE or engine-specific code
    pub code: Option<String>,
    pub kind: ErrorKind,
}

impl EngineError {
    /// An ordinary statement error
    pub fn statement(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind: ErrorKind::Statement,
        }
    }

    /// A statement rejected by an aborted transaction
    pub fn transaction_aborted(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(SQLSTATE_IN_FAILED_SQL_TRANSACTION.to_string()),
            kind: ErrorKind::TransactionAborted,
        }
    }

    /// The connection failed or was lost
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind: ErrorKind::ConnectionLost,
        }
    }

    /// Attach an error code; the SQLSTATE for aborted transactions also sets the kind
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        if code == SQLSTATE_IN_FAILED_SQL_TRANSACTION && self.kind == ErrorKind::Statement {
            self.kind = ErrorKind::TransactionAborted;
        }
        self.code = Some(code);
        self
    }

    pub fn is_connection_lost(&self) -> bool {
        self.kind == ErrorKind::ConnectionLost
    }

    pub fn is_transaction_aborted(&self) -> bool {
        self.kind == ErrorKind::TransactionAborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classifies_aborted_transaction() {
        let err = EngineError::statement(
            "current transaction is aborted, commands ignored until end of transaction block",
        )
        .with_code("25P02");
        assert!(err.is_transaction_aborted());

        let err = EngineError::statement("division by zero").with_code("22012");
        assert_eq!(err.kind, ErrorKind::Statement);
        assert_eq!(err.code.as_deref(), Some("22012"));
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn test_connection_lost() {
        let err = EngineError::connection_lost("connection reset by peer");
        assert!(err.is_connection_lost());
        assert!(!err.is_transaction_aborted());
    }
}
