// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Engine traits
//!
//! The SQL engine under test is reached through two traits. A [`SqlEngine`]
//! opens client connections; an [`EngineSession`] is one connection and owns
//! all of its session state (transactions, settings, temporary objects).

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::output::EngineOutput;

/// Transaction state of a session, as reported after each statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    /// Not inside a transaction block
    Idle,
    InTransaction,
    /// Inside a failed transaction block; statements are rejected until rollback
    Failed,
    /// The engine does not report transaction state
    #[default]
    Unknown,
}

/// Factory for client connections to the engine under test
///
/// # Examples
///
/// ```rust,ignore
/// use sql_regress_engine::{SqlEngine, EngineOutput};
///
/// async fn count(engine: &dyn SqlEngine) -> Result<u64, sql_regress_engine::EngineError> {
///     let mut session = engine.connect().await?;
///     let output = session.execute("SELECT * FROM t;").await?;
///     Ok(output.row_count())
/// }
/// ```
#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Open a fresh connection with default session state
    ///
    /// # Errors
    ///
    /// Returns an error of kind `ConnectionLost` if the engine is unreachable.
    async fn connect(&self) -> EngineResult<Box<dyn EngineSession>>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "engine"
    }
}

/// One client connection
#[async_trait]
pub trait EngineSession: Send {
    /// Execute a single SQL statement
    ///
    /// A failed statement is reported as an `EngineError`. The session stays
    /// usable unless the error kind is `ConnectionLost`.
    async fn execute(&mut self, sql: &str) -> Result<EngineOutput, EngineError>;

    /// Transaction state after the last statement
    fn transaction_status(&self) -> TransactionStatus {
        TransactionStatus::Unknown
    }

    /// Close the connection, best effort
    async fn close(self: Box<Self>) {}
}
