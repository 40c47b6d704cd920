// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL Regress - Engine Interface
//!
//! The boundary between the regression harness and the SQL engine under test.
//!
//! The harness only ever asks an engine to open a connection and to execute
//! one statement on it. Everything else (parsing, planning, storage, session
//! semantics) belongs to the engine.
//!
//! ## Implementations
//!
//! - [`postgres::PostgresEngine`]: live PostgreSQL over `sqlx` (feature `postgres`)
//! - in-memory and scripted engines for tests live in `sql-regress-test-utils`
//!
//! ## Implementing an Engine
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use sql_regress_engine::{EngineError, EngineOutput, EngineResult, EngineSession, SqlEngine};
//!
//! struct MyEngine;
//! struct MySession;
//!
//! #[async_trait]
//! impl SqlEngine for MyEngine {
//!     async fn connect(&self) -> EngineResult<Box<dyn EngineSession>> {
//!         Ok(Box::new(MySession))
//!     }
//! }
//!
//! #[async_trait]
//! impl EngineSession for MySession {
//!     async fn execute(&mut self, sql: &str) -> Result<EngineOutput, EngineError> {
//!         Ok(EngineOutput::Affected(0))
//!     }
//! }
//! ```

pub mod error;
pub mod output;
pub mod r#trait;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{EngineError, EngineResult, ErrorKind, SQLSTATE_IN_FAILED_SQL_TRANSACTION};
pub use output::{EngineOutput, QueryOutput};
pub use r#trait::{EngineSession, SqlEngine, TransactionStatus};
