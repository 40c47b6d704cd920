// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL Regress - Runner
//!
//! Replays registered regression files against a SQL engine and reports
//! whether the engine still answers every statement the way it was recorded.
//!
//! ## Architecture
//!
//! ```text
//! Registry -> resolve_plan -> Executor (one Session) -> Comparator -> aggregate -> RunVerdict
//! ```
//!
//! - [`directive`]: classification of statement text into SQL and client directives
//! - [`session`]: the engine connection plus client-side state
//! - [`executor`]: sequential replay, abort policy, recovery, timeout and cancellation
//! - [`compare`]: expectation checks
//! - [`verdict`]: outcomes, failures and per-file tallies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sql_regress_runner::run_tests;
//!
//! #[tokio::test]
//! async fn test_numeric() {
//!     let engine = Arc::new(PostgresEngine::from_env().unwrap());
//!     run_tests(engine, "numeric").await;
//! }
//! ```

pub mod compare;
pub mod config;
pub mod directive;
pub mod error;
pub mod executor;
pub mod harness;
pub mod session;
pub mod verdict;

pub use compare::{Comparator, Comparison, Mismatch, MismatchKind};
pub use config::{AbortPolicy, DependencyReporting, HarnessConfig};
pub use directive::{Command, Directive, Variables};
pub use error::{ConfigError, DirectiveError, HarnessError, HarnessResult};
pub use executor::Executor;
pub use harness::{Harness, run_tests};
pub use session::Session;
pub use verdict::{
    Failure, FailureDetail, FileTally, NotRunReason, OutcomeStatus, Replay, RunFault, RunVerdict,
    SessionFault, StatementOutcome, Totals, aggregate,
};
