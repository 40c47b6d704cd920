// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Harness entry points
//!
//! [`Harness`] ties the pieces together: resolve the requested files against
//! a registry, replay the plan on one fresh session, aggregate the outcomes.
//! [`run_tests`] is the one-call form for `#[tokio::test]` functions that use
//! the process-wide registry.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sql_regress_engine::SqlEngine;
use sql_regress_fixture::{FileName, Registry, ResolvedFile, resolve_plan};

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::executor::Executor;
use crate::verdict::{RunVerdict, aggregate};

/// Runs regression files from a registry against an engine
pub struct Harness<'r> {
    registry: &'r Registry,
    engine: Arc<dyn SqlEngine>,
    config: HarnessConfig,
    cancel: CancellationToken,
}

impl<'r> Harness<'r> {
    pub fn new(registry: &'r Registry, engine: Arc<dyn SqlEngine>) -> Self {
        Self {
            registry,
            engine,
            config: HarnessConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Token that cancels runs of this harness
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execution plan for the given files
    ///
    /// Seals the registry: once a run has been planned, no more files can be
    /// registered.
    pub fn plan(&self, names: &[FileName]) -> HarnessResult<Vec<ResolvedFile>> {
        self.registry.seal();
        Ok(resolve_plan(self.registry, names)?)
    }

    /// Run one file and its dependencies
    pub async fn run(&self, name: impl Into<FileName>) -> HarnessResult<RunVerdict> {
        self.run_many([name.into()]).await
    }

    /// Run several files in one session; shared dependencies run once
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Resolution` before anything executes if a file is
    /// missing or the dependencies form a cycle, and `HarnessError::Connect` if
    /// the engine cannot be reached.
    pub async fn run_many<I, N>(&self, names: I) -> HarnessResult<RunVerdict>
    where
        I: IntoIterator<Item = N>,
        N: Into<FileName>,
    {
        let names: Vec<FileName> = names.into_iter().map(Into::into).collect();
        let plan = self.plan(&names)?;

        info!(
            engine = %self.engine.name(),
            requested = ?names.iter().map(FileName::as_str).collect::<Vec<_>>(),
            files = plan.len(),
            "=== Starting regression run ==="
        );

        let executor = Executor::new(self.engine.clone(), self.config.clone())
            .with_cancellation(self.cancel.clone());
        let replay = executor.run(&plan).await?;
        let verdict = aggregate(&replay, self.config.dependency_reporting);

        let totals = verdict.totals();
        info!(
            passed = verdict.passed,
            matched = totals.passed,
            failed = totals.failed,
            not_run = totals.not_run,
            skipped = totals.skipped,
            "=== Regression run finished ==="
        );
        Ok(verdict)
    }
}

/// Run a registered file against `engine` and fail the calling test unless it passes
///
/// Uses the process-wide registry and [`HarnessConfig::from_env`].
///
/// # Panics
///
/// Panics with the error if the configuration is invalid, the file cannot be
/// resolved or the engine cannot be reached, and with the full report if any
/// statement fails.
pub async fn run_tests(engine: Arc<dyn SqlEngine>, name: &str) -> RunVerdict {
    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(err) => panic!("{}", err),
    };

    let harness = Harness::new(Registry::global(), engine).with_config(config);
    let verdict = match harness.run(name).await {
        Ok(verdict) => verdict,
        Err(err) => {
            error!(file = name, error = %err, "regression run could not start");
            panic!("regression file '{}': {}", name, err);
        }
    };

    if !verdict.passed {
        panic!("regression file '{}': {}", name, verdict);
    }
    verdict
}
