// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Run deadline and cancellation

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use sql_regress_fixture::{Registry, RegressionFile, RegressionFileStatement as Stmt};
use sql_regress_runner::{Harness, HarnessConfig, NotRunReason};
use sql_regress_test_utils::assertions::{assert_failed, assert_not_run_reason, assert_tally};
use sql_regress_test_utils::{ScriptedEngine, init_tracing};

fn registry() -> Registry {
    let registry = Registry::new();
    registry
        .register(RegressionFile::new("slow").statements_from([
            Stmt::new("SELECT 1;"),
            Stmt::new("SELECT pg_sleep(30);"),
            Stmt::new("SELECT 2;"),
        ]))
        .unwrap();
    registry
        .register(RegressionFile::new("later").statement(Stmt::new("SELECT 3;")))
        .unwrap();
    registry
}

#[tokio::test]
async fn test_timeout_marks_rest_not_run() -> Result<()> {
    init_tracing();
    let registry = registry();
    let engine = ScriptedEngine::new().with_delay("pg_sleep", Duration::from_secs(30));
    let config = HarnessConfig::default().with_timeout_secs(1);

    let verdict = Harness::new(&registry, Arc::new(engine.clone()))
        .with_config(config)
        .run_many(["slow", "later"])
        .await?;

    assert_failed(&verdict)?;
    assert_tally(&verdict, "slow", &[0], &[], &[1, 2])?;
    assert_tally(&verdict, "later", &[], &[], &[0])?;
    assert_not_run_reason(&verdict, NotRunReason::Timeout)?;
    assert!(!engine.executed().iter().any(|sql| sql == "SELECT 2;"));
    Ok(())
}

#[tokio::test]
async fn test_cancellation_marks_rest_not_run() -> Result<()> {
    init_tracing();
    let registry = registry();
    let engine = ScriptedEngine::new().with_delay("pg_sleep", Duration::from_secs(30));
    let token = CancellationToken::new();
    let harness = Harness::new(&registry, Arc::new(engine)).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let verdict = harness.run_many(["slow", "later"]).await?;
    canceller.await?;

    assert_tally(&verdict, "slow", &[0], &[], &[1, 2])?;
    assert_not_run_reason(&verdict, NotRunReason::Cancelled)?;
    Ok(())
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() -> Result<()> {
    init_tracing();
    let registry = registry();
    let engine = ScriptedEngine::new();
    let harness = Harness::new(&registry, Arc::new(engine.clone()));
    harness.cancellation_token().cancel();

    let verdict = harness.run("slow").await?;

    assert_tally(&verdict, "slow", &[], &[], &[0, 1, 2])?;
    assert_not_run_reason(&verdict, NotRunReason::Cancelled)?;
    assert!(engine.executed().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_timeout_not_reached() -> Result<()> {
    init_tracing();
    let registry = registry();
    let engine = ScriptedEngine::new().with_delay("pg_sleep", Duration::from_millis(10));
    let config = HarnessConfig::default().with_timeout_secs(30);

    let verdict = Harness::new(&registry, Arc::new(engine))
        .with_config(config)
        .run("slow")
        .await?;

    assert!(verdict.passed, "{}", verdict);
    Ok(())
}
