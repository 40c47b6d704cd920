// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for sql-regress
//!
//! This crate provides common testing components including:
//! - An in-memory, session-aware mock engine
//! - A scripted engine with canned responses and delays
//! - Verdict assertions
//! - Sample regression files

pub mod assertions;
pub mod fixtures;
pub mod mock_engine;
mod mock_sql;
pub mod scripted_engine;

use std::sync::Once;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Re-exports for convenience
pub use mock_engine::{MockEngine, MockSession};
pub use scripted_engine::ScriptedEngine;

/// Install a test-friendly tracing subscriber once per process
///
/// Filtering follows `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        // Another subscriber may already be installed by the test binary
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
