// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Engine with canned responses
//!
//! [`ScriptedEngine`] answers each statement from a table keyed by the
//! statement text, and records every statement it receives. Statements
//! without a scripted response succeed with no rows. Delays let tests drive
//! the harness timeout and cancellation paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sql_regress_engine::{
    EngineError, EngineOutput, EngineResult, EngineSession, QueryOutput, SqlEngine,
};
use sql_regress_fixture::Row;

#[derive(Debug, Clone)]
enum Response {
    Output(EngineOutput),
    Error(EngineError),
}

#[derive(Debug, Clone, Default)]
struct Script {
    responses: HashMap<String, Response>,
    delays: Vec<(String, Duration)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Script>,
    executed: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn script_mut(&mut self) -> &mut Script {
        Arc::make_mut(&mut self.script)
    }

    /// Answer `sql` with a row set
    pub fn on_rows(mut self, sql: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        let output = QueryOutput::new(columns.iter().map(|c| c.to_string()).collect(), rows);
        self.script_mut()
            .responses
            .insert(sql.trim().to_string(), Response::Output(EngineOutput::Rows(output)));
        self
    }

    /// Answer `sql` with an affected-row count
    pub fn on_affected(mut self, sql: &str, count: u64) -> Self {
        self.script_mut().responses.insert(
            sql.trim().to_string(),
            Response::Output(EngineOutput::Affected(count)),
        );
        self
    }

    /// Fail `sql` with this error
    pub fn on_error(mut self, sql: &str, error: EngineError) -> Self {
        self.script_mut()
            .responses
            .insert(sql.trim().to_string(), Response::Error(error));
        self
    }

    /// Sleep before answering statements that contain `fragment`
    pub fn with_delay(mut self, fragment: &str, delay: Duration) -> Self {
        self.script_mut().delays.push((fragment.to_string(), delay));
        self
    }

    /// Statements received so far, in order, across all sessions
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlEngine for ScriptedEngine {
    async fn connect(&self) -> EngineResult<Box<dyn EngineSession>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            executed: self.executed.clone(),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedSession {
    script: Arc<Script>,
    executed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EngineSession for ScriptedSession {
    async fn execute(&mut self, sql: &str) -> Result<EngineOutput, EngineError> {
        self.executed.lock().unwrap().push(sql.to_string());

        if let Some((_, delay)) = self.script.delays.iter().find(|(f, _)| sql.contains(f.as_str())) {
            tokio::time::sleep(*delay).await;
        }

        match self.script.responses.get(sql.trim()) {
            Some(Response::Output(output)) => Ok(output.clone()),
            Some(Response::Error(error)) => Err(error.clone()),
            None => Ok(EngineOutput::Affected(0)),
        }
    }
}
