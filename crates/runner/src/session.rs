// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Client session
//!
//! A [`Session`] is the client side of a run: the current engine connection
//! plus the state psql keeps on the client (variables, NULL display, output
//! redirection). Client state survives reconnects; server state does not.

use std::sync::Arc;

use sql_regress_engine::{
    EngineError, EngineOutput, EngineResult, EngineSession, SqlEngine, TransactionStatus,
};

use crate::directive::{Directive, Variables};

pub struct Session {
    engine: Arc<dyn SqlEngine>,
    conn: Option<Box<dyn EngineSession>>,
    variables: Variables,
    null_display: String,
    output_suppressed: bool,
}

impl Session {
    /// Open a connection
    pub async fn open(engine: Arc<dyn SqlEngine>, null_display: impl Into<String>) -> EngineResult<Self> {
        let conn = engine.connect().await?;
        Ok(Self {
            engine,
            conn: Some(conn),
            variables: Variables::new(),
            null_display: null_display.into(),
            output_suppressed: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Execute SQL on the current connection
    pub async fn execute(&mut self, sql: &str) -> Result<EngineOutput, EngineError> {
        match self.conn.as_mut() {
            Some(conn) => conn.execute(sql).await,
            None => Err(EngineError::connection_lost("no connection to the engine")),
        }
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.conn
            .as_ref()
            .map_or(TransactionStatus::Unknown, |conn| conn.transaction_status())
    }

    /// Replace the connection with a fresh one
    ///
    /// The old connection is closed first. On failure the session is left
    /// without a connection.
    pub async fn reconnect(&mut self) -> EngineResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await;
        }
        tracing::debug!(engine = %self.engine.name(), "reconnecting");
        self.conn = Some(self.engine.connect().await?);
        Ok(())
    }

    /// Drop the connection without closing it, after an interrupted statement
    pub fn abandon(&mut self) {
        self.conn = None;
    }

    pub async fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close().await;
        }
    }

    /// Apply a directive that only touches client state
    ///
    /// Returns `false` for directives that need the engine (`\c`).
    pub fn apply_local(&mut self, directive: &Directive) -> bool {
        match directive {
            Directive::Set { name, value } => self.variables.set(name.as_str(), value.as_str()),
            Directive::Unset { name } => self.variables.unset(name),
            Directive::PsetNull(display) => self.null_display = display.clone(),
            Directive::Output { target } => self.output_suppressed = target.is_some(),
            Directive::Pset { .. } | Directive::Echo(_) => {}
            Directive::Connect { .. } => return false,
        }
        true
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn null_display(&self) -> &str {
        &self.null_display
    }

    pub fn is_output_suppressed(&self) -> bool {
        self.output_suppressed
    }
}
