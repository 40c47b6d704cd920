// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Mock Engine
//!
//! An in-memory, session-aware SQL engine for exercising the harness without
//! a database server.
//!
//! Regular tables are shared by every connection of an engine. Temporary
//! tables and settings live in the session and disappear on reconnect.
//! Transactions snapshot state at `BEGIN` and at every savepoint, so
//! `ROLLBACK` restores tables and settings, and `SET LOCAL` ends with the
//! transaction. After an error inside a transaction block every statement
//! other than `COMMIT`/`ROLLBACK` fails with SQLSTATE 25P02 until the block
//! ends, the way PostgreSQL behaves.
//!
//! Faults can be injected to test the harness itself:
//!
//! ```rust,ignore
//! let engine = MockEngine::new()
//!     .with_dropped_inserts()          // INSERT succeeds but stores nothing
//!     .with_disconnect_on("pg_sleep"); // connection drops on matching SQL
//! engine.refuse_connections(true);     // later connects fail
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::trace;

use sql_regress_engine::{
    EngineError, EngineOutput, EngineResult, EngineSession, QueryOutput, SQLSTATE_IN_FAILED_SQL_TRANSACTION,
    SqlEngine, TransactionStatus,
};

use crate::mock_sql::{
    ColumnDef, DEFAULT_SETTINGS, Datum, Expr, SelectItem, Statement, coerce, eval, parse,
};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Datum>>,
}

#[derive(Debug, Clone, Default)]
struct MockOptions {
    drop_inserts: bool,
    disconnect_on: Option<String>,
    hide_transaction_status: bool,
    max_connections: Option<usize>,
}

#[derive(Debug, Default)]
struct SharedState {
    tables: Mutex<HashMap<String, Table>>,
    refuse_connections: AtomicBool,
    connections: AtomicUsize,
}

/// In-memory engine implementing a small PostgreSQL-flavored SQL subset
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    options: MockOptions,
    shared: Arc<SharedState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept INSERTs without storing their rows
    pub fn with_dropped_inserts(mut self) -> Self {
        self.options.drop_inserts = true;
        self
    }

    /// Lose the connection when a statement contains `fragment`
    pub fn with_disconnect_on(mut self, fragment: impl Into<String>) -> Self {
        self.options.disconnect_on = Some(fragment.into());
        self
    }

    /// Refuse connections once `limit` have been opened
    pub fn with_connection_limit(mut self, limit: usize) -> Self {
        self.options.max_connections = Some(limit);
        self
    }

    /// Report [`TransactionStatus::Unknown`], like a driver without status tracking
    pub fn without_transaction_status(mut self) -> Self {
        self.options.hide_transaction_status = true;
        self
    }

    /// Make subsequent connection attempts fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Number of connections opened so far
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Names of the regular tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let tables = self.shared.tables.lock().unwrap();
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of stored rows of a regular table
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.shared.tables.lock().unwrap().get(table).map(|t| t.rows.len())
    }
}

#[async_trait]
impl SqlEngine for MockEngine {
    async fn connect(&self) -> EngineResult<Box<dyn EngineSession>> {
        let limit_reached = self
            .options
            .max_connections
            .is_some_and(|limit| self.connection_count() >= limit);
        if limit_reached || self.shared.refuse_connections.load(Ordering::SeqCst) {
            return Err(EngineError::connection_lost("connection refused"));
        }
        let id = self.shared.connections.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(connection = id, "mock engine connected");

        Ok(Box::new(MockSession {
            shared: self.shared.clone(),
            options: self.options.clone(),
            temp_tables: HashMap::new(),
            settings: HashMap::new(),
            txn: None,
            lost: false,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    tables: HashMap<String, Table>,
    temp_tables: HashMap<String, Table>,
    settings: HashMap<String, String>,
    local_settings: HashMap<String, String>,
}

#[derive(Debug)]
struct Transaction {
    failed: bool,
    begin: Snapshot,
    local_settings: HashMap<String, String>,
    savepoints: Vec<(String, Snapshot)>,
}

/// One connection to a [`MockEngine`]
pub struct MockSession {
    shared: Arc<SharedState>,
    options: MockOptions,
    temp_tables: HashMap<String, Table>,
    settings: HashMap<String, String>,
    txn: Option<Transaction>,
    lost: bool,
}

fn ok() -> EngineResult<EngineOutput> {
    Ok(EngineOutput::Affected(0))
}

fn rows(columns: Vec<String>, rows: Vec<Vec<Datum>>) -> EngineOutput {
    let rows = rows
        .into_iter()
        .map(|row| row.iter().map(Datum::render).collect())
        .collect();
    EngineOutput::Rows(QueryOutput::from_text(columns, rows))
}

fn relation_missing(name: &str) -> EngineError {
    EngineError::statement(format!("relation \"{}\" does not exist", name))
}

fn unrecognized_setting(name: &str) -> EngineError {
    EngineError::statement(format!("unrecognized configuration parameter \"{}\"", name))
}

fn default_setting(name: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

impl MockSession {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            tables: self.shared.tables.lock().unwrap().clone(),
            temp_tables: self.temp_tables.clone(),
            settings: self.settings.clone(),
            local_settings: self
                .txn
                .as_ref()
                .map(|t| t.local_settings.clone())
                .unwrap_or_default(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        *self.shared.tables.lock().unwrap() = snapshot.tables;
        self.temp_tables = snapshot.temp_tables;
        self.settings = snapshot.settings;
        if let Some(txn) = self.txn.as_mut() {
            txn.local_settings = snapshot.local_settings;
        }
    }

    fn apply(&mut self, statement: Statement) -> EngineResult<EngineOutput> {
        match statement {
            Statement::Empty | Statement::SetTransaction => ok(),
            Statement::CreateTable {
                name,
                temporary,
                columns,
            } => self.create_table(name, temporary, columns),
            Statement::DropTable { names, if_exists } => self.drop_tables(&names, if_exists),
            Statement::Insert {
                table,
                columns,
                rows,
            } => self.insert(&table, columns, &rows),
            Statement::Select { items, from } => self.select(&items, from.as_deref()),
            Statement::Begin => {
                if self.txn.is_none() {
                    let begin = self.snapshot();
                    self.txn = Some(Transaction {
                        failed: false,
                        begin,
                        local_settings: HashMap::new(),
                        savepoints: Vec::new(),
                    });
                }
                ok()
            }
            Statement::Commit => {
                // COMMIT of a failed block rolls back
                if let Some(txn) = self.txn.take()
                    && txn.failed
                {
                    self.restore(txn.begin);
                }
                ok()
            }
            Statement::Rollback => {
                if let Some(txn) = self.txn.take() {
                    self.restore(txn.begin);
                }
                ok()
            }
            Statement::Savepoint(name) => {
                let snapshot = self.snapshot();
                let Some(txn) = self.txn.as_mut() else {
                    return Err(EngineError::statement(
                        "SAVEPOINT can only be used in transaction blocks",
                    ));
                };
                txn.savepoints.push((name, snapshot));
                ok()
            }
            Statement::RollbackTo(name) => {
                let Some(txn) = self.txn.as_mut() else {
                    return Err(EngineError::statement(
                        "ROLLBACK TO SAVEPOINT can only be used in transaction blocks",
                    ));
                };
                let Some(pos) = txn.savepoints.iter().rposition(|(n, _)| *n == name) else {
                    return Err(EngineError::statement(format!(
                        "savepoint \"{}\" does not exist",
                        name
                    )));
                };
                let snapshot = txn.savepoints[pos].1.clone();
                txn.savepoints.truncate(pos + 1);
                txn.failed = false;
                self.restore(snapshot);
                ok()
            }
            Statement::Release(name) => {
                let Some(txn) = self.txn.as_mut() else {
                    return Err(EngineError::statement(
                        "RELEASE SAVEPOINT can only be used in transaction blocks",
                    ));
                };
                let Some(pos) = txn.savepoints.iter().rposition(|(n, _)| *n == name) else {
                    return Err(EngineError::statement(format!(
                        "savepoint \"{}\" does not exist",
                        name
                    )));
                };
                txn.savepoints.truncate(pos);
                ok()
            }
            Statement::Set { name, value, local } => self.set(name, value, local),
            Statement::Reset(Some(name)) => self.set(name, None, false),
            Statement::Reset(None) => {
                self.settings.clear();
                if let Some(txn) = self.txn.as_mut() {
                    txn.local_settings.clear();
                }
                ok()
            }
            Statement::Show(name) => {
                let value = self.setting(&name)?;
                Ok(rows(vec![name], vec![vec![Datum::Text(value)]]))
            }
        }
    }

    fn table_exists(&self, name: &str) -> bool {
        self.temp_tables.contains_key(name) || self.shared.tables.lock().unwrap().contains_key(name)
    }

    fn create_table(
        &mut self,
        name: String,
        temporary: bool,
        columns: Vec<ColumnDef>,
    ) -> EngineResult<EngineOutput> {
        if self.table_exists(&name) {
            return Err(EngineError::statement(format!(
                "relation \"{}\" already exists",
                name
            )));
        }
        let table = Table {
            columns,
            rows: Vec::new(),
        };
        if temporary {
            self.temp_tables.insert(name, table);
        } else {
            self.shared.tables.lock().unwrap().insert(name, table);
        }
        ok()
    }

    fn drop_tables(&mut self, names: &[String], if_exists: bool) -> EngineResult<EngineOutput> {
        if !if_exists
            && let Some(missing) = names.iter().find(|n| !self.table_exists(n))
        {
            return Err(EngineError::statement(format!(
                "table \"{}\" does not exist",
                missing
            )));
        }
        for name in names {
            if self.temp_tables.remove(name).is_none() {
                self.shared.tables.lock().unwrap().remove(name);
            }
        }
        ok()
    }

    /// Run `f` on a table, temporary tables shadowing regular ones
    fn with_table<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Table) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if let Some(table) = self.temp_tables.get_mut(name) {
            return f(table);
        }
        let mut tables = self.shared.tables.lock().unwrap();
        match tables.get_mut(name) {
            Some(table) => f(table),
            None => Err(relation_missing(name)),
        }
    }

    fn insert(
        &mut self,
        table_name: &str,
        columns: Option<Vec<String>>,
        values: &[Vec<Expr>],
    ) -> EngineResult<EngineOutput> {
        let drop_inserts = self.options.drop_inserts;
        self.with_table(table_name, |table| {
            let targets: Vec<usize> = match &columns {
                None => (0..table.columns.len()).collect(),
                Some(names) => names
                    .iter()
                    .map(|name| {
                        table.columns.iter().position(|c| &c.name == name).ok_or_else(|| {
                            EngineError::statement(format!(
                                "column \"{}\" of relation \"{}\" does not exist",
                                name, table_name
                            ))
                        })
                    })
                    .collect::<EngineResult<_>>()?,
            };

            let mut new_rows = Vec::with_capacity(values.len());
            for exprs in values {
                if exprs.len() > targets.len() {
                    return Err(EngineError::statement(
                        "INSERT has more expressions than target columns",
                    ));
                }
                let mut row = vec![Datum::Null; table.columns.len()];
                for (expr, &target) in exprs.iter().zip(&targets) {
                    row[target] = coerce(eval(expr, None)?, table.columns[target].ty)?;
                }
                new_rows.push(row);
            }

            let count = new_rows.len() as u64;
            if !drop_inserts {
                table.rows.extend(new_rows);
            }
            Ok(EngineOutput::Affected(count))
        })
    }

    fn select(&mut self, items: &[SelectItem], from: Option<&str>) -> EngineResult<EngineOutput> {
        let Some(from) = from else {
            let mut columns = Vec::with_capacity(items.len());
            let mut row = Vec::with_capacity(items.len());
            for item in items {
                let SelectItem::Expr { expr, .. } = item else {
                    return Err(EngineError::statement(
                        "SELECT * with no tables specified is not valid",
                    ));
                };
                columns.push(item.name());
                row.push(eval(expr, None)?);
            }
            return Ok(rows(columns, vec![row]));
        };

        let table = self.with_table(from, |table| Ok(table.clone()))?;

        let is_aggregate = items
            .iter()
            .any(|item| matches!(item, SelectItem::Expr { expr: Expr::CountStar, .. }));
        if is_aggregate {
            let mut columns = Vec::with_capacity(items.len());
            let mut row = Vec::with_capacity(items.len());
            for item in items {
                columns.push(item.name());
                row.push(match item {
                    SelectItem::Expr { expr: Expr::CountStar, .. } => {
                        Datum::Int(table.rows.len() as i64)
                    }
                    SelectItem::Expr { expr, .. } => eval(expr, None)?,
                    SelectItem::Wildcard => {
                        return Err(EngineError::statement(
                            "column reference in aggregate query must appear in the GROUP BY clause",
                        ));
                    }
                });
            }
            return Ok(rows(columns, vec![row]));
        }

        let mut columns = Vec::new();
        for item in items {
            match item {
                SelectItem::Wildcard => columns.extend(table.columns.iter().map(|c| c.name.clone())),
                SelectItem::Expr { .. } => columns.push(item.name()),
            }
        }

        let mut output = Vec::with_capacity(table.rows.len());
        for values in &table.rows {
            let context = Some((table.columns.as_slice(), values.as_slice()));
            let mut row = Vec::with_capacity(columns.len());
            for item in items {
                match item {
                    SelectItem::Wildcard => row.extend(values.iter().cloned()),
                    SelectItem::Expr { expr, .. } => row.push(eval(expr, context)?),
                }
            }
            output.push(row);
        }
        Ok(rows(columns, output))
    }

    fn check_setting(name: &str) -> EngineResult<()> {
        if default_setting(name).is_some() || name.contains('.') {
            Ok(())
        } else {
            Err(unrecognized_setting(name))
        }
    }

    fn set(&mut self, name: String, value: Option<String>, local: bool) -> EngineResult<EngineOutput> {
        Self::check_setting(&name)?;

        if local {
            let value = value.unwrap_or_else(|| self.settings_value(&name));
            // SET LOCAL outside a transaction block has no effect
            if let Some(txn) = self.txn.as_mut() {
                txn.local_settings.insert(name, value);
            }
            return ok();
        }

        if let Some(txn) = self.txn.as_mut() {
            txn.local_settings.remove(&name);
        }
        match value {
            Some(value) => self.settings.insert(name, value),
            None => self.settings.remove(&name),
        };
        ok()
    }

    /// Session value ignoring transaction-local overrides
    fn settings_value(&self, name: &str) -> String {
        self.settings
            .get(name)
            .cloned()
            .or_else(|| default_setting(name).map(str::to_string))
            .unwrap_or_default()
    }

    fn setting(&self, name: &str) -> EngineResult<String> {
        if let Some(value) = self.txn.as_ref().and_then(|t| t.local_settings.get(name)) {
            return Ok(value.clone());
        }
        if let Some(value) = self.settings.get(name) {
            return Ok(value.clone());
        }
        default_setting(name)
            .map(str::to_string)
            .ok_or_else(|| unrecognized_setting(name))
    }
}

#[async_trait]
impl EngineSession for MockSession {
    async fn execute(&mut self, sql: &str) -> Result<EngineOutput, EngineError> {
        if self.lost {
            return Err(EngineError::connection_lost("connection already closed"));
        }
        if let Some(fragment) = &self.options.disconnect_on
            && sql.contains(fragment.as_str())
        {
            self.lost = true;
            return Err(EngineError::connection_lost(
                "server closed the connection unexpectedly",
            ));
        }

        let result = parse(sql).and_then(|statement| {
            if self.txn.as_ref().is_some_and(|t| t.failed) && !statement.ends_transaction() {
                return Err(EngineError::transaction_aborted(
                    "current transaction is aborted, commands ignored until end of transaction block",
                )
                .with_code(SQLSTATE_IN_FAILED_SQL_TRANSACTION));
            }
            self.apply(statement)
        });

        if let Err(err) = &result {
            trace!(sql, error = %err, "mock statement failed");
            if let Some(txn) = self.txn.as_mut() {
                txn.failed = true;
            }
        }
        result
    }

    fn transaction_status(&self) -> TransactionStatus {
        if self.options.hide_transaction_status || self.lost {
            return TransactionStatus::Unknown;
        }
        match &self.txn {
            None => TransactionStatus::Idle,
            Some(txn) if txn.failed => TransactionStatus::Failed,
            Some(_) => TransactionStatus::InTransaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql_regress_fixture::{Row, Value, rows};

    async fn run(session: &mut Box<dyn EngineSession>, sql: &str) -> Result<EngineOutput, EngineError> {
        session.execute(sql).await
    }

    async fn query(session: &mut Box<dyn EngineSession>, sql: &str) -> Vec<Row> {
        match run(session, sql).await {
            Ok(EngineOutput::Rows(output)) => output.rows,
            other => panic!("expected rows from {sql}, got {other:?}"),
        }
    }

    fn text_rows(values: &[&[Option<&str>]]) -> Vec<Row> {
        values
            .iter()
            .map(|row| row.iter().map(|v| Value::from(v.map(str::to_string))).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_create_insert_select() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();

        run(&mut s, "CREATE TABLE t (a int, b text);").await.unwrap();
        let inserted = run(&mut s, "INSERT INTO t VALUES (1, 'one'), (2, NULL);").await.unwrap();
        assert_eq!(inserted, EngineOutput::Affected(2));

        assert_eq!(
            query(&mut s, "SELECT * FROM t;").await,
            text_rows(&[&[Some("1"), Some("one")], &[Some("2"), None]])
        );
        assert_eq!(query(&mut s, "SELECT count(*) FROM t;").await, text_rows(&[&[Some("2")]]));
        assert_eq!(engine.row_count("t"), Some(2));
    }

    #[tokio::test]
    async fn test_insert_type_errors() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();
        run(&mut s, "CREATE TABLE t (a int);").await.unwrap();

        let err = run(&mut s, "INSERT INTO t VALUES ('x');").await.unwrap_err();
        assert_eq!(err.message, "invalid input syntax for type integer: \"x\"");

        let err = run(&mut s, "INSERT INTO missing VALUES (1);").await.unwrap_err();
        assert_eq!(err.message, "relation \"missing\" does not exist");
    }

    #[tokio::test]
    async fn test_rollback_restores_tables() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();
        run(&mut s, "CREATE TABLE t (a int);").await.unwrap();

        run(&mut s, "BEGIN;").await.unwrap();
        run(&mut s, "INSERT INTO t VALUES (1);").await.unwrap();
        assert_eq!(s.transaction_status(), TransactionStatus::InTransaction);
        run(&mut s, "ROLLBACK;").await.unwrap();

        assert_eq!(s.transaction_status(), TransactionStatus::Idle);
        assert_eq!(engine.row_count("t"), Some(0));
    }

    #[tokio::test]
    async fn test_aborted_transaction() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();

        run(&mut s, "BEGIN;").await.unwrap();
        run(&mut s, "SELECT 1/0;").await.unwrap_err();
        assert_eq!(s.transaction_status(), TransactionStatus::Failed);

        let err = run(&mut s, "SELECT 1;").await.unwrap_err();
        assert!(err.is_transaction_aborted());
        assert_eq!(err.code.as_deref(), Some("25P02"));

        run(&mut s, "ROLLBACK;").await.unwrap();
        assert_eq!(query(&mut s, "SELECT 1;").await, rows![["1"]]);
    }

    #[tokio::test]
    async fn test_savepoint_clears_failure() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();
        run(&mut s, "CREATE TABLE t (a int);").await.unwrap();

        run(&mut s, "BEGIN;").await.unwrap();
        run(&mut s, "INSERT INTO t VALUES (1);").await.unwrap();
        run(&mut s, "SAVEPOINT sp;").await.unwrap();
        run(&mut s, "INSERT INTO t VALUES (2);").await.unwrap();
        run(&mut s, "INSERT INTO t VALUES ('bad');").await.unwrap_err();
        run(&mut s, "ROLLBACK TO SAVEPOINT sp;").await.unwrap();
        run(&mut s, "COMMIT;").await.unwrap();

        assert_eq!(query(&mut s, "SELECT a FROM t;").await, rows![["1"]]);
    }

    #[tokio::test]
    async fn test_set_local_ends_with_transaction() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();

        run(&mut s, "SET enable_seqscan = off;").await.unwrap();
        run(&mut s, "BEGIN;").await.unwrap();
        run(&mut s, "SET LOCAL enable_seqscan = on;").await.unwrap();
        assert_eq!(query(&mut s, "SHOW enable_seqscan;").await, rows![["on"]]);
        run(&mut s, "COMMIT;").await.unwrap();

        assert_eq!(query(&mut s, "SHOW enable_seqscan;").await, rows![["off"]]);
    }

    #[tokio::test]
    async fn test_rollback_restores_session_setting() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();

        run(&mut s, "BEGIN;").await.unwrap();
        run(&mut s, "SET work_mem = '64MB';").await.unwrap();
        run(&mut s, "ROLLBACK;").await.unwrap();

        assert_eq!(query(&mut s, "SHOW work_mem;").await, rows![["4MB"]]);
    }

    #[tokio::test]
    async fn test_unknown_setting() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();

        let err = run(&mut s, "SET x = 1;").await.unwrap_err();
        assert_eq!(err.message, "unrecognized configuration parameter \"x\"");

        run(&mut s, "SET my.flag = 'yes';").await.unwrap();
        assert_eq!(query(&mut s, "SHOW my.flag;").await, rows![["yes"]]);
    }

    #[tokio::test]
    async fn test_session_state_is_per_connection() {
        let engine = MockEngine::new();
        let mut first = engine.connect().await.unwrap();
        run(&mut first, "CREATE TABLE shared (a int);").await.unwrap();
        run(&mut first, "CREATE TEMP TABLE scratch (a int);").await.unwrap();
        run(&mut first, "SET enable_sort = off;").await.unwrap();

        let mut second = engine.connect().await.unwrap();
        assert_eq!(query(&mut second, "SELECT count(*) FROM shared;").await, rows![["0"]]);
        let err = run(&mut second, "SELECT * FROM scratch;").await.unwrap_err();
        assert_eq!(err.message, "relation \"scratch\" does not exist");
        assert_eq!(query(&mut second, "SHOW enable_sort;").await, rows![["on"]]);
        assert_eq!(engine.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_dropped_inserts() {
        let engine = MockEngine::new().with_dropped_inserts();
        let mut s = engine.connect().await.unwrap();
        run(&mut s, "CREATE TABLE t (a int);").await.unwrap();

        assert_eq!(
            run(&mut s, "INSERT INTO t VALUES (1);").await.unwrap(),
            EngineOutput::Affected(1)
        );
        assert!(query(&mut s, "SELECT * FROM t;").await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_disconnect() {
        let engine = MockEngine::new().with_disconnect_on("boom");
        let mut s = engine.connect().await.unwrap();

        let err = run(&mut s, "SELECT 'boom';").await.unwrap_err();
        assert!(err.is_connection_lost());
        assert!(run(&mut s, "SELECT 1;").await.unwrap_err().is_connection_lost());

        engine.refuse_connections(true);
        assert!(engine.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let engine = MockEngine::new().with_connection_limit(1);
        let _first = engine.connect().await.unwrap();
        let err = engine.connect().await.err().unwrap();
        assert!(err.is_connection_lost());
        assert_eq!(engine.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_special_floats() {
        let engine = MockEngine::new();
        let mut s = engine.connect().await.unwrap();

        let rows = query(&mut s, "SELECT 'NaN'::float8, NULL::float8;").await;
        assert_eq!(rows, text_rows(&[&[Some("NaN"), None]]));
        assert!(Value::NAN.matches(&rows[0][0]));
        assert!(!Value::NAN.matches(&rows[0][1]));
    }
}
