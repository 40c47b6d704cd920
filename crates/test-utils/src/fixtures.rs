// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Sample regression files
//!
//! Each file is recorded against PostgreSQL and replays cleanly on
//! [`MockEngine`](crate::MockEngine).

use sql_regress_fixture::{
    RegistryResult, Registry, RegressionFile, RegressionFileStatement as Stmt, Value, rows,
};

/// Creates and fills the `items` table
pub fn test_setup() -> RegressionFile {
    RegressionFile::new("test_setup").statements_from([
        Stmt::new("CREATE TABLE items (id int, name text, price numeric);"),
        Stmt::new("INSERT INTO items VALUES (1, 'apple', 1.50), (2, 'pear', NULL);"),
    ])
}

/// Queries the table created by [`test_setup`]
pub fn items_report() -> RegressionFile {
    RegressionFile::new("items_report")
        .with_dependencies(["test_setup"])
        .statements_from([
            Stmt::new("SELECT id, name FROM items;").with_rows(rows![[1, "apple"], [2, "pear"]]),
            Stmt::new("SELECT count(*) FROM items;").with_rows(rows![[2]]),
            Stmt::new("SELECT price FROM items;")
                .with_rows(rows![[Value::NULL], [Value::numeric("1.50")]])
                .unordered(),
            Stmt::new("SELECT 1/0;").with_error("division by zero"),
        ])
}

/// Session and transaction-local settings
pub fn guc_transactions() -> RegressionFile {
    RegressionFile::new("guc_transactions").statements_from([
        Stmt::new("SET enable_seqscan = off;"),
        Stmt::new("BEGIN;"),
        Stmt::new("SET LOCAL enable_seqscan = on;"),
        Stmt::new("SHOW enable_seqscan;").with_rows(rows![["on"]]),
        Stmt::new("ROLLBACK;"),
        Stmt::new("SHOW enable_seqscan;").with_rows(rows![["off"]]),
        Stmt::new("RESET enable_seqscan;"),
        Stmt::new("SHOW enable_seqscan;").with_rows(rows![["on"]]),
    ])
}

/// Client-side directives: variables, `\gset`, NULL display and reconnects
pub fn client_directives() -> RegressionFile {
    RegressionFile::new("client_directives").statements_from([
        Stmt::new("\\set answer 42"),
        Stmt::new("SELECT :answer + 1 AS next;").with_rows(rows![[43]]),
        Stmt::new("SELECT 'pear' AS fruit \\gset my_"),
        Stmt::new("SELECT :'my_fruit' AS fruit;").with_rows(rows![["pear"]]),
        Stmt::new("\\pset null '(null)'"),
        Stmt::new("SELECT NULL AS nothing;").with_rows(rows![[Value::NULL]]),
        Stmt::new("CREATE TEMP TABLE scratch (a int);"),
        Stmt::new("\\c"),
        Stmt::new("SELECT * FROM scratch;").with_error("relation \"scratch\" does not exist"),
        Stmt::new("SELECT :answer;").with_rows(rows![[42]]),
    ])
}

/// Non-finite floats and NULL
pub fn float_specials() -> RegressionFile {
    RegressionFile::new("float_specials").statements_from([
        Stmt::new("SELECT 'NaN'::float8;").with_rows(rows![[Value::NAN]]),
        Stmt::new("SELECT '-Infinity'::float8, 'Infinity'::float8;")
            .with_rows(rows![[Value::NEG_INFINITY, Value::INFINITY]]),
        Stmt::new("SELECT NULL::float8;").with_rows(rows![[Value::NULL]]),
    ])
}

/// All sample files
pub fn sample_files() -> Vec<RegressionFile> {
    vec![
        test_setup(),
        items_report(),
        guc_transactions(),
        client_directives(),
        float_specials(),
    ]
}

/// Register every sample file
pub fn register_samples(registry: &Registry) -> RegistryResult<()> {
    for file in sample_files() {
        registry.register(file)?;
    }
    Ok(())
}

/// A fresh registry holding the sample files
pub fn sample_registry() -> Registry {
    let registry = Registry::new();
    for file in sample_files() {
        if let Err(err) = registry.register(file) {
            panic!("sample files collide: {}", err);
        }
    }
    registry
}
