// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Regression file model
//!
//! A [`RegressionFile`] is a named, ordered transcript of statements, each
//! paired with what the engine is expected to answer. Files are built once with
//! the consuming `with_*`/`statement` builders and are read-only afterwards.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::value::Row;

/// Name of a regression file
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileName(String);

impl FileName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A letter or underscore followed by letters, digits, underscores or
    /// hyphens (`float4-misrounded-input`)
    pub fn is_valid(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FileName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for FileName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What a statement is expected to produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expectation {
    /// The statement returns exactly these rows
    Rows(Vec<Row>),
    /// The statement fails with a message containing this fragment
    Error(String),
    /// The statement only has to succeed
    None,
}

/// Whether row order is significant when comparing a row set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowOrder {
    #[default]
    Exact,
    /// Rows are compared as a multiset
    Unordered,
}

/// A statement of a regression file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionFileStatement {
    sql: String,
    expectation: Expectation,
    row_order: RowOrder,
    skip: bool,
}

impl RegressionFileStatement {
    /// A statement run for its side effect only
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            expectation: Expectation::None,
            row_order: RowOrder::Exact,
            skip: false,
        }
    }

    /// Expect the statement to return these rows
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.expectation = Expectation::Rows(rows);
        self
    }

    /// Expect the statement to fail with a message containing `fragment`
    pub fn with_error(mut self, fragment: impl Into<String>) -> Self {
        self.expectation = Expectation::Error(fragment.into());
        self
    }

    /// Compare the rows of this statement without regard to order
    pub fn unordered(mut self) -> Self {
        self.row_order = RowOrder::Unordered;
        self
    }

    /// Do not execute this statement
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }
}

/// A named transcript of statements with its dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionFile {
    name: FileName,
    depends_on: Vec<FileName>,
    statements: Vec<RegressionFileStatement>,
}

impl RegressionFile {
    pub fn new(name: impl Into<FileName>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Declare dependencies, keeping declaration order and dropping repeats
    pub fn with_dependencies<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<FileName>,
    {
        for name in names {
            let name = name.into();
            if !self.depends_on.contains(&name) {
                self.depends_on.push(name);
            }
        }
        self
    }

    /// Append a statement
    pub fn statement(mut self, statement: RegressionFileStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Append several statements in order
    pub fn statements_from<I>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = RegressionFileStatement>,
    {
        self.statements.extend(statements);
        self
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    pub fn depends_on(&self) -> &[FileName] {
        &self.depends_on
    }

    pub fn statements(&self) -> &[RegressionFileStatement] {
        &self.statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows;

    #[test]
    fn test_file_name_validation() {
        assert!(FileName::new("int8").is_valid());
        assert!(FileName::new("_setup").is_valid());
        assert!(FileName::new("test_setup2").is_valid());
        assert!(!FileName::new("").is_valid());
        assert!(!FileName::new("8int").is_valid());
        assert!(FileName::new("create-table").is_valid());
        assert!(FileName::new("float4-misrounded-input").is_valid());
        assert!(!FileName::new("-leading").is_valid());
        assert!(!FileName::new("bad name").is_valid());
    }

    #[test]
    fn test_dependencies_are_an_ordered_set() {
        let file = RegressionFile::new("x")
            .with_dependencies(["b", "a"])
            .with_dependencies(["b", "c"]);
        let names: Vec<&str> = file.depends_on().iter().map(FileName::as_str).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_statement_builder() {
        let stmt = RegressionFileStatement::new("SELECT 1;")
            .with_rows(rows![[1]])
            .unordered();
        assert_eq!(stmt.sql(), "SELECT 1;");
        assert_eq!(stmt.row_order(), RowOrder::Unordered);
        assert!(matches!(stmt.expectation(), Expectation::Rows(r) if r.len() == 1));
        assert!(!stmt.is_skipped());

        let stmt = RegressionFileStatement::new("SELECT 1/0;").with_error("division by zero");
        assert_eq!(
            stmt.expectation(),
            &Expectation::Error("division by zero".to_string())
        );
        assert_eq!(
            RegressionFileStatement::new("BEGIN;").expectation(),
            &Expectation::None
        );
    }

    #[test]
    fn test_statements_keep_order() {
        let file = RegressionFile::new("x")
            .statement(RegressionFileStatement::new("a"))
            .statements_from(vec![
                RegressionFileStatement::new("b"),
                RegressionFileStatement::new("c"),
            ]);
        let sql: Vec<&str> = file.statements().iter().map(|s| s.sql()).collect();
        assert_eq!(sql, vec!["a", "b", "c"]);
    }
}
