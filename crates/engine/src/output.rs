// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Statement output
//!
//! A successful statement either returns a row set or reports how many rows
//! it affected. Values arrive as text, the way a simple-protocol client sees
//! them; interpretation happens in the comparator.

use serde::{Deserialize, Serialize};
use sql_regress_fixture::{Row, Value};

/// Row set returned by a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryOutput {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Build from text cells, `None` being SQL NULL
    pub fn from_text<C, S>(columns: C, rows: Vec<Vec<Option<String>>>) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Value::from).collect())
            .collect();
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Successful result of executing a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineOutput {
    Rows(QueryOutput),
    /// Number of rows affected by a statement that returns no rows
    Affected(u64),
}

impl EngineOutput {
    pub fn rows(&self) -> Option<&QueryOutput> {
        match self {
            EngineOutput::Rows(output) => Some(output),
            EngineOutput::Affected(_) => None,
        }
    }

    /// Number of rows returned or affected
    pub fn row_count(&self) -> u64 {
        match self {
            EngineOutput::Rows(output) => output.rows.len() as u64,
            EngineOutput::Affected(count) => *count,
        }
    }
}

impl From<QueryOutput> for EngineOutput {
    fn from(output: QueryOutput) -> Self {
        EngineOutput::Rows(output)
    }
}
