// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Result comparison
//!
//! Checks what the engine returned against what a statement recorded.
//!
//! - Rows are compared in order unless the statement is marked unordered.
//! - Values are compared with [`Value::matches`]: by canonical text, NULL only
//!   equal to NULL, `NaN`/`Infinity` only equal to themselves.
//! - An expected error matches any error whose message contains the recorded
//!   fragment (case-sensitive).
//! - A side-effect statement matches any successful result.
//!
//! A mismatch carries the statement, the first point of divergence and both
//! sides rendered as text.

use serde::Serialize;
use std::fmt;

use sql_regress_engine::{EngineError, EngineOutput, QueryOutput};
use sql_regress_fixture::{Expectation, Row, RowOrder, Value};

/// Why a statement did not match
///
/// Row and column indexes are zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MismatchKind {
    /// The statement failed but no error was recorded
    UnexpectedError { message: String },
    /// An error was recorded but the statement succeeded
    MissingError { fragment: String },
    /// The error message does not contain the recorded fragment
    ErrorText { fragment: String, message: String },
    RowCount { expected: usize, actual: usize },
    RowWidth { row: usize, expected: usize, actual: usize },
    Value {
        row: usize,
        column: usize,
        expected: String,
        actual: String,
    },
    /// Unordered row sets differ
    UnorderedRows { missing: usize, unexpected: usize },
    /// The directive could not be parsed
    InvalidDirective { message: String },
    /// `\gset` could not store the result
    Capture { message: String },
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKind::UnexpectedError { message } => {
                write!(f, "unexpected error: {}", message)
            }
            MismatchKind::MissingError { fragment } => write!(
                f,
                "expected an error containing \"{}\" but the statement succeeded",
                fragment
            ),
            MismatchKind::ErrorText { fragment, message } => write!(
                f,
                "error \"{}\" does not contain \"{}\"",
                message, fragment
            ),
            MismatchKind::RowCount { expected, actual } => {
                write!(f, "expected {} rows, got {}", expected, actual)
            }
            MismatchKind::RowWidth {
                row,
                expected,
                actual,
            } => write!(
                f,
                "row {}: expected {} columns, got {}",
                row + 1,
                expected,
                actual
            ),
            MismatchKind::Value {
                row,
                column,
                expected,
                actual,
            } => write!(
                f,
                "row {}, column {}: expected {}, got {}",
                row + 1,
                column + 1,
                expected,
                actual
            ),
            MismatchKind::UnorderedRows {
                missing,
                unexpected,
            } => write!(
                f,
                "row sets differ: {} expected rows missing, {} unexpected rows",
                missing, unexpected
            ),
            MismatchKind::InvalidDirective { message } => {
                write!(f, "invalid directive: {}", message)
            }
            MismatchKind::Capture { message } => write!(f, "\\gset failed: {}", message),
        }
    }
}

/// A failed comparison with enough context to reproduce it by hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Statement text as sent to the engine
    pub sql: String,
    pub kind: MismatchKind,
    /// Rendered expectation
    pub expected: String,
    /// Rendered engine result
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        writeln!(f, "  statement: {}", self.sql.trim())?;
        writeln!(f, "  expected:")?;
        for line in self.expected.lines() {
            writeln!(f, "    {}", line)?;
        }
        writeln!(f, "  actual:")?;
        for line in self.actual.lines() {
            writeln!(f, "    {}", line)?;
        }
        Ok(())
    }
}

/// Result of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Match,
    Mismatch(Mismatch),
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        matches!(self, Comparison::Match)
    }
}

/// Compares engine results against recorded expectations
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    null_display: String,
    suppress_rows: bool,
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// NULL rendering used in mismatch reports
    pub fn with_null_display(mut self, display: impl Into<String>) -> Self {
        self.null_display = display.into();
        self
    }

    /// Skip row comparison while output is redirected; errors still count
    pub fn with_rows_suppressed(mut self, suppressed: bool) -> Self {
        self.suppress_rows = suppressed;
        self
    }

    /// Compare one statement's result with its expectation
    pub fn compare(
        &self,
        sql: &str,
        expected: &Expectation,
        order: RowOrder,
        actual: &Result<EngineOutput, EngineError>,
    ) -> Comparison {
        let kind = match (expected, actual) {
            (Expectation::None, Ok(_)) => return Comparison::Match,
            (Expectation::Error(fragment), Err(err)) => {
                if err.message.contains(fragment.as_str()) {
                    return Comparison::Match;
                }
                MismatchKind::ErrorText {
                    fragment: fragment.clone(),
                    message: err.message.clone(),
                }
            }
            (Expectation::Error(fragment), Ok(_)) => MismatchKind::MissingError {
                fragment: fragment.clone(),
            },
            (Expectation::None | Expectation::Rows(_), Err(err)) => {
                MismatchKind::UnexpectedError {
                    message: err.message.clone(),
                }
            }
            (Expectation::Rows(_), Ok(_)) if self.suppress_rows => return Comparison::Match,
            (Expectation::Rows(rows), Ok(EngineOutput::Affected(_))) => {
                if rows.is_empty() {
                    return Comparison::Match;
                }
                MismatchKind::RowCount {
                    expected: rows.len(),
                    actual: 0,
                }
            }
            (Expectation::Rows(rows), Ok(EngineOutput::Rows(output))) => {
                let divergence = match order {
                    RowOrder::Exact => compare_exact(rows, &output.rows, &self.null_display),
                    RowOrder::Unordered => compare_unordered(rows, &output.rows),
                };
                match divergence {
                    None => return Comparison::Match,
                    Some(kind) => kind,
                }
            }
        };

        Comparison::Mismatch(self.mismatch(sql, kind, expected, actual))
    }

    /// Build a mismatch for a statement that failed outside comparison
    pub fn mismatch(
        &self,
        sql: &str,
        kind: MismatchKind,
        expected: &Expectation,
        actual: &Result<EngineOutput, EngineError>,
    ) -> Mismatch {
        Mismatch {
            sql: sql.to_string(),
            kind,
            expected: self.render_expectation(expected),
            actual: self.render_result(actual),
        }
    }

    pub fn render_expectation(&self, expected: &Expectation) -> String {
        match expected {
            Expectation::Rows(rows) => self.render_rows(rows),
            Expectation::Error(fragment) => format!("ERROR:  ...{}...", fragment),
            Expectation::None => "(success)".to_string(),
        }
    }

    pub fn render_result(&self, actual: &Result<EngineOutput, EngineError>) -> String {
        match actual {
            Ok(EngineOutput::Rows(QueryOutput { columns, rows })) => {
                let mut text = String::new();
                if !columns.is_empty() {
                    text.push_str(&columns.join(" | "));
                    text.push('\n');
                }
                text.push_str(&self.render_rows(rows));
                text
            }
            Ok(EngineOutput::Affected(count)) => format!("({} rows affected)", count),
            Err(err) => format!("ERROR:  {}", err.message),
        }
    }

    fn render_rows(&self, rows: &[Row]) -> String {
        let mut text = String::new();
        for row in rows {
            let cells: Vec<String> = row.iter().map(|v| v.render(&self.null_display)).collect();
            text.push_str(&cells.join(" | "));
            text.push('\n');
        }
        match rows.len() {
            1 => text.push_str("(1 row)"),
            n => text.push_str(&format!("({} rows)", n)),
        }
        text
    }
}

fn row_matches(expected: &[Value], actual: &[Value]) -> bool {
    expected.len() == actual.len() && expected.iter().zip(actual).all(|(e, a)| e.matches(a))
}

/// First divergence of two row sequences, if any
fn compare_exact(expected: &[Row], actual: &[Row], null_display: &str) -> Option<MismatchKind> {
    for (row, (exp, act)) in expected.iter().zip(actual).enumerate() {
        if exp.len() != act.len() {
            return Some(MismatchKind::RowWidth {
                row,
                expected: exp.len(),
                actual: act.len(),
            });
        }
        if let Some(column) = exp.iter().zip(act).position(|(e, a)| !e.matches(a)) {
            return Some(MismatchKind::Value {
                row,
                column,
                expected: exp[column].render(null_display),
                actual: act[column].render(null_display),
            });
        }
    }

    (expected.len() != actual.len()).then(|| MismatchKind::RowCount {
        expected: expected.len(),
        actual: actual.len(),
    })
}

/// Multiset comparison of two row sequences
fn compare_unordered(expected: &[Row], actual: &[Row]) -> Option<MismatchKind> {
    let mut used = vec![false; actual.len()];
    let mut missing = 0;

    for exp in expected {
        let found = actual
            .iter()
            .enumerate()
            .position(|(i, act)| !used[i] && row_matches(exp, act));
        match found {
            Some(i) => used[i] = true,
            None => missing += 1,
        }
    }

    let unexpected = used.iter().filter(|u| !**u).count();
    (missing > 0 || unexpected > 0).then_some(MismatchKind::UnorderedRows {
        missing,
        unexpected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql_regress_fixture::rows;

    fn text_rows(rows: &[&[Option<&str>]]) -> Result<EngineOutput, EngineError> {
        Ok(EngineOutput::Rows(QueryOutput::from_text(
            Vec::<String>::new(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.map(str::to_string)).collect())
                .collect(),
        )))
    }

    fn compare(expected: Expectation, actual: Result<EngineOutput, EngineError>) -> Comparison {
        Comparator::new().compare("SQL", &expected, RowOrder::Exact, &actual)
    }

    fn kind(comparison: Comparison) -> MismatchKind {
        match comparison {
            Comparison::Mismatch(m) => m.kind,
            Comparison::Match => panic!("expected a mismatch"),
        }
    }

    #[test]
    fn test_error_substring() {
        let expected = Expectation::Error("division by zero".to_string());
        assert!(
            compare(
                expected.clone(),
                Err(EngineError::statement("ERROR: division by zero at line 4"))
            )
            .is_match()
        );
        assert!(matches!(
            kind(compare(expected.clone(), Err(EngineError::statement("ERROR: syntax error")))),
            MismatchKind::ErrorText { .. }
        ));
        assert!(matches!(
            kind(compare(expected, Ok(EngineOutput::Affected(0)))),
            MismatchKind::MissingError { .. }
        ));
    }

    #[test]
    fn test_error_substring_is_case_sensitive() {
        let expected = Expectation::Error("Division".to_string());
        assert!(!compare(expected, Err(EngineError::statement("division by zero"))).is_match());
    }

    #[test]
    fn test_side_effect_statements() {
        assert!(compare(Expectation::None, Ok(EngineOutput::Affected(3))).is_match());
        assert!(compare(Expectation::None, text_rows(&[&[Some("1")]])).is_match());
        assert!(matches!(
            kind(compare(Expectation::None, Err(EngineError::statement("boom")))),
            MismatchKind::UnexpectedError { .. }
        ));
    }

    #[test]
    fn test_rows_in_order() {
        let expected = Expectation::Rows(rows![[1, "a"], [2, "b"]]);
        assert!(
            compare(
                expected.clone(),
                text_rows(&[&[Some("1"), Some("a")], &[Some("2"), Some("b")]])
            )
            .is_match()
        );
        assert_eq!(
            kind(compare(
                expected,
                text_rows(&[&[Some("2"), Some("b")], &[Some("1"), Some("a")]])
            )),
            MismatchKind::Value {
                row: 0,
                column: 0,
                expected: "1".to_string(),
                actual: "2".to_string()
            }
        );
    }

    #[test]
    fn test_row_count_and_width() {
        assert_eq!(
            kind(compare(Expectation::Rows(rows![[1]]), text_rows(&[]))),
            MismatchKind::RowCount {
                expected: 1,
                actual: 0
            }
        );
        assert_eq!(
            kind(compare(
                Expectation::Rows(rows![[1]]),
                text_rows(&[&[Some("1"), Some("2")]])
            )),
            MismatchKind::RowWidth {
                row: 0,
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_affected_against_rows() {
        assert!(compare(Expectation::Rows(vec![]), Ok(EngineOutput::Affected(0))).is_match());
        assert!(matches!(
            kind(compare(Expectation::Rows(rows![[1]]), Ok(EngineOutput::Affected(1)))),
            MismatchKind::RowCount { .. }
        ));
    }

    #[test]
    fn test_nan_is_not_null() {
        let expected = Expectation::Rows(vec![vec![Value::NAN]]);
        assert!(compare(expected.clone(), text_rows(&[&[Some("NaN")]])).is_match());
        assert!(!compare(expected, text_rows(&[&[None]])).is_match());

        let expected = Expectation::Rows(vec![vec![Value::NULL]]);
        assert!(!compare(expected, text_rows(&[&[Some("NaN")]])).is_match());
    }

    #[test]
    fn test_numeric_formatting_is_significant() {
        let expected = Expectation::Rows(vec![vec![Value::numeric("1.50")]]);
        assert!(!compare(expected, text_rows(&[&[Some("1.5")]])).is_match());
    }

    #[test]
    fn test_unordered_rows() {
        let comparator = Comparator::new();
        let expected = Expectation::Rows(rows![[1], [2], [2]]);
        let actual = text_rows(&[&[Some("2")], &[Some("1")], &[Some("2")]]);
        assert!(
            comparator
                .compare("SQL", &expected, RowOrder::Unordered, &actual)
                .is_match()
        );

        let actual = text_rows(&[&[Some("2")], &[Some("1")], &[Some("3")]]);
        match comparator.compare("SQL", &expected, RowOrder::Unordered, &actual) {
            Comparison::Mismatch(m) => assert_eq!(
                m.kind,
                MismatchKind::UnorderedRows {
                    missing: 1,
                    unexpected: 1
                }
            ),
            Comparison::Match => panic!("expected a mismatch"),
        }
    }

    #[test]
    fn test_suppressed_rows_still_check_errors() {
        let comparator = Comparator::new().with_rows_suppressed(true);
        let expected = Expectation::Rows(rows![[1]]);
        assert!(
            comparator
                .compare("SQL", &expected, RowOrder::Exact, &text_rows(&[]))
                .is_match()
        );
        assert!(
            !comparator
                .compare(
                    "SQL",
                    &expected,
                    RowOrder::Exact,
                    &Err(EngineError::statement("boom"))
                )
                .is_match()
        );
    }

    #[test]
    fn test_mismatch_rendering() {
        let comparator = Comparator::new().with_null_display("(null)");
        let comparison = comparator.compare(
            "SELECT * FROM t;",
            &Expectation::Rows(vec![vec![Value::from(1), Value::NULL]]),
            RowOrder::Exact,
            &text_rows(&[]),
        );
        let Comparison::Mismatch(mismatch) = comparison else {
            panic!("expected a mismatch");
        };
        assert_eq!(mismatch.sql, "SELECT * FROM t;");
        assert_eq!(mismatch.expected, "1 | (null)\n(1 row)");
        assert_eq!(mismatch.actual, "(0 rows)");

        let report = mismatch.to_string();
        assert!(report.starts_with("expected 1 rows, got 0\n"));
        assert!(report.contains("  statement: SELECT * FROM t;\n"));
    }

    #[test]
    fn test_divergent_cell_uses_null_display() {
        let comparator = Comparator::new().with_null_display("(null)");
        let comparison = comparator.compare(
            "SELECT a FROM t;",
            &Expectation::Rows(vec![vec![Value::from(1)]]),
            RowOrder::Exact,
            &text_rows(&[&[None]]),
        );
        let Comparison::Mismatch(mismatch) = comparison else {
            panic!("expected a mismatch");
        };
        assert_eq!(
            mismatch.kind,
            MismatchKind::Value {
                row: 0,
                column: 0,
                expected: "1".to_string(),
                actual: "(null)".to_string(),
            }
        );
        assert!(mismatch.to_string().contains("expected 1, got (null)"));
    }
}
