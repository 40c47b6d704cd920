// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Statement outcomes and run verdicts
//!
//! The executor records one [`StatementOutcome`] per statement of every file it
//! was given, plus a [`RunFault`] if the session could not be recovered
//! between files. [`aggregate`] folds that [`Replay`] into a [`RunVerdict`]:
//! pass/fail, the ordered failures, and a tally per file.

use serde::Serialize;
use std::fmt;

use sql_regress_fixture::FileName;

use crate::compare::Mismatch;
use crate::config::DependencyReporting;

/// The session became unusable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionFault {
    /// The engine reported the connection as lost
    ConnectionLost(String),
    /// A new connection could not be opened
    ReconnectFailed(String),
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFault::ConnectionLost(message) => write!(f, "connection lost: {}", message),
            SessionFault::ReconnectFailed(message) => write!(f, "reconnect failed: {}", message),
        }
    }
}

/// Why a statement was not executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotRunReason {
    /// An earlier statement left the transaction aborted
    AbortedTransaction,
    /// An earlier statement of the file failed under `HaltOnFirstMismatch`
    Halted,
    /// No usable session
    SessionFault,
    Timeout,
    Cancelled,
}

impl fmt::Display for NotRunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NotRunReason::AbortedTransaction => "transaction aborted by an earlier statement",
            NotRunReason::Halted => "file halted at an earlier mismatch",
            NotRunReason::SessionFault => "no usable session",
            NotRunReason::Timeout => "run timed out",
            NotRunReason::Cancelled => "run cancelled",
        };
        f.write_str(text)
    }
}

/// What happened to one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Matched,
    Skipped,
    Mismatched(Mismatch),
    Faulted(SessionFault),
    NotRun(NotRunReason),
}

impl OutcomeStatus {
    pub fn is_failure(&self) -> bool {
        !matches!(self, OutcomeStatus::Matched | OutcomeStatus::Skipped)
    }
}

/// Outcome of one statement of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementOutcome {
    pub file: FileName,
    /// Zero-based position in the file
    pub index: usize,
    /// Statement text as recorded
    pub sql: String,
    /// The file was pulled in as a dependency
    pub is_dependency: bool,
    pub status: OutcomeStatus,
}

/// Recovering the session after a halted file failed; nothing ran afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFault {
    /// The file whose halt required recovery
    pub after: FileName,
    pub fault: SessionFault,
}

impl fmt::Display for RunFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "after '{}': {}", self.after, self.fault)
    }
}

/// Everything the executor recorded for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    pub outcomes: Vec<StatementOutcome>,
    pub fault: Option<RunFault>,
}

impl From<Vec<StatementOutcome>> for Replay {
    fn from(outcomes: Vec<StatementOutcome>) -> Self {
        Self {
            outcomes,
            fault: None,
        }
    }
}

/// Failure detail in a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureDetail {
    Mismatch(Mismatch),
    Fault(SessionFault),
    NotRun(NotRunReason),
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDetail::Mismatch(mismatch) => write!(f, "{}", mismatch),
            FailureDetail::Fault(fault) => writeln!(f, "session fault: {}", fault),
            FailureDetail::NotRun(reason) => writeln!(f, "not run: {}", reason),
        }
    }
}

/// A statement that did not match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub file: FileName,
    pub index: usize,
    pub sql: String,
    pub detail: FailureDetail,
}

impl Failure {
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match &self.detail {
            FailureDetail::Mismatch(mismatch) => Some(mismatch),
            _ => None,
        }
    }
}

/// Statement indexes of one file, by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileTally {
    pub file: FileName,
    pub is_dependency: bool,
    pub passed: Vec<usize>,
    pub skipped: Vec<usize>,
    pub failed: Vec<usize>,
    pub not_run: Vec<usize>,
}

impl FileTally {
    fn new(file: FileName, is_dependency: bool) -> Self {
        Self {
            file,
            is_dependency,
            ..Default::default()
        }
    }

    pub fn is_passed(&self) -> bool {
        self.failed.is_empty() && self.not_run.is_empty()
    }
}

/// Statement counts over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_run: usize,
}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunVerdict {
    /// Every reported statement matched or was skipped, and the session never
    /// had to be given up
    pub passed: bool,
    /// Failures in execution order
    pub failures: Vec<Failure>,
    /// One tally per reported file, in execution order
    pub files: Vec<FileTally>,
    /// Session recovery between files failed
    pub fault: Option<RunFault>,
}

impl RunVerdict {
    pub fn first_failure(&self) -> Option<&Failure> {
        self.failures.first()
    }

    /// Failures caused by content mismatches only
    pub fn mismatches(&self) -> impl Iterator<Item = &Failure> {
        self.failures.iter().filter(|f| f.mismatch().is_some())
    }

    pub fn file(&self, name: &str) -> Option<&FileTally> {
        self.files.iter().find(|t| t.file.as_str() == name)
    }

    pub fn totals(&self) -> Totals {
        self.files.iter().fold(Totals::default(), |mut totals, tally| {
            totals.passed += tally.passed.len();
            totals.skipped += tally.skipped.len();
            totals.failed += tally.failed.len();
            totals.not_run += tally.not_run.len();
            totals
        })
    }

    /// Machine-readable report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Panic with the full report unless the run passed
    #[track_caller]
    pub fn assert_passed(&self) {
        if !self.passed {
            panic!("{}", self);
        }
    }
}

impl fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals();
        writeln!(
            f,
            "regression run {}: {} passed, {} failed, {} not run, {} skipped",
            if self.passed { "passed" } else { "FAILED" },
            totals.passed,
            totals.failed,
            totals.not_run,
            totals.skipped
        )?;

        for tally in &self.files {
            if !tally.is_passed() {
                writeln!(
                    f,
                    "  {}: {} failed, {} not run",
                    tally.file,
                    tally.failed.len(),
                    tally.not_run.len()
                )?;
            }
        }

        if let Some(fault) = &self.fault {
            writeln!(f, "  session fault {}", fault)?;
        }

        // NotRun runs can be long; report only the first of each stretch
        let mut previous_not_run: Option<(&FileName, NotRunReason)> = None;
        for failure in &self.failures {
            if let FailureDetail::NotRun(reason) = failure.detail {
                if previous_not_run == Some((&failure.file, reason)) {
                    continue;
                }
                previous_not_run = Some((&failure.file, reason));
            } else {
                previous_not_run = None;
            }
            writeln!(f)?;
            writeln!(f, "--- {} statement {}", failure.file, failure.index + 1)?;
            write!(f, "{}", failure.detail)?;
        }
        Ok(())
    }
}

/// Fold statement outcomes into a verdict
pub fn aggregate(replay: &Replay, reporting: DependencyReporting) -> RunVerdict {
    let mut failures = Vec::new();
    let mut files: Vec<FileTally> = Vec::new();

    let reported = replay.outcomes.iter().filter(|o| {
        !(o.is_dependency && reporting == DependencyReporting::SideEffectsOnly)
    });

    for outcome in reported {
        if files.last().is_none_or(|tally| tally.file != outcome.file) {
            files.push(FileTally::new(outcome.file.clone(), outcome.is_dependency));
        }
        let Some(tally) = files.last_mut() else {
            continue;
        };

        let detail = match &outcome.status {
            OutcomeStatus::Matched => {
                tally.passed.push(outcome.index);
                continue;
            }
            OutcomeStatus::Skipped => {
                tally.skipped.push(outcome.index);
                continue;
            }
            OutcomeStatus::Mismatched(mismatch) => {
                tally.failed.push(outcome.index);
                FailureDetail::Mismatch(mismatch.clone())
            }
            OutcomeStatus::Faulted(fault) => {
                tally.failed.push(outcome.index);
                FailureDetail::Fault(fault.clone())
            }
            OutcomeStatus::NotRun(reason) => {
                tally.not_run.push(outcome.index);
                FailureDetail::NotRun(*reason)
            }
        };

        failures.push(Failure {
            file: outcome.file.clone(),
            index: outcome.index,
            sql: outcome.sql.clone(),
            detail,
        });
    }

    RunVerdict {
        passed: failures.is_empty() && replay.fault.is_none(),
        failures,
        files,
        fault: replay.fault.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::MismatchKind;

    fn outcome(file: &str, index: usize, is_dependency: bool, status: OutcomeStatus) -> StatementOutcome {
        StatementOutcome {
            file: file.into(),
            index,
            sql: format!("stmt {}", index),
            is_dependency,
            status,
        }
    }

    fn mismatch() -> OutcomeStatus {
        OutcomeStatus::Mismatched(Mismatch {
            sql: "SELECT * FROM t;".to_string(),
            kind: MismatchKind::RowCount {
                expected: 1,
                actual: 0,
            },
            expected: "1\n(1 row)".to_string(),
            actual: "(0 rows)".to_string(),
        })
    }

    #[test]
    fn test_all_matched_passes() {
        let outcomes = vec![
            outcome("setup", 0, true, OutcomeStatus::Matched),
            outcome("x", 0, false, OutcomeStatus::Matched),
            outcome("x", 1, false, OutcomeStatus::Skipped),
        ];
        let verdict = aggregate(&outcomes.clone().into(), DependencyReporting::Full);
        assert!(verdict.passed);
        assert!(verdict.failures.is_empty());
        assert_eq!(verdict.files.len(), 2);
        assert_eq!(
            verdict.totals(),
            Totals {
                passed: 2,
                skipped: 1,
                failed: 0,
                not_run: 0
            }
        );
    }

    #[test]
    fn test_failures_in_order() {
        let outcomes = vec![
            outcome("x", 0, false, OutcomeStatus::Matched),
            outcome("x", 1, false, mismatch()),
            outcome("x", 2, false, OutcomeStatus::NotRun(NotRunReason::AbortedTransaction)),
            outcome("x", 3, false, OutcomeStatus::NotRun(NotRunReason::AbortedTransaction)),
        ];
        let verdict = aggregate(&outcomes.clone().into(), DependencyReporting::Full);
        assert!(!verdict.passed);
        let indexes: Vec<usize> = verdict.failures.iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert_eq!(verdict.mismatches().count(), 1);

        let tally = verdict.file("x").unwrap();
        assert_eq!(tally.passed, vec![0]);
        assert_eq!(tally.failed, vec![1]);
        assert_eq!(tally.not_run, vec![2, 3]);

        let report = verdict.to_string();
        assert!(report.starts_with("regression run FAILED: 1 passed, 1 failed, 2 not run, 0 skipped"));
        assert_eq!(report.matches("not run: transaction aborted").count(), 1);
    }

    #[test]
    fn test_side_effects_only_hides_dependencies() {
        let outcomes = vec![
            outcome("setup", 0, true, mismatch()),
            outcome("x", 0, false, OutcomeStatus::Matched),
        ];
        assert!(!aggregate(&outcomes.clone().into(), DependencyReporting::Full).passed);

        let verdict = aggregate(&outcomes.clone().into(), DependencyReporting::SideEffectsOnly);
        assert!(verdict.passed);
        assert!(verdict.file("setup").is_none());
    }

    #[test]
    fn test_aggregation_is_pure() {
        let outcomes = vec![
            outcome("x", 0, false, mismatch()),
            outcome("x", 1, false, OutcomeStatus::Faulted(SessionFault::ConnectionLost("gone".to_string()))),
        ];
        assert_eq!(
            aggregate(&outcomes.clone().into(), DependencyReporting::Full),
            aggregate(&outcomes.clone().into(), DependencyReporting::Full)
        );
    }

    #[test]
    fn test_json_report() {
        let verdict = aggregate(
            &vec![outcome("x", 0, false, mismatch())].into(),
            DependencyReporting::Full,
        );
        let json: serde_json::Value = serde_json::from_str(&verdict.to_json().unwrap()).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["files"][0]["file"], "x");
        assert_eq!(json["failures"][0]["index"], 0);
    }

    #[test]
    fn test_run_fault_fails_the_run() {
        let replay = Replay {
            outcomes: vec![
                outcome("x", 0, false, mismatch()),
                outcome("y", 0, false, OutcomeStatus::NotRun(NotRunReason::SessionFault)),
            ],
            fault: Some(RunFault {
                after: "x".into(),
                fault: SessionFault::ReconnectFailed("refused".to_string()),
            }),
        };
        let verdict = aggregate(&replay, DependencyReporting::SideEffectsOnly);
        assert!(!verdict.passed);
        assert!(
            verdict
                .to_string()
                .contains("session fault after 'x': reconnect failed: refused")
        );

        let fault_only = Replay {
            outcomes: vec![outcome("x", 0, false, OutcomeStatus::Matched)],
            fault: replay.fault.clone(),
        };
        let verdict = aggregate(&fault_only, DependencyReporting::Full);
        assert!(verdict.failures.is_empty());
        assert!(!verdict.passed);
        let json: serde_json::Value = serde_json::from_str(&verdict.to_json().unwrap()).unwrap();
        assert_eq!(json["fault"]["after"], "x");
    }
}
