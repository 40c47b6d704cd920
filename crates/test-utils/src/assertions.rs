// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Verdict assertions
//!
//! Each check returns `anyhow::Result` with the full report in the error, so
//! tests can chain them with `?`.

use anyhow::{Result, bail};

use sql_regress_runner::{
    FailureDetail, FileTally, Mismatch, MismatchKind, NotRunReason, RunVerdict,
};

/// Assert that every reported statement matched or was skipped
pub fn assert_passed(verdict: &RunVerdict) -> Result<()> {
    if !verdict.passed {
        bail!("Expected the run to pass:\n{}", verdict);
    }
    Ok(())
}

/// Assert that the run failed
pub fn assert_failed(verdict: &RunVerdict) -> Result<()> {
    if verdict.passed {
        bail!("Expected the run to fail:\n{}", verdict);
    }
    Ok(())
}

/// Tally of a reported file
pub fn file_tally<'v>(verdict: &'v RunVerdict, file: &str) -> Result<&'v FileTally> {
    match verdict.file(file) {
        Some(tally) => Ok(tally),
        None => bail!(
            "File '{}' not in the report; reported files: {:?}",
            file,
            reported_files(verdict)
        ),
    }
}

/// Names of the reported files, in execution order
pub fn reported_files(verdict: &RunVerdict) -> Vec<&str> {
    verdict.files.iter().map(|t| t.file.as_str()).collect()
}

/// Assert the files of the report and their order
pub fn assert_reported_files(verdict: &RunVerdict, expected: &[&str]) -> Result<()> {
    let actual = reported_files(verdict);
    if actual != expected {
        bail!(
            "Reported files mismatch.\nExpected: {:?}\nActual: {:?}",
            expected,
            actual
        );
    }
    Ok(())
}

/// Assert that the only failure is a mismatch at `file`, statement `index`
pub fn assert_single_mismatch<'v>(
    verdict: &'v RunVerdict,
    file: &str,
    index: usize,
) -> Result<&'v Mismatch> {
    let [failure] = verdict.failures.as_slice() else {
        bail!(
            "Expected exactly one failure, found {}:\n{}",
            verdict.failures.len(),
            verdict
        );
    };
    if failure.file.as_str() != file || failure.index != index {
        bail!(
            "Expected the failure at {} statement {}, found it at {} statement {}:\n{}",
            file,
            index,
            failure.file,
            failure.index,
            verdict
        );
    }
    match &failure.detail {
        FailureDetail::Mismatch(mismatch) => Ok(mismatch),
        other => bail!("Expected a mismatch, found: {}", other),
    }
}

/// Assert that a mismatch is of the given kind, ignoring field values
pub fn assert_mismatch_kind(mismatch: &Mismatch, expected: &MismatchKind) -> Result<()> {
    if std::mem::discriminant(&mismatch.kind) != std::mem::discriminant(expected) {
        bail!(
            "Mismatch kind differs.\nExpected: {:?}\nActual: {:?}",
            expected,
            mismatch.kind
        );
    }
    Ok(())
}

/// Assert which statements of a file matched, failed and did not run
pub fn assert_tally(
    verdict: &RunVerdict,
    file: &str,
    passed: &[usize],
    failed: &[usize],
    not_run: &[usize],
) -> Result<()> {
    let tally = file_tally(verdict, file)?;
    if tally.passed != passed || tally.failed != failed || tally.not_run != not_run {
        bail!(
            "Tally of '{}' mismatch.\nExpected: passed {:?}, failed {:?}, not run {:?}\nActual: passed {:?}, failed {:?}, not run {:?}",
            file,
            passed,
            failed,
            not_run,
            tally.passed,
            tally.failed,
            tally.not_run
        );
    }
    Ok(())
}

/// Assert that every not-run statement of the run has this reason
pub fn assert_not_run_reason(verdict: &RunVerdict, reason: NotRunReason) -> Result<()> {
    let mut seen = false;
    for failure in &verdict.failures {
        if let FailureDetail::NotRun(actual) = failure.detail {
            seen = true;
            if actual != reason {
                bail!(
                    "{} statement {} not run because '{}', expected '{}'",
                    failure.file,
                    failure.index,
                    actual,
                    reason
                );
            }
        }
    }
    if !seen {
        bail!("Expected statements not run because '{}':\n{}", reason, verdict);
    }
    Ok(())
}
