// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Statement replay
//!
//! The [`Executor`] replays an execution plan on a single session, strictly in
//! order, and records one [`StatementOutcome`] per statement.
//!
//! ## Failure handling
//!
//! - A mismatch is recorded and replay continues, unless the abort policy says
//!   the rest of the file cannot run meaningfully.
//! - An unexpected error that aborts the transaction blocks the statements up
//!   to the file's own `COMMIT`/`ROLLBACK` (or `\c`); replay resumes there.
//! - A halted file, or one that ends inside an aborted transaction, is
//!   followed by the recovery statement (or a reconnect), so the next file
//!   starts with a usable session.
//! - A lost connection stops the file and forces a reconnect.
//! - A failed reconnect, the run deadline and cancellation stop the whole
//!   run; every statement not yet executed is recorded as not run.

use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sql_regress_engine::{EngineError, EngineOutput, SqlEngine, TransactionStatus};
use sql_regress_fixture::{Expectation, RegressionFileStatement, ResolvedFile};

use crate::compare::{Comparator, Comparison, MismatchKind};
use crate::config::{AbortPolicy, HarnessConfig};
use crate::directive::{Command, Directive, Variables};
use crate::error::{HarnessError, HarnessResult};
use crate::session::Session;
use crate::verdict::{NotRunReason, OutcomeStatus, Replay, RunFault, SessionFault, StatementOutcome};

/// What replay does after a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Skip statements until one ends the aborted transaction
    BlockTransaction,
    /// Skip the rest of the file, then recover the session
    HaltFile { reason: NotRunReason, reconnect: bool },
    /// Skip everything that is left
    Stop(NotRunReason),
}

struct Step {
    status: OutcomeStatus,
    flow: Flow,
}

impl Step {
    fn matched() -> Self {
        Self {
            status: OutcomeStatus::Matched,
            flow: Flow::Continue,
        }
    }

    fn interrupted(reason: NotRunReason) -> Self {
        Self {
            status: OutcomeStatus::NotRun(reason),
            flow: Flow::Stop(reason),
        }
    }
}

/// Why recovering the session after a stopped file failed
enum RecoveryFailure {
    Interrupted(NotRunReason),
    Fault(SessionFault),
}

/// Replays files against one engine session
pub struct Executor {
    engine: Arc<dyn SqlEngine>,
    config: HarnessConfig,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(engine: Arc<dyn SqlEngine>, config: HarnessConfig) -> Self {
        Self {
            engine,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replay `files` in order on a fresh session
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Connect` if the initial connection fails. All
    /// other problems are recorded in the returned replay.
    pub async fn run(&self, files: &[ResolvedFile]) -> HarnessResult<Replay> {
        let deadline = self.config.timeout().map(|timeout| Instant::now() + timeout);

        let opened = self
            .guarded(
                Session::open(self.engine.clone(), self.config.null_display.clone()),
                deadline,
            )
            .await;

        let mut session = match opened {
            Ok(Ok(session)) => session,
            Ok(Err(source)) => {
                return Err(HarnessError::Connect {
                    engine: self.engine.name().to_string(),
                    source,
                });
            }
            Err(reason) => {
                warn!(%reason, "run interrupted while connecting");
                return Ok(Replay {
                    outcomes: not_run(files, reason),
                    fault: None,
                });
            }
        };

        let outcomes = self.replay(&mut session, files, deadline).await;
        session.close().await;
        Ok(outcomes)
    }

    async fn replay(
        &self,
        session: &mut Session,
        files: &[ResolvedFile],
        deadline: Option<Instant>,
    ) -> Replay {
        let mut outcomes = Vec::new();
        let mut stop: Option<NotRunReason> = None;
        let mut fault: Option<RunFault> = None;

        for resolved in files {
            let file = &resolved.file;
            info!(
                file = %file.name(),
                statements = file.statements().len(),
                dependency = resolved.is_dependency,
                "=== Replaying regression file ==="
            );

            let mut halt: Option<NotRunReason> = None;
            let mut reconnect = false;
            let mut blocked = false;
            let mut failed = 0usize;

            for (index, statement) in file.statements().iter().enumerate() {
                let status = if let Some(reason) = stop.or(halt) {
                    OutcomeStatus::NotRun(reason)
                } else if statement.is_skipped() {
                    debug!(index, "skipping statement");
                    OutcomeStatus::Skipped
                } else if blocked && !ends_transaction(statement.sql()) {
                    debug!(index, "transaction aborted, not running statement");
                    OutcomeStatus::NotRun(NotRunReason::AbortedTransaction)
                } else {
                    if blocked {
                        debug!(index, "statement ends the aborted transaction");
                        blocked = false;
                    }
                    let step = self.step(session, index, statement, deadline).await;
                    match step.flow {
                        Flow::Continue => {}
                        Flow::BlockTransaction => {
                            warn!(file = %file.name(), index, "transaction aborted");
                            blocked = true;
                        }
                        Flow::HaltFile {
                            reason,
                            reconnect: needs_reconnect,
                        } => {
                            warn!(file = %file.name(), index, %reason, "halting file");
                            halt = Some(reason);
                            reconnect = needs_reconnect;
                        }
                        Flow::Stop(reason) => {
                            warn!(file = %file.name(), index, %reason, "stopping run");
                            stop = Some(reason);
                        }
                    }
                    step.status
                };

                if status.is_failure() {
                    failed += 1;
                }
                outcomes.push(StatementOutcome {
                    file: file.name().clone(),
                    index,
                    sql: statement.sql().to_string(),
                    is_dependency: resolved.is_dependency,
                    status,
                });
            }

            info!(file = %file.name(), failed, "=== Finished regression file ===");

            if (halt.is_some() || blocked) && stop.is_none() {
                match self.recover(session, reconnect, deadline).await {
                    Ok(()) => {}
                    Err(RecoveryFailure::Interrupted(reason)) => stop = Some(reason),
                    Err(RecoveryFailure::Fault(session_fault)) => {
                        warn!(file = %file.name(), fault = %session_fault, "session could not be recovered");
                        stop = Some(NotRunReason::SessionFault);
                        fault = Some(RunFault {
                            after: file.name().clone(),
                            fault: session_fault,
                        });
                    }
                }
            }
        }

        Replay { outcomes, fault }
    }

    async fn step(
        &self,
        session: &mut Session,
        index: usize,
        statement: &RegressionFileStatement,
        deadline: Option<Instant>,
    ) -> Step {
        if let Some(reason) = self.interruption(deadline) {
            return Step::interrupted(reason);
        }

        match Command::parse(statement.sql()) {
            Ok(Command::Directive(directive)) => {
                self.directive(session, index, &directive, deadline).await
            }
            Ok(Command::Sql { sql, gset }) => {
                self.sql(session, index, statement, &sql, gset.as_deref(), deadline)
                    .await
            }
            Err(err) => {
                let message = err.to_string();
                warn!(index, error = %message, "invalid directive");
                let mismatch = self.comparator(session).mismatch(
                    statement.sql(),
                    MismatchKind::InvalidDirective {
                        message: message.clone(),
                    },
                    statement.expectation(),
                    &Err(EngineError::statement(message)),
                );
                let flow = match self.config.abort_policy {
                    AbortPolicy::HaltOnFirstMismatch => Flow::HaltFile {
                        reason: NotRunReason::Halted,
                        reconnect: false,
                    },
                    _ => Flow::Continue,
                };
                Step {
                    status: OutcomeStatus::Mismatched(mismatch),
                    flow,
                }
            }
        }
    }

    async fn directive(
        &self,
        session: &mut Session,
        index: usize,
        directive: &Directive,
        deadline: Option<Instant>,
    ) -> Step {
        if session.apply_local(directive) {
            debug!(index, ?directive, "applied directive");
            return Step::matched();
        }

        info!(index, "reconnecting");
        match self.guarded(session.reconnect(), deadline).await {
            Ok(Ok(())) => Step::matched(),
            Ok(Err(err)) => {
                warn!(index, error = %err, "reconnect failed");
                Step {
                    status: OutcomeStatus::Faulted(SessionFault::ReconnectFailed(err.message)),
                    flow: Flow::Stop(NotRunReason::SessionFault),
                }
            }
            Err(reason) => {
                session.abandon();
                Step::interrupted(reason)
            }
        }
    }

    async fn sql(
        &self,
        session: &mut Session,
        index: usize,
        statement: &RegressionFileStatement,
        sql: &str,
        gset: Option<&str>,
        deadline: Option<Instant>,
    ) -> Step {
        let sql = session.variables().substitute(sql);
        debug!(index, sql = %sql, "executing statement");

        let result = match self.guarded(session.execute(&sql), deadline).await {
            Ok(result) => result,
            Err(reason) => {
                session.abandon();
                return Step::interrupted(reason);
            }
        };

        if let Err(err) = &result {
            if err.is_connection_lost() {
                warn!(index, error = %err, "connection lost");
                return Step {
                    status: OutcomeStatus::Faulted(SessionFault::ConnectionLost(err.message.clone())),
                    flow: Flow::HaltFile {
                        reason: NotRunReason::SessionFault,
                        reconnect: true,
                    },
                };
            }
        }

        let comparator = self.comparator(session);
        let mut comparison =
            comparator.compare(&sql, statement.expectation(), statement.row_order(), &result);

        if comparison.is_match() {
            if let (Some(prefix), Ok(output)) = (gset, &result) {
                if let Err(message) = capture(session.variables_mut(), prefix, output) {
                    comparison = Comparison::Mismatch(comparator.mismatch(
                        &sql,
                        MismatchKind::Capture { message },
                        statement.expectation(),
                        &result,
                    ));
                }
            }
        }

        let mismatch = match comparison {
            Comparison::Match => return Step::matched(),
            Comparison::Mismatch(mismatch) => mismatch,
        };
        warn!(index, sql = %sql, mismatch = %mismatch.kind, "statement mismatch");

        // An error the file did not expect may leave the transaction unusable
        let aborted = match &result {
            Err(err) if !matches!(statement.expectation(), Expectation::Error(_)) => {
                err.is_transaction_aborted()
                    || session.transaction_status() == TransactionStatus::Failed
            }
            _ => false,
        };

        let flow = match self.config.abort_policy {
            AbortPolicy::Continue => Flow::Continue,
            AbortPolicy::HaltOnAbortedTransaction if aborted => Flow::BlockTransaction,
            AbortPolicy::HaltOnAbortedTransaction => Flow::Continue,
            AbortPolicy::HaltOnFirstMismatch => Flow::HaltFile {
                reason: NotRunReason::Halted,
                reconnect: false,
            },
        };

        Step {
            status: OutcomeStatus::Mismatched(mismatch),
            flow,
        }
    }

    /// Leave whatever state a stopped file left behind
    async fn recover(
        &self,
        session: &mut Session,
        reconnect: bool,
        deadline: Option<Instant>,
    ) -> Result<(), RecoveryFailure> {
        if !reconnect {
            if let Some(sql) = &self.config.recovery_statement {
                warn!(statement = %sql, "recovering session");
                match self.guarded(session.execute(sql), deadline).await {
                    Ok(Ok(_)) => return Ok(()),
                    Ok(Err(err)) => warn!(error = %err, "recovery statement failed"),
                    Err(reason) => {
                        session.abandon();
                        return Err(RecoveryFailure::Interrupted(reason));
                    }
                }
            }
        }

        warn!("reconnecting to recover session");
        match self.guarded(session.reconnect(), deadline).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(RecoveryFailure::Fault(SessionFault::ReconnectFailed(
                err.message,
            ))),
            Err(reason) => {
                session.abandon();
                Err(RecoveryFailure::Interrupted(reason))
            }
        }
    }

    fn comparator(&self, session: &Session) -> Comparator {
        Comparator::new()
            .with_null_display(session.null_display())
            .with_rows_suppressed(session.is_output_suppressed())
    }

    fn interruption(&self, deadline: Option<Instant>) -> Option<NotRunReason> {
        if self.cancel.is_cancelled() {
            Some(NotRunReason::Cancelled)
        } else if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            Some(NotRunReason::Timeout)
        } else {
            None
        }
    }

    /// Await `future` unless the run is cancelled or its deadline passes first
    async fn guarded<F>(&self, future: F, deadline: Option<Instant>) -> Result<F::Output, NotRunReason>
    where
        F: Future,
    {
        let timed = async {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, future)
                    .await
                    .map_err(|_| NotRunReason::Timeout),
                None => Ok(future.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NotRunReason::Cancelled),
            result = timed => result,
        }
    }
}

/// The statement leaves an aborted transaction block: `COMMIT`, `END`,
/// `ROLLBACK [TO SAVEPOINT]`, `ABORT`, or a client reconnect
fn ends_transaction(text: &str) -> bool {
    let body = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join(" ");
    if let Ok(Command::Directive(Directive::Connect { .. })) = Command::parse(&body) {
        return true;
    }
    let keyword: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    matches!(
        keyword.to_ascii_lowercase().as_str(),
        "commit" | "end" | "rollback" | "abort"
    )
}

/// Store the single row of `output` into variables named `prefix || column`
fn capture(variables: &mut Variables, prefix: &str, output: &EngineOutput) -> Result<(), String> {
    let Some(output) = output.rows() else {
        return Err("no rows returned for \\gset".to_string());
    };
    match output.rows.as_slice() {
        [row] => {
            for (column, value) in output.columns.iter().zip(row) {
                let name = format!("{}{}", prefix, column);
                match value.token() {
                    Some(token) => variables.set(name, token.into_owned()),
                    None => variables.unset(&name),
                }
            }
            Ok(())
        }
        [] => Err("no rows returned for \\gset".to_string()),
        _ => Err("more than one row returned for \\gset".to_string()),
    }
}

fn not_run(files: &[ResolvedFile], reason: NotRunReason) -> Vec<StatementOutcome> {
    files
        .iter()
        .flat_map(|resolved| {
            resolved
                .file
                .statements()
                .iter()
                .enumerate()
                .map(move |(index, statement)| StatementOutcome {
                    file: resolved.file.name().clone(),
                    index,
                    sql: statement.sql().to_string(),
                    is_dependency: resolved.is_dependency,
                    status: OutcomeStatus::NotRun(reason),
                })
        })
        .collect()
}
