// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Harness Configuration
//!
//! Settings that control how a run reacts to failures and how long it may take.
//!
//! ## Sources
//!
//! - [`HarnessConfig::default`]
//! - YAML text via [`HarnessConfig::from_yaml_str`]
//! - environment variables via [`HarnessConfig::from_env`], layered over the defaults
//!
//! ## Example
//!
//! ```rust
//! use sql_regress_runner::{AbortPolicy, HarnessConfig};
//!
//! let config = HarnessConfig::default()
//!     .with_timeout_secs(30)
//!     .with_abort_policy(AbortPolicy::Continue);
//! assert_eq!(config.timeout().map(|t| t.as_secs()), Some(30));
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Overall run deadline, in seconds
pub const TIMEOUT_ENV: &str = "SQL_REGRESS_TIMEOUT_SECS";
/// One of `continue`, `halt_on_aborted_transaction`, `halt_on_first_mismatch`
pub const ABORT_POLICY_ENV: &str = "SQL_REGRESS_ABORT_POLICY";
/// One of `full`, `side_effects_only`
pub const DEPENDENCIES_ENV: &str = "SQL_REGRESS_DEPENDENCIES";

/// Statement used to leave an aborted transaction
pub const DEFAULT_RECOVERY_STATEMENT: &str = "ROLLBACK";

/// When a failing statement stops the rest of its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortPolicy {
    /// Always run every statement
    Continue,
    /// Stop the file when an unexpected error leaves the transaction aborted
    #[default]
    HaltOnAbortedTransaction,
    /// Stop the file at its first failing statement
    HaltOnFirstMismatch,
}

impl FromStr for AbortPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(AbortPolicy::Continue),
            "halt_on_aborted_transaction" => Ok(AbortPolicy::HaltOnAbortedTransaction),
            "halt_on_first_mismatch" => Ok(AbortPolicy::HaltOnFirstMismatch),
            _ => Err(ConfigError::InvalidValue {
                key: "abort_policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Which statements count towards the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyReporting {
    /// Every executed statement counts
    #[default]
    Full,
    /// Dependencies only prepare state; their outcomes are not reported
    SideEffectsOnly,
}

impl FromStr for DependencyReporting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(DependencyReporting::Full),
            "side_effects_only" => Ok(DependencyReporting::SideEffectsOnly),
            _ => Err(ConfigError::InvalidValue {
                key: "dependency_reporting".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Deadline for a whole run, in seconds; `None` means no deadline
    pub timeout_secs: Option<u64>,

    pub abort_policy: AbortPolicy,

    /// Issued after a file was stopped, so the next file starts outside a
    /// transaction. `None` skips straight to reconnecting.
    pub recovery_statement: Option<String>,

    pub dependency_reporting: DependencyReporting,

    /// Initial NULL rendering in diagnostics
    pub null_display: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            abort_policy: AbortPolicy::default(),
            recovery_statement: Some(DEFAULT_RECOVERY_STATEMENT.to_string()),
            dependency_reporting: DependencyReporting::default(),
            null_display: String::new(),
        }
    }
}

impl HarnessConfig {
    /// Load from YAML; missing keys keep their defaults
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: HarnessConfig = serde_yaml::from_str(text)?;
        config.validate()
    }

    /// Defaults overridden by `SQL_REGRESS_*` environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `SQL_REGRESS_*` keys
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(TIMEOUT_ENV) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: TIMEOUT_ENV.to_string(),
                    value: value.clone(),
                })?;
            config.timeout_secs = Some(secs);
        }
        if let Some(value) = lookup(ABORT_POLICY_ENV) {
            config.abort_policy = value.parse()?;
        }
        if let Some(value) = lookup(DEPENDENCIES_ENV) {
            config.dependency_reporting = value.parse()?;
        }

        config.validate()
    }

    fn validate(self) -> ConfigResult<Self> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self
            .recovery_statement
            .as_deref()
            .is_some_and(|sql| sql.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                key: "recovery_statement".to_string(),
                value: String::new(),
            });
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_abort_policy(mut self, policy: AbortPolicy) -> Self {
        self.abort_policy = policy;
        self
    }

    pub fn with_recovery_statement(mut self, sql: Option<String>) -> Self {
        self.recovery_statement = sql;
        self
    }

    pub fn with_dependency_reporting(mut self, reporting: DependencyReporting) -> Self {
        self.dependency_reporting = reporting;
        self
    }

    pub fn with_null_display(mut self, display: impl Into<String>) -> Self {
        self.null_display = display.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeout(), None);
        assert_eq!(config.abort_policy, AbortPolicy::HaltOnAbortedTransaction);
        assert_eq!(config.recovery_statement.as_deref(), Some("ROLLBACK"));
        assert_eq!(config.dependency_reporting, DependencyReporting::Full);
        assert_eq!(config.null_display, "");
    }

    #[test]
    fn test_from_yaml() {
        let config = HarnessConfig::from_yaml_str(
            "timeout_secs: 5\nabort_policy: halt_on_first_mismatch\nnull_display: '(null)'\n",
        )
        .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.abort_policy, AbortPolicy::HaltOnFirstMismatch);
        assert_eq!(config.null_display, "(null)");
        assert_eq!(config.dependency_reporting, DependencyReporting::Full);

        assert!(matches!(
            HarnessConfig::from_yaml_str("abort_policy: sometimes\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            HarnessConfig::from_yaml_str("timeout_secs: 0\n"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            (TIMEOUT_ENV, "12"),
            (ABORT_POLICY_ENV, "continue"),
            (DEPENDENCIES_ENV, "side_effects_only"),
        ]);
        let config =
            HarnessConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.timeout_secs, Some(12));
        assert_eq!(config.abort_policy, AbortPolicy::Continue);
        assert_eq!(
            config.dependency_reporting,
            DependencyReporting::SideEffectsOnly
        );

        let err = HarnessConfig::from_lookup(|key| {
            (key == TIMEOUT_ENV).then(|| "soon".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for SQL_REGRESS_TIMEOUT_SECS: 'soon'"
        );
    }
}
