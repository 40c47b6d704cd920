// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for the runner
//!
//! Only failures that prevent a run from starting are errors. Everything that
//! goes wrong while statements execute is recorded in the verdict instead.

use sql_regress_engine::EngineError;
use sql_regress_fixture::ResolutionError;
use thiserror::Error;

/// Result type alias for harness entry points
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Result type alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A backslash directive that cannot be executed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("invalid command \\{0}")]
    Unknown(String),

    #[error("\\{command}: missing required argument")]
    MissingArgument { command: String },

    #[error("\\{command}: unterminated quoted string")]
    UnterminatedQuote { command: String },

    #[error("\\{command}: {message}")]
    InvalidArgument { command: String, message: String },
}

/// Invalid configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors that stop a run before any statement executes
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Failed to connect to {engine}: {source}")]
    Connect {
        engine: String,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
