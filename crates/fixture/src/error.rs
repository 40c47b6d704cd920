// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for registration and resolution
//!
//! Both kinds are fatal: registration errors at startup, resolution errors
//! before any statement of the requested run executes.

use thiserror::Error;

use crate::file::FileName;

/// Result type alias for registry mutations
pub type RegistryResult<T> = Result<T, RegistrationError>;

/// Result type alias for lookups and dependency resolution
pub type ResolveResult<T> = Result<T, ResolutionError>;

/// Errors raised while populating the registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A file with the same name is already registered
    #[error("Regression file '{0}' is already registered")]
    DuplicateName(FileName),

    /// The file name is not a valid identifier
    #[error("Invalid regression file name: '{0}'")]
    InvalidName(FileName),

    /// The population phase has ended
    #[error("Registry is sealed, cannot register '{0}'")]
    Sealed(FileName),
}

/// Errors raised while looking up files or resolving dependencies
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The named file is not registered
    #[error("Regression file '{name}' not found{}", required_by_suffix(.required_by))]
    NotFound {
        name: FileName,
        /// The file whose `depends_on` named it, if any
        required_by: Option<FileName>,
    },

    /// Resolution would not terminate
    #[error("Cyclic dependency between regression files: {}", join_cycle(.cycle))]
    CyclicDependency {
        /// Members of the cycle; the first name is repeated at the end
        cycle: Vec<FileName>,
    },
}

fn required_by_suffix(required_by: &Option<FileName>) -> String {
    match required_by {
        Some(parent) => format!(" (required by '{}')", parent),
        None => String::new(),
    }
}

fn join_cycle(cycle: &[FileName]) -> String {
    cycle
        .iter()
        .map(FileName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ResolutionError::NotFound {
            name: "b".into(),
            required_by: Some("a".into()),
        };
        assert_eq!(
            err.to_string(),
            "Regression file 'b' not found (required by 'a')"
        );

        let err = ResolutionError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic dependency between regression files: a -> b -> a"
        );
    }
}
