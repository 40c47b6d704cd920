// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL Regression Fixtures
//!
//! Data model for recorded SQL regression transcripts.
//!
//! A regression file is a named list of statements, each with the rows or the
//! error the reference engine produced for it. Files declare the files they
//! depend on, are collected in a [`Registry`], and are resolved into an
//! execution plan by [`resolver::resolve`].
//!
//! ```
//! use sql_regress_fixture::{RegressionFile, RegressionFileStatement, Registry, rows};
//!
//! let registry = Registry::new();
//! registry
//!     .register(
//!         RegressionFile::new("numbers")
//!             .with_dependencies(["setup"])
//!             .statement(RegressionFileStatement::new("SELECT 1;").with_rows(rows![[1]])),
//!     )
//!     .unwrap();
//! ```

pub mod error;
pub mod file;
pub mod registry;
pub mod resolver;
pub mod value;

pub use error::{RegistrationError, RegistryResult, ResolutionError, ResolveResult};
pub use file::{Expectation, FileName, RegressionFile, RegressionFileStatement, RowOrder};
pub use registry::{Registry, register_regression_file};
pub use resolver::{FileSource, ResolvedFile, resolve, resolve_plan};
pub use value::{FloatSpecial, Row, Value};
