// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Registration through the process-wide registry
//!
//! Each test uses its own file names because the global registry is shared by
//! every test in this binary.

use sql_regress_fixture::{
    FileName, Registry, RegressionFile, RegressionFileStatement, ResolutionError,
    register_regression_file, resolve, rows,
};

#[test]
fn test_registration_order_does_not_matter() {
    // Dependent registered before its dependencies
    register_regression_file(
        RegressionFile::new("order_a")
            .with_dependencies(["order_b"])
            .statement(RegressionFileStatement::new("SELECT * FROM t;").with_rows(rows![[1]])),
    );
    register_regression_file(
        RegressionFile::new("order_b")
            .with_dependencies(["order_c"])
            .statement(RegressionFileStatement::new("INSERT INTO t VALUES (1);")),
    );
    register_regression_file(
        RegressionFile::new("order_c")
            .statement(RegressionFileStatement::new("CREATE TABLE t (a int);")),
    );

    let order = resolve(Registry::global(), &FileName::from("order_a")).unwrap();
    let names: Vec<&str> = order.iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["order_c", "order_b", "order_a"]);
}

#[test]
fn test_unknown_dependency_reported_at_resolution() {
    register_regression_file(RegressionFile::new("lazy_dep").with_dependencies(["never_registered"]));

    let err = resolve(Registry::global(), &FileName::from("lazy_dep")).unwrap_err();
    assert_eq!(
        err,
        ResolutionError::NotFound {
            name: "never_registered".into(),
            required_by: Some("lazy_dep".into()),
        }
    );
}

#[test]
#[should_panic(expected = "already registered")]
fn test_duplicate_registration_panics() {
    register_regression_file(RegressionFile::new("dup_file"));
    register_regression_file(RegressionFile::new("dup_file"));
}

#[test]
#[should_panic(expected = "Invalid regression file name")]
fn test_invalid_name_panics() {
    register_regression_file(RegressionFile::new("bad name"));
}
