// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Regression file registry
//!
//! The registry maps file names to files. It is append-only while it is being
//! populated and read-only once [`Registry::seal`] is called; after sealing,
//! lookups read an immutable map without taking a lock.
//!
//! Registration order never matters: dependencies are looked up by name when a
//! run is resolved, not when a file is registered.
//!
//! ## Usage
//!
//! ```
//! use sql_regress_fixture::{RegressionFile, RegressionFileStatement, Registry};
//!
//! let registry = Registry::new();
//! registry
//!     .register(RegressionFile::new("setup").statement(RegressionFileStatement::new("CREATE TABLE t (a int);")))
//!     .unwrap();
//! registry.seal();
//! assert!(registry.lookup(&"setup".into()).is_ok());
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::{RegistrationError, RegistryResult, ResolutionError, ResolveResult};
use crate::file::{FileName, RegressionFile};

type FileMap = BTreeMap<FileName, Arc<RegressionFile>>;

/// Process-wide registry used by [`register_regression_file`]
static GLOBAL_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Catalog of regression files, keyed by name
#[derive(Debug, Default)]
pub struct Registry {
    /// Files registered during the population phase
    pending: Mutex<FileMap>,
    /// Frozen map, set once by `seal`
    sealed: OnceLock<FileMap>,
}

impl Registry {
    /// Create an empty, unsealed registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static Registry {
        &GLOBAL_REGISTRY
    }

    /// The pending map. A panic while holding the lock leaves the map intact,
    /// so poisoning is ignored.
    fn pending(&self) -> MutexGuard<'_, FileMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a file
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::DuplicateName` if the name is taken,
    /// `RegistrationError::InvalidName` if it is not an identifier, and
    /// `RegistrationError::Sealed` once the registry has been sealed.
    pub fn register(&self, file: RegressionFile) -> RegistryResult<()> {
        if !file.name().is_valid() {
            return Err(RegistrationError::InvalidName(file.name().clone()));
        }

        let mut pending = self.pending();
        if self.sealed.get().is_some() {
            return Err(RegistrationError::Sealed(file.name().clone()));
        }
        if pending.contains_key(file.name()) {
            return Err(RegistrationError::DuplicateName(file.name().clone()));
        }

        tracing::debug!(
            file = %file.name(),
            statements = file.statements().len(),
            "registered regression file"
        );
        pending.insert(file.name().clone(), Arc::new(file));
        Ok(())
    }

    /// End the population phase. Later registrations fail; sealing twice is a no-op.
    pub fn seal(&self) {
        let mut pending = self.pending();
        if self.sealed.get().is_none() {
            let files = std::mem::take(&mut *pending);
            tracing::debug!(files = files.len(), "sealed regression file registry");
            let _ = self.sealed.set(files);
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.get().is_some()
    }

    /// Get a file by name, if registered
    pub fn get(&self, name: &str) -> Option<Arc<RegressionFile>> {
        match self.sealed.get() {
            Some(files) => files.get(name).cloned(),
            None => self.pending().get(name).cloned(),
        }
    }

    /// Look up a file by name
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::NotFound` if no such file is registered.
    pub fn lookup(&self, name: &FileName) -> ResolveResult<Arc<RegressionFile>> {
        self.get(name.as_str())
            .ok_or_else(|| ResolutionError::NotFound {
                name: name.clone(),
                required_by: None,
            })
    }

    /// All registered files, ordered by name
    pub fn all(&self) -> Vec<Arc<RegressionFile>> {
        match self.sealed.get() {
            Some(files) => files.values().cloned().collect(),
            None => self.pending().values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self.sealed.get() {
            Some(files) => files.len(),
            None => self.pending().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Register a file with the process-wide registry
///
/// Intended to be called from static initializers, one call per fixture.
///
/// # Panics
///
/// Panics if the file cannot be registered, which is a programming error in
/// the fixture set (duplicate or invalid name, or registration after sealing).
pub fn register_regression_file(file: RegressionFile) {
    if let Err(err) = Registry::global().register(file) {
        panic!("{}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::RegressionFileStatement;

    fn file(name: &str) -> RegressionFile {
        RegressionFile::new(name).statement(RegressionFileStatement::new("SELECT 1;"))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        registry.register(file("a")).unwrap();
        registry.register(file("b")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(&"a".into()).unwrap().name().as_str(), "a");
        assert!(matches!(
            registry.lookup(&"zz".into()),
            Err(ResolutionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = Registry::new();
        registry.register(file("a")).unwrap();
        assert_eq!(
            registry.register(file("a")),
            Err(RegistrationError::DuplicateName("a".into()))
        );
    }

    #[test]
    fn test_invalid_name_rejected() {
        let registry = Registry::new();
        assert!(matches!(
            registry.register(file("not a name")),
            Err(RegistrationError::InvalidName(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_all_is_independent_of_registration_order() {
        let first = Registry::new();
        first.register(file("c")).unwrap();
        first.register(file("a")).unwrap();
        first.register(file("b")).unwrap();

        let second = Registry::new();
        second.register(file("b")).unwrap();
        second.register(file("c")).unwrap();
        second.register(file("a")).unwrap();

        let names = |r: &Registry| -> Vec<String> {
            r.all().iter().map(|f| f.name().to_string()).collect()
        };
        assert_eq!(names(&first), vec!["a", "b", "c"]);
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn test_hyphenated_name_accepted() {
        let registry = Registry::new();
        registry.register(file("float4-misrounded-input")).unwrap();
        assert!(registry.get("float4-misrounded-input").is_some());
    }

    #[test]
    fn test_registry_usable_after_panic_while_locked() {
        let registry = Arc::new(Registry::new());
        registry.register(file("a")).unwrap();

        let poisoner = Arc::clone(&registry);
        let result = std::thread::spawn(move || {
            let _guard = poisoner.pending.lock();
            panic!("poison the lock");
        })
        .join();
        assert!(result.is_err());

        registry.register(file("b")).unwrap();
        assert_eq!(registry.len(), 2);
        registry.seal();
        assert!(registry.get("b").is_some());
    }

    #[test]
    fn test_sealed_registry_is_read_only() {
        let registry = Registry::new();
        registry.register(file("a")).unwrap();
        registry.seal();
        registry.seal();

        assert!(registry.is_sealed());
        assert_eq!(
            registry.register(file("b")),
            Err(RegistrationError::Sealed("b".into()))
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.get("a").is_some());
    }
}
