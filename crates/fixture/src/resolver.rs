// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Dependency resolution
//!
//! Turns a requested file into an execution plan: every transitive dependency
//! first, in declaration order, each file exactly once, the requested file
//! last. Resolution either yields a complete plan or an error; there are no
//! partial plans.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ResolutionError, ResolveResult};
use crate::file::{FileName, RegressionFile};
use crate::registry::Registry;

/// Anything files can be looked up from by name
pub trait FileSource {
    fn get_file(&self, name: &FileName) -> Option<Arc<RegressionFile>>;
}

impl FileSource for Registry {
    fn get_file(&self, name: &FileName) -> Option<Arc<RegressionFile>> {
        self.get(name.as_str())
    }
}

impl FileSource for HashMap<FileName, Arc<RegressionFile>> {
    fn get_file(&self, name: &FileName) -> Option<Arc<RegressionFile>> {
        self.get(name).cloned()
    }
}

/// A file of an execution plan
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub file: Arc<RegressionFile>,
    /// `true` unless the file was one of the requested names
    pub is_dependency: bool,
}

impl ResolvedFile {
    pub fn name(&self) -> &FileName {
        self.file.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Walk<'a, S: ?Sized> {
    source: &'a S,
    marks: HashMap<FileName, Mark>,
    /// Names currently being visited, outermost first
    stack: Vec<FileName>,
    order: Vec<Arc<RegressionFile>>,
}

impl<'a, S: FileSource + ?Sized> Walk<'a, S> {
    fn new(source: &'a S) -> Self {
        Self {
            source,
            marks: HashMap::new(),
            stack: Vec::new(),
            order: Vec::new(),
        }
    }

    fn visit(&mut self, name: &FileName, required_by: Option<&FileName>) -> ResolveResult<()> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self
                    .stack
                    .iter()
                    .position(|n| n == name)
                    .unwrap_or_default();
                let mut cycle = self.stack[start..].to_vec();
                cycle.push(name.clone());
                return Err(ResolutionError::CyclicDependency { cycle });
            }
            None => {}
        }

        let file = self
            .source
            .get_file(name)
            .ok_or_else(|| ResolutionError::NotFound {
                name: name.clone(),
                required_by: required_by.cloned(),
            })?;

        self.marks.insert(name.clone(), Mark::Visiting);
        self.stack.push(name.clone());

        for dependency in file.depends_on() {
            self.visit(dependency, Some(name))?;
        }

        self.stack.pop();
        self.marks.insert(name.clone(), Mark::Done);
        self.order.push(file);
        Ok(())
    }
}

/// Resolve the execution order for a single file
///
/// # Errors
///
/// Returns `ResolutionError::NotFound` if the file or any transitive
/// dependency is missing, and `ResolutionError::CyclicDependency` if the
/// dependency graph reachable from it has a cycle.
pub fn resolve<S>(source: &S, name: &FileName) -> ResolveResult<Vec<Arc<RegressionFile>>>
where
    S: FileSource + ?Sized,
{
    let mut walk = Walk::new(source);
    walk.visit(name, None)?;
    Ok(walk.order)
}

/// Resolve a combined plan for several files
///
/// Files shared between the requested names run once. A requested file that is
/// also a dependency of an earlier requested file is not re-run, but it is
/// still reported as requested.
pub fn resolve_plan<S>(source: &S, names: &[FileName]) -> ResolveResult<Vec<ResolvedFile>>
where
    S: FileSource + ?Sized,
{
    let mut walk = Walk::new(source);
    for name in names {
        walk.visit(name, None)?;
    }

    let plan: Vec<ResolvedFile> = walk
        .order
        .into_iter()
        .map(|file| {
            let is_dependency = !names.contains(file.name());
            ResolvedFile {
                file,
                is_dependency,
            }
        })
        .collect();

    tracing::debug!(
        requested = names.len(),
        files = plan.len(),
        plan = ?plan.iter().map(|f| f.name().as_str()).collect::<Vec<_>>(),
        "resolved execution plan"
    );
    Ok(plan)
}
