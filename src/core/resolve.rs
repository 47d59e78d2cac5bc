//! File resolution engine
//!
//! Turns the declarative path rules of a [`FileTable`] into concrete paths.
//! The passes run in a fixed order because later passes read paths assigned
//! by earlier ones:
//!
//! 1. declared and positional paths
//! 2. temp file allocation under the output directory
//! 3. `based_on` derivation
//! 4. `in_dir` containment
//!
//! Passes 3 and 4 visit entities in dependency order, so chains such as a
//! file derived from a derived file resolve regardless of declaration order.
//!
//! When temp files exist and the output directory itself sits `in_dir`
//! another directory, that chain is placed before pass 2 so temp files are
//! created in the final output directory.

use crate::core::error::{PipelineError, Result};
use crate::core::file::{FileKind, PathSource};
use crate::core::table::FileTable;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run all four resolution passes over the table
pub fn resolve(table: &mut FileTable, args: &[String]) -> Result<()> {
    fixup_positional(table, args)?;
    let settled = settle_output_dir(table)?;
    allocate_temp_files(table)?;
    apply_based_on(table)?;
    apply_in_dir(table, &settled)?;

    info!("Resolved {} file entities", table.len());
    Ok(())
}

/// Apply a `based_on` substitution to a source path
pub fn derive_path(source: &Path, pattern: &Regex, replace: &str) -> PathBuf {
    let source = source.to_string_lossy();
    PathBuf::from(pattern.replace_all(&source, replace).into_owned())
}

/// Pass 1: declared paths and command line arguments.
///
/// The argument count is checked before anything is assigned.
fn fixup_positional(table: &mut FileTable, args: &[String]) -> Result<()> {
    let mut required = 0;
    for file in table.iter() {
        if let PathSource::Positional(index) = file.source {
            if index == 0 {
                return Err(PipelineError::malformed(format!(
                    "positional index of '{}' must start at 1",
                    file.id
                )));
            }
            required = required.max(index);
        }
    }

    if required > args.len() {
        return Err(PipelineError::InsufficientArguments {
            required,
            supplied: args.len(),
        });
    }

    for file in table.iter_mut() {
        let path = match &file.source {
            PathSource::Literal(path) => path.clone(),
            PathSource::Positional(index) => PathBuf::from(&args[*index - 1]),
            _ => continue,
        };
        debug!("{} -> {}", file.id, path.display());
        file.set_path(path);
    }

    Ok(())
}

/// Place the output directory and the directories above it before pass 2.
///
/// Returns the ids whose `in_dir` has already been applied. Nothing is
/// settled when there are no temp files or the output directory is derived.
fn settle_output_dir(table: &mut FileTable) -> Result<HashSet<String>> {
    let mut settled = HashSet::new();
    if !table.iter().any(|f| f.is_temp()) {
        return Ok(settled);
    }
    let mut next = match table.output_dir_entity() {
        Some(out) if out.in_dir.is_some() && out.is_resolved() => Some(out.id.clone()),
        _ => return Ok(settled),
    };

    // output dir first, outermost directory last
    let mut chain: Vec<String> = Vec::new();
    while let Some(id) = next.take() {
        let child = chain.last().map(String::as_str).unwrap_or_default();
        if chain.contains(&id) {
            return Err(PipelineError::malformed(format!(
                "cycle in in_dir references involving '{}'",
                id
            )));
        }
        let file = table.get(&id).ok_or_else(|| {
            PipelineError::malformed(format!("in_dir of '{}' refers to unknown file '{}'", child, id))
        })?;
        if !chain.is_empty() {
            if !file.kind.is_dir() {
                return Err(PipelineError::malformed(format!(
                    "in_dir of '{}' refers to '{}', which is not a directory",
                    child, id
                )));
            }
            if !file.is_resolved() {
                return Err(PipelineError::UnresolvedReference {
                    id: child.to_string(),
                    reference: id.clone(),
                });
            }
        }
        next = file.in_dir.clone();
        chain.push(id);
    }

    for pair in chain.windows(2).rev() {
        let (child, dir) = (&pair[0], &pair[1]);
        let dir_path = table.path(dir).map(Path::to_path_buf).unwrap_or_default();
        if let Some(file) = table.get_mut(child) {
            let path = contained_path(&dir_path, file.path().unwrap_or(Path::new("")), false);
            debug!("{} -> {} (in_dir {}, before temp allocation)", child, path.display(), dir);
            file.set_path(path);
        }
        settled.insert(child.clone());
    }

    Ok(settled)
}

/// Pass 2: give every temp file a unique name under the output directory
fn allocate_temp_files(table: &mut FileTable) -> Result<()> {
    let first_temp = match table.iter().find(|f| f.is_temp()) {
        Some(file) => file.id.clone(),
        None => return Ok(()),
    };

    if let Some(out) = table.output_dir_entity() {
        if !out.is_resolved() {
            return Err(PipelineError::UnresolvedReference {
                id: first_temp,
                reference: out.id.clone(),
            });
        }
    }

    let dir = table.output_dir();
    std::fs::create_dir_all(&dir).map_err(|e| {
        PipelineError::io(format!("Failed to create output directory {}", dir.display()), e)
    })?;

    for file in table.iter_mut().filter(|f| f.is_temp()) {
        if file.is_resolved() {
            return Err(PipelineError::malformed(format!(
                "temp file '{}' already has a path",
                file.id
            )));
        }

        let prefix = format!("{}_", file.id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        if let Some(suffix) = &file.suffix {
            builder.suffix(suffix);
        }

        let context = format!("Failed to create temp file for '{}' in {}", file.id, dir.display());
        let temp = builder
            .tempfile_in(&dir)
            .map_err(|e| PipelineError::io(context.clone(), e))?;
        let path = temp
            .into_temp_path()
            .keep()
            .map_err(|e| PipelineError::io(context, e.error))?;

        debug!("{} -> {} (temp)", file.id, path.display());
        file.set_path(path);
    }

    Ok(())
}

/// Pass 3: derive paths from other entities' paths
fn apply_based_on(table: &mut FileTable) -> Result<()> {
    let edges: Vec<(String, String)> = table
        .iter()
        .filter_map(|f| f.based_on().map(|source| (f.id.clone(), source.to_string())))
        .collect();

    for id in dependency_order(&edges, "based_on")? {
        let (source, pattern, replace) = match table.get(&id).map(|f| &f.source) {
            Some(PathSource::BasedOn { source, pattern, replace }) => {
                (source.clone(), pattern.clone(), replace.clone())
            }
            _ => continue,
        };

        let source_file = table.get(&source).ok_or_else(|| {
            PipelineError::malformed(format!("'{}' is based_on unknown file '{}'", id, source))
        })?;
        let source_path = source_file
            .path()
            .ok_or_else(|| PipelineError::UnresolvedReference {
                id: id.clone(),
                reference: source.clone(),
            })?;

        let path = derive_path(source_path, &pattern, &replace);
        debug!("{} -> {} (based_on {})", id, path.display(), source);
        if let Some(file) = table.get_mut(&id) {
            file.set_path(path);
        }
    }

    Ok(())
}

/// Pass 4: place entities inside their `in_dir` directory.
///
/// A temp file keeps its generated name and is moved out of the output
/// directory into the new one.
fn apply_in_dir(table: &mut FileTable, settled: &HashSet<String>) -> Result<()> {
    let edges: Vec<(String, String)> = table
        .iter()
        .filter_map(|f| f.in_dir.as_ref().map(|dir| (f.id.clone(), dir.clone())))
        .collect();
    let parents: HashMap<&str, &str> = edges
        .iter()
        .map(|(child, dir)| (child.as_str(), dir.as_str()))
        .collect();

    for id in dependency_order(&edges, "in_dir")? {
        if settled.contains(&id) {
            continue;
        }
        let dir_id = parents[id.as_str()];
        let dir = table.get(dir_id).ok_or_else(|| {
            PipelineError::malformed(format!("in_dir of '{}' refers to unknown file '{}'", id, dir_id))
        })?;
        if !dir.kind.is_dir() {
            return Err(PipelineError::malformed(format!(
                "in_dir of '{}' refers to '{}', which is not a directory",
                id, dir_id
            )));
        }
        let dir_path = dir
            .path()
            .ok_or_else(|| PipelineError::UnresolvedReference {
                id: id.clone(),
                reference: dir_id.to_string(),
            })?
            .to_path_buf();
        let create_dir = dir.kind == FileKind::OutputDir;

        if let Some(file) = table.get_mut(&id) {
            let own = file.path().ok_or_else(|| PipelineError::UnresolvedReference {
                id: id.clone(),
                reference: id.clone(),
            })?;
            let path = contained_path(&dir_path, own, file.is_temp());
            if file.is_temp() {
                relocate_temp(&id, own, &path, create_dir)?;
            }
            debug!("{} -> {} (in_dir {})", id, path.display(), dir_id);
            file.set_path(path);
        }
    }

    Ok(())
}

/// Create a temp file at its contained path and drop the placeholder.
///
/// The new file is created exclusively so the name stays unique in its
/// final directory.
fn relocate_temp(id: &str, from: &Path, to: &Path, create_dir: bool) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if create_dir {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::io(format!("Failed to create directory {}", parent.display()), e)
            })?;
        }
    }

    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(|e| {
            PipelineError::io(format!("Failed to create temp file for '{}' at {}", id, to.display()), e)
        })?;
    std::fs::remove_file(from).map_err(|e| {
        PipelineError::io(format!("Failed to remove temp placeholder {}", from.display()), e)
    })?;
    Ok(())
}

/// Join a child path under a directory.
///
/// Absolute and generated paths contribute only their file name.
fn contained_path(dir: &Path, child: &Path, generated: bool) -> PathBuf {
    if generated || child.has_root() {
        match child.file_name() {
            Some(name) => dir.join(name),
            None => dir.to_path_buf(),
        }
    } else {
        dir.join(child)
    }
}

/// Order the children of `child -> parent` edges so that a child whose
/// parent is itself a child comes after that parent.
fn dependency_order(edges: &[(String, String)], relation: &str) -> Result<Vec<String>> {
    let parents: HashMap<&str, &str> = edges
        .iter()
        .map(|(child, parent)| (child.as_str(), parent.as_str()))
        .collect();

    let mut result = Vec::new();
    let mut visited = HashSet::new();
    let mut in_progress = HashSet::new();

    for (child, _) in edges {
        visit(child, &parents, &mut visited, &mut in_progress, &mut result, relation)?;
    }

    Ok(result)
}

fn visit<'a>(
    id: &'a str,
    parents: &HashMap<&'a str, &'a str>,
    visited: &mut HashSet<&'a str>,
    in_progress: &mut HashSet<&'a str>,
    result: &mut Vec<String>,
    relation: &str,
) -> Result<()> {
    if visited.contains(id) {
        return Ok(());
    }
    if !in_progress.insert(id) {
        return Err(PipelineError::malformed(format!(
            "cycle in {} references involving '{}'",
            relation, id
        )));
    }

    if let Some(&parent) = parents.get(id) {
        if parents.contains_key(parent) {
            visit(parent, parents, visited, in_progress, result, relation)?;
        }
    }

    in_progress.remove(id);
    visited.insert(id);
    result.push(id.to_string());
    Ok(())
}
