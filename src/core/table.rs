//! File reference table

use crate::core::file::{FileEntity, FileKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Every file and directory entity of one pipeline, keyed by id.
///
/// Iteration follows declaration order.
#[derive(Debug, Clone, Default)]
pub struct FileTable {
    entities: Vec<FileEntity>,
    index: HashMap<String, usize>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, returning it back if the id is already taken
    pub fn insert(&mut self, entity: FileEntity) -> Result<(), FileEntity> {
        if self.index.contains_key(&entity.id) {
            return Err(entity);
        }
        self.index.insert(entity.id.clone(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&FileEntity> {
        self.index.get(id).map(|&i| &self.entities[i])
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut FileEntity> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.entities[i]),
            None => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Resolved path of an entity
    pub fn path(&self, id: &str) -> Option<&Path> {
        self.get(id).and_then(|f| f.path())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntity> {
        self.entities.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileEntity> {
        self.entities.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|f| f.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The first declared output directory entity, if any
    pub fn output_dir_entity(&self) -> Option<&FileEntity> {
        self.entities.iter().find(|f| f.kind == FileKind::OutputDir)
    }

    /// Where logs and temp files go: the output directory, or `.` when none is declared
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir_entity()
            .and_then(|f| f.path())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Map of id to resolved path for every resolved entity
    pub fn resolved_paths(&self) -> HashMap<String, PathBuf> {
        self.entities
            .iter()
            .filter_map(|f| f.path().map(|p| (f.id.clone(), p.to_path_buf())))
            .collect()
    }
}
