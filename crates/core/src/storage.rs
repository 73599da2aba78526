// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage backends for the batch buffer.
//!
//! Paths are relative, `/`-separated names such as `2025/07261455.csv`.
//! The buffer only needs a flat folder-of-files model: create a folder,
//! append to a file, list a folder, read a file back, remove a file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Folder-of-files storage used by [`crate::buffer::BatchBuffer`].
pub trait Storage {
    /// Returns true if a file or folder exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Creates the folder at `path` (parents included).
    fn create_dir(&mut self, path: &str) -> Result<()>;

    /// Appends `data` to the file at `path`, creating the file if missing.
    /// The parent folder must exist.
    fn append(&mut self, path: &str, data: &str) -> Result<()>;

    /// Reads the whole file at `path`.
    fn read_to_string(&self, path: &str) -> Result<String>;

    /// Lists the names of files (not folders) directly inside `path`.
    ///
    /// Returns an empty list if the folder does not exist.
    fn list_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Removes the file at `path`.
    fn remove(&mut self, path: &str) -> Result<()>;
}

/// Storage rooted at a directory on the local filesystem.
///
/// Appends are fsynced before returning.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Opens storage rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FsStorage { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Storage for FsStorage {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    fn append(&mut self, path: &str, data: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.resolve(path))?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn read_to_string(&self, path: &str) -> Result<String> {
        Ok(fs::read_to_string(self.resolve(path))?)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.resolve(path)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        fs::remove_file(self.resolve(path))?;
        Ok(())
    }
}

/// In-memory storage. Contents are lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, String>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

impl Storage for MemStorage {
    fn exists(&self, path: &str) -> bool {
        self.dirs.contains(path) || self.files.contains_key(path)
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
        Ok(())
    }

    fn append(&mut self, path: &str, data: &str) -> Result<()> {
        let parent = parent_of(path);
        if !parent.is_empty() && !self.dirs.contains(parent) {
            return Err(Error::Storage(format!("no such folder: {parent}")));
        }
        self.files.entry(path.to_string()).or_default().push_str(data);
        Ok(())
    }

    fn read_to_string(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("no such file: {path}")))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter(|name| parent_of(name) == path)
            .map(|name| name.rsplit('/').next().unwrap_or(name).to_string())
            .collect())
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::Storage(format!("no such file: {path}")))
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
