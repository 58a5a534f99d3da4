//! Annotation persistence.
//!
//! The engine only needs "all records of a document" and "replace all records
//! of a document". Every save is a single read-modify-write through
//! [`AnnotationStore::set`].

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::annotation::{Annotation, StoredAnnotation, normalize_identity};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid annotation data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keyed storage of annotations per document identity.
pub trait AnnotationStore {
    /// Records of one document, in insertion order. Unknown documents yield
    /// an empty list.
    fn get(&self, identity: &str) -> Result<Vec<Annotation>, StoreError>;

    /// Replace every record of one document.
    fn set(&mut self, identity: &str, annotations: Vec<Annotation>) -> Result<(), StoreError>;
}

/// Volatile store, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<Annotation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnnotationStore for MemoryStore {
    fn get(&self, identity: &str) -> Result<Vec<Annotation>, StoreError> {
        Ok(self
            .entries
            .get(&normalize_identity(identity))
            .cloned()
            .unwrap_or_default())
    }

    fn set(&mut self, identity: &str, annotations: Vec<Annotation>) -> Result<(), StoreError> {
        self.entries.insert(normalize_identity(identity), annotations);
        Ok(())
    }
}

/// One JSON file holding an object that maps identities to record arrays.
///
/// The file is read on every `get` and rewritten on every `set`, so several
/// processes can share it as long as they do not write concurrently.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

type FileLayout = BTreeMap<String, Vec<StoredAnnotation>>;

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<FileLayout, StoreError> {
        if !self.path.exists() {
            return Ok(FileLayout::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(FileLayout::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// All identities with at least one record.
    pub fn identities(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(identity, _)| identity)
            .collect())
    }
}

impl AnnotationStore for JsonFileStore {
    fn get(&self, identity: &str) -> Result<Vec<Annotation>, StoreError> {
        let mut all = self.read_all()?;
        let records = all.remove(&normalize_identity(identity)).unwrap_or_default();
        Ok(records.into_iter().map(StoredAnnotation::upgrade).collect())
    }

    fn set(&mut self, identity: &str, annotations: Vec<Annotation>) -> Result<(), StoreError> {
        let mut all = self.read_all()?;
        let identity = normalize_identity(identity);
        if annotations.is_empty() {
            all.remove(&identity);
        } else {
            all.insert(
                identity,
                annotations.into_iter().map(StoredAnnotation::Current).collect(),
            );
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        log::debug!("wrote annotation store {}", self.path.display());
        Ok(())
    }
}
