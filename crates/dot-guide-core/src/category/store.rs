//! Configuration Store
//!
//! Readers get immutable `Arc` snapshots and never take the write lock.
//! Writers go through `ProjectStore::update`, which validates the new
//! definitions, persists them atomically and then swaps the snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use super::model::{Category, Collection};
use crate::error::{GuideError, Result};
use crate::session::ProjectInfo;

/// Default project file name
pub const PROJECT_FILE: &str = "guide.toml";

/// Read access to category and collection definitions.
pub trait ContentStore: Send + Sync {
    fn get_category(&self, name: &str) -> Option<Category>;
    fn get_collection(&self, name: &str) -> Option<Collection>;
    fn list_category_names(&self) -> Vec<String>;
    fn list_collection_names(&self) -> Vec<String>;
    fn docroot_path(&self) -> PathBuf;
}

/// Hands out one consistent view of the store per request.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Arc<StoreSnapshot>;
}

/// Immutable view of the store's definitions.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    docroot: PathBuf,
    project: Option<ProjectInfo>,
    categories: BTreeMap<String, Category>,
    collections: BTreeMap<String, Collection>,
}

impl StoreSnapshot {
    pub fn new(docroot: impl Into<PathBuf>) -> Self {
        Self {
            docroot: docroot.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.insert(category.name.clone(), category);
        self
    }

    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    pub fn with_project(mut self, project: ProjectInfo) -> Self {
        self.project = Some(project);
        self
    }

    pub fn project(&self) -> Option<&ProjectInfo> {
        self.project.as_ref()
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    /// Validate every definition.
    ///
    /// Collection cycles are not checked here; expansion detects them.
    pub fn validate(&self) -> Result<()> {
        for category in self.categories.values() {
            category.validate()?;
        }
        for collection in self.collections.values() {
            collection.validate()?;
        }
        Ok(())
    }

    fn from_file(file: &ProjectFile, base_dir: &Path) -> Result<Self> {
        let docroot = base_dir.join(&file.docroot);
        // Canonical docroot keeps the later prefix checks honest.
        let docroot = docroot.canonicalize().unwrap_or(docroot);

        let categories = file
            .categories
            .iter()
            .map(|(name, entry)| {
                let category = Category {
                    name: name.clone(),
                    dir: entry.dir.clone(),
                    patterns: entry.patterns.clone(),
                    description: entry.description.clone(),
                };
                (name.clone(), category)
            })
            .collect();

        let collections = file
            .collections
            .iter()
            .map(|(name, entry)| {
                let collection = Collection {
                    name: name.clone(),
                    categories: entry.categories.clone(),
                    description: entry.description.clone(),
                    patterns: entry.patterns.clone(),
                };
                (name.clone(), collection)
            })
            .collect();

        let snapshot = Self {
            docroot,
            project: file.project.clone(),
            categories,
            collections,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl ContentStore for StoreSnapshot {
    fn get_category(&self, name: &str) -> Option<Category> {
        self.categories.get(name).cloned()
    }

    fn get_collection(&self, name: &str) -> Option<Collection> {
        self.collections.get(name).cloned()
    }

    fn list_category_names(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    fn list_collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    fn docroot_path(&self) -> PathBuf {
        self.docroot.clone()
    }
}

impl SnapshotSource for Arc<StoreSnapshot> {
    fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(self)
    }
}

/// On-disk project file (`guide.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Docroot relative to the project file's directory
    #[serde(default = "default_docroot")]
    pub docroot: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectInfo>,

    #[serde(default)]
    pub categories: BTreeMap<String, CategoryEntry>,

    #[serde(default)]
    pub collections: BTreeMap<String, CollectionEntry>,
}

impl Default for ProjectFile {
    fn default() -> Self {
        Self {
            docroot: default_docroot(),
            project: None,
            categories: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }
}

fn default_docroot() -> String {
    ".".to_string()
}

/// `[categories.<name>]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub dir: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `[collections.<name>]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// File-backed store with lock-free snapshot reads.
pub struct ProjectStore {
    path: PathBuf,
    file: Mutex<ProjectFile>,
    current: RwLock<Arc<StoreSnapshot>>,
}

impl ProjectStore {
    /// Load a project file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let file = read_project_file(path)?;
        let snapshot = StoreSnapshot::from_file(&file, base_dir_of(path))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a change, validate it, persist it atomically and publish it.
    ///
    /// Nothing is written or published when validation fails.
    pub fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut ProjectFile),
    {
        let mut guard = self.file.lock().map_err(|_| poisoned(&self.path))?;
        let mut next = guard.clone();
        change(&mut next);

        let snapshot = StoreSnapshot::from_file(&next, base_dir_of(&self.path))?;
        write_atomically(&self.path, &toml::to_string_pretty(&next)?)?;

        *guard = next;
        self.swap(snapshot)
    }

    fn swap(&self, snapshot: StoreSnapshot) -> Result<()> {
        let mut current = self.current.write().map_err(|_| poisoned(&self.path))?;
        *current = Arc::new(snapshot);
        Ok(())
    }
}

impl SnapshotSource for ProjectStore {
    fn snapshot(&self) -> Arc<StoreSnapshot> {
        match self.current.read() {
            Ok(current) => Arc::clone(&current),
            // A panicked writer never stores a half-built snapshot.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

fn base_dir_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn read_project_file(path: &Path) -> Result<ProjectFile> {
    if !path.exists() {
        return Ok(ProjectFile::default());
    }
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| GuideError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let dir = base_dir_of(path);
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| GuideError::Io(e.error))?;
    Ok(())
}

fn poisoned(path: &Path) -> GuideError {
    GuideError::Io(std::io::Error::other(format!(
        "store lock poisoned for {}",
        path.display()
    )))
}
