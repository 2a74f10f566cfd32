//! Sled-backed operation catalog store: one tree, key = operation name, value = JSON entry.

use super::catalog::CatalogSource;
use super::definition::OperationDefinition;
use super::error::CatalogError;
use sled::{Db, Tree};
use std::path::Path;

const TREE_NAME: &str = "operations";

/// Document store holding operation definitions. Serves as the primary catalog source.
pub struct SledCatalogStore {
    _db: Db,
    tree: Tree,
    label: String,
}

impl SledCatalogStore {
    /// Opens or creates the store at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let label = format!("sled:{}", path.as_ref().display());
        let db = sled::open(path)?;
        let tree = db.open_tree(TREE_NAME)?;
        Ok(Self {
            _db: db,
            tree,
            label,
        })
    }

    /// Adds or replaces one definition.
    pub fn put(&self, definition: &OperationDefinition) -> Result<(), CatalogError> {
        definition.check()?;
        let value = serde_json::to_vec(definition)?;
        self.tree.insert(definition.name.as_bytes(), value)?;
        self.tree.flush()?;
        Ok(())
    }

    /// Removes a definition; returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool, CatalogError> {
        let existed = self.tree.remove(name.as_bytes())?.is_some();
        self.tree.flush()?;
        Ok(existed)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn read_all(&self) -> Result<Vec<OperationDefinition>, CatalogError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_key, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl CatalogSource for SledCatalogStore {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn fetch(&self) -> Result<Vec<OperationDefinition>, CatalogError> {
        self.read_all()
    }
}
