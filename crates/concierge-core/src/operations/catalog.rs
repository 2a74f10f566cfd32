//! Immutable operation catalog and the sources it is loaded from.

use super::definition::OperationDefinition;
use super::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where the active catalog came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CatalogOrigin {
    Primary(String),
    LocalFile(PathBuf),
    Empty,
}

/// Read-only set of operation definitions keyed by name.
#[derive(Debug, Clone)]
pub struct Catalog {
    definitions: HashMap<String, OperationDefinition>,
    origin: CatalogOrigin,
}

impl Catalog {
    pub fn empty() -> Self {
        Self {
            definitions: HashMap::new(),
            origin: CatalogOrigin::Empty,
        }
    }

    /// Builds a catalog, rejecting malformed or duplicated entries as a whole.
    pub fn from_definitions(
        definitions: Vec<OperationDefinition>,
        origin: CatalogOrigin,
    ) -> Result<Self, CatalogError> {
        let mut map = HashMap::with_capacity(definitions.len());
        for def in definitions {
            def.check()?;
            if map.contains_key(&def.name) {
                return Err(CatalogError::Duplicate(def.name));
            }
            map.insert(def.name.clone(), def);
        }
        Ok(Self {
            definitions: map,
            origin,
        })
    }

    pub fn get(&self, name: &str) -> Option<&OperationDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn origin(&self) -> &CatalogOrigin {
        &self.origin
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions sorted by name (for listings and planner prompts).
    pub fn definitions(&self) -> Vec<&OperationDefinition> {
        let mut defs: Vec<&OperationDefinition> = self.definitions.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty()
    }
}

/// Primary (external) source of operation definitions, e.g. a document store or remote endpoint.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable source name for logs and status.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<OperationDefinition>, CatalogError>;
}

/// Layout of the local declarative file: `{ "operations": [ ... ] }`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct CatalogDocument {
    #[serde(default)]
    pub(crate) operations: Vec<OperationDefinition>,
}

/// Reads the local fallback file. `Ok(None)` when the file does not exist.
pub(crate) async fn read_local_file(
    path: &Path,
) -> Result<Option<Vec<OperationDefinition>>, CatalogError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let doc: CatalogDocument = serde_json::from_slice(&bytes)?;
    Ok(Some(doc.operations))
}
