//! Operation registry: the loaded catalog plus the table of bound actions.
//!
//! Load order: primary source (if any) → local declarative file → empty catalog.
//! A source that fails, returns nothing, or holds a malformed entry is skipped as a whole;
//! catalogs are never merged. Reload builds a fresh catalog and swaps the shared pointer
//! in one assignment, so readers see either the old or the new catalog in full.

use super::action::{ActionTable, OperationAction};
use super::catalog::{read_local_file, Catalog, CatalogOrigin, CatalogSource};
use super::definition::{OperationDefinition, Parameters};
use super::error::OperationError;
use super::validator::{validate, ValidationOutcome};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

pub struct OperationRegistry {
    catalog: RwLock<Arc<Catalog>>,
    actions: ActionTable,
    primary: Option<Arc<dyn CatalogSource>>,
    fallback_path: Option<PathBuf>,
}

impl OperationRegistry {
    /// Registry with no sources; starts with an empty catalog until [`load`](Self::load) or
    /// [`with_catalog`](Self::with_catalog) is used.
    pub fn new(actions: ActionTable) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(Catalog::empty())),
            actions,
            primary: None,
            fallback_path: None,
        }
    }

    /// Registry over a fixed, already-built catalog.
    pub fn with_catalog(catalog: Catalog, actions: ActionTable) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            ..Self::new(actions)
        }
    }

    pub fn with_primary(mut self, source: Arc<dyn CatalogSource>) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_fallback_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_path = Some(path.into());
        self
    }

    /// Loads the catalog from the configured sources and installs it. Never fails:
    /// when no source yields a usable catalog the result is empty.
    pub async fn load(&self) -> Arc<Catalog> {
        let catalog = Arc::new(self.build_catalog().await);
        tracing::info!(
            target: "concierge::registry",
            origin = ?catalog.origin(),
            operations = catalog.len(),
            "Operation catalog installed"
        );
        match self.catalog.write() {
            Ok(mut slot) => *slot = Arc::clone(&catalog),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&catalog),
        }
        catalog
    }

    /// Same as [`load`](Self::load); named for the reload trigger.
    pub async fn reload(&self) -> Arc<Catalog> {
        self.load().await
    }

    async fn build_catalog(&self) -> Catalog {
        if let Some(source) = &self.primary {
            let label = source.describe();
            match source.fetch().await {
                Ok(defs) if defs.is_empty() => {
                    tracing::info!(
                        target: "concierge::registry",
                        source = %label,
                        "No operations in primary source, using local fallback"
                    );
                }
                Ok(defs) => match Catalog::from_definitions(defs, CatalogOrigin::Primary(label.clone())) {
                    Ok(catalog) => return catalog,
                    Err(e) => tracing::error!(
                        target: "concierge::registry",
                        source = %label,
                        error = %e,
                        "Primary catalog rejected"
                    ),
                },
                Err(e) => tracing::warn!(
                    target: "concierge::registry",
                    source = %label,
                    error = %e,
                    "Primary catalog source failed, using local fallback"
                ),
            }
        }

        let Some(path) = &self.fallback_path else {
            return Catalog::empty();
        };
        match read_local_file(path).await {
            Ok(Some(defs)) => {
                match Catalog::from_definitions(defs, CatalogOrigin::LocalFile(path.clone())) {
                    Ok(catalog) => catalog,
                    Err(e) => {
                        tracing::error!(
                            target: "concierge::registry",
                            path = %path.display(),
                            error = %e,
                            "Local catalog rejected, using empty catalog"
                        );
                        Catalog::empty()
                    }
                }
            }
            Ok(None) => {
                tracing::warn!(
                    target: "concierge::registry",
                    path = %path.display(),
                    "Local catalog not found, using empty catalog"
                );
                Catalog::empty()
            }
            Err(e) => {
                tracing::error!(
                    target: "concierge::registry",
                    path = %path.display(),
                    error = %e,
                    "Local catalog unreadable, using empty catalog"
                );
                Catalog::empty()
            }
        }
    }

    /// Snapshot of the active catalog. Hold it for the duration of one batch.
    pub fn catalog(&self) -> Arc<Catalog> {
        match self.catalog.read() {
            Ok(slot) => Arc::clone(&slot),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<OperationDefinition> {
        self.catalog().get(name).cloned()
    }

    /// The bound action for `name`. Distinguishes unknown names from catalogued-but-unbound ones.
    pub fn resolve_callable(&self, name: &str) -> Result<Arc<dyn OperationAction>, OperationError> {
        resolve_in(&self.catalog(), &self.actions, name)
    }

    pub fn validate(&self, name: &str, parameters: &Parameters) -> ValidationOutcome {
        validate(&self.catalog(), name, parameters)
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }
}

pub(crate) fn resolve_in(
    catalog: &Catalog,
    actions: &ActionTable,
    name: &str,
) -> Result<Arc<dyn OperationAction>, OperationError> {
    if !catalog.contains(name) {
        return Err(OperationError::UnknownOperation(name.to_string()));
    }
    actions
        .get(name)
        .ok_or_else(|| OperationError::Unavailable(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::action::{ActionOutput, SyncAction};
    use crate::operations::error::CatalogError;

    struct FailingSource;

    #[async_trait::async_trait]
    impl CatalogSource for FailingSource {
        fn describe(&self) -> String {
            "failing".to_string()
        }

        async fn fetch(&self) -> Result<Vec<OperationDefinition>, CatalogError> {
            Err(CatalogError::Source {
                source_name: "failing".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    struct FixedSource(Vec<OperationDefinition>);

    #[async_trait::async_trait]
    impl CatalogSource for FixedSource {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        async fn fetch(&self) -> Result<Vec<OperationDefinition>, CatalogError> {
            Ok(self.0.clone())
        }
    }

    fn write_fallback(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("operations.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "operations": [
                    { "name": "create_task", "required_parameters": ["title"], "optional_parameters": ["due"], "description": "Add a task" },
                    { "name": "opX", "required_parameters": [], "optional_parameters": [], "description": "Only in the file" }
                ]
            })
            .to_string(),
        )
        .unwrap();
        path
    }

    fn bound(names: &[&str]) -> ActionTable {
        names.iter().fold(ActionTable::new(), |table, name| {
            table.bind(
                *name,
                Arc::new(SyncAction::new(|_: &Parameters| Ok(ActionOutput::ok("done")))),
            )
        })
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_to_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fallback(&dir);
        let registry = OperationRegistry::new(ActionTable::new())
            .with_primary(Arc::new(FailingSource))
            .with_fallback_file(&path);

        let catalog = registry.load().await;
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.origin(), &CatalogOrigin::LocalFile(path));
        let def = registry.lookup("opX").unwrap();
        assert_eq!(def.description, "Only in the file");
    }

    #[tokio::test]
    async fn test_primary_wins_without_merging() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fallback(&dir);
        let registry = OperationRegistry::new(ActionTable::new())
            .with_primary(Arc::new(FixedSource(vec![
                OperationDefinition::new("send_email").required(["to", "subject", "body"]),
            ])))
            .with_fallback_file(&path);

        let catalog = registry.load().await;
        assert_eq!(catalog.origin(), &CatalogOrigin::Primary("fixed".to_string()));
        assert!(registry.lookup("send_email").is_some());
        assert!(registry.lookup("opX").is_none());
    }

    #[tokio::test]
    async fn test_empty_primary_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fallback(&dir);
        let registry = OperationRegistry::new(ActionTable::new())
            .with_primary(Arc::new(FixedSource(Vec::new())))
            .with_fallback_file(&path);
        assert_eq!(registry.load().await.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_primary_entry_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fallback(&dir);
        let registry = OperationRegistry::new(ActionTable::new())
            .with_primary(Arc::new(FixedSource(vec![
                OperationDefinition::new("send_email").required(["to"]).optional(["to"]),
            ])))
            .with_fallback_file(&path);
        let catalog = registry.load().await;
        assert!(matches!(catalog.origin(), CatalogOrigin::LocalFile(_)));
    }

    #[tokio::test]
    async fn test_no_sources_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let registry = OperationRegistry::new(ActionTable::new())
            .with_primary(Arc::new(FailingSource))
            .with_fallback_file(dir.path().join("absent.json"));
        let catalog = registry.load().await;
        assert!(catalog.is_empty());
        assert_eq!(catalog.origin(), &CatalogOrigin::Empty);
        assert!(matches!(
            registry.resolve_callable("create_task"),
            Err(OperationError::UnknownOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_local_file_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operations.json");
        std::fs::write(&path, "{ not json").unwrap();
        let registry = OperationRegistry::new(ActionTable::new()).with_fallback_file(&path);
        assert!(registry.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_callable_distinguishes_unbound() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fallback(&dir);
        let registry =
            OperationRegistry::new(bound(&["create_task"])).with_fallback_file(&path);
        registry.load().await;

        assert!(registry.resolve_callable("create_task").is_ok());
        assert!(matches!(
            registry.resolve_callable("opX"),
            Err(OperationError::Unavailable(name)) if name == "opX"
        ));
        assert!(matches!(
            registry.resolve_callable("nope"),
            Err(OperationError::UnknownOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_swaps_whole_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fallback(&dir);
        let registry = OperationRegistry::new(ActionTable::new()).with_fallback_file(&path);
        let before = registry.load().await;
        assert_eq!(before.len(), 2);

        std::fs::write(
            &path,
            r#"{ "operations": [ { "name": "get_time" } ] }"#,
        )
        .unwrap();
        let after = registry.reload().await;

        // Snapshots taken before the reload stay intact.
        assert_eq!(before.len(), 2);
        assert!(before.contains("create_task"));
        assert_eq!(after.len(), 1);
        assert!(registry.lookup("create_task").is_none());
        assert!(registry.lookup("get_time").is_some());
    }
}
