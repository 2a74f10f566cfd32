//! Wires config into a ready-to-serve pipeline. Shared by the gateway and the daemon.

use crate::actions::{builtin_actions, BuiltinServices, Outbox, Sandbox, TaskBoard};
use crate::classifier::KeywordClassifier;
use crate::desktop::{DesktopAutomation, DryRunDesktop};
use crate::extractor::{LlmParameterExtractor, RuleBasedExtractor};
use crate::handlers::{discovered_handlers, handler_factories};
use crate::http_catalog::HttpCatalogSource;
use crate::model_router::ModelRouter;
use crate::planner::{KeywordPlanner, LlmPlanner};
use concierge_core::{
    CatalogSource, CommandPipeline, CoreConfig, HandlerChain, HandlerChainBuilder,
    OperationExecutor, OperationPlanner, OperationRegistry, ParameterExtractor, SledCatalogStore,
    SnapshotContext,
};
use std::sync::Arc;

/// Everything a front end needs: the pipeline plus handles for status and admin routes.
pub struct Runtime {
    pub config: CoreConfig,
    pub registry: Arc<OperationRegistry>,
    pub pipeline: Arc<CommandPipeline>,
    pub context: Arc<SnapshotContext>,
    pub services: BuiltinServices,
    pub desktop: Arc<dyn DesktopAutomation>,
}

impl Runtime {
    /// Builds the runtime with the dry-run desktop and loads the catalog.
    pub async fn start(config: CoreConfig) -> Self {
        Self::start_with_desktop(config, Arc::new(DryRunDesktop::new())).await
    }

    pub async fn start_with_desktop(config: CoreConfig, desktop: Arc<dyn DesktopAutomation>) -> Self {
        let router = Arc::new(ModelRouter::from_config(&config));
        let services = BuiltinServices {
            tasks: Arc::new(TaskBoard::new()),
            sandbox: Arc::new(Sandbox::new(&config.sandbox_path)),
            outbox: Arc::new(Outbox::new()),
            router: Arc::clone(&router),
        };

        let mut registry = OperationRegistry::new(builtin_actions(&services))
            .with_fallback_file(&config.catalog_path);
        if let Some(primary) = primary_source(&config) {
            registry = registry.with_primary(primary);
        }
        let registry = Arc::new(registry);
        registry.load().await;

        let (extractor, planner): (Arc<dyn ParameterExtractor>, Arc<dyn OperationPlanner>) =
            if config.is_live_llm() {
                (
                    Arc::new(LlmParameterExtractor::new(Arc::clone(&router))),
                    Arc::new(LlmPlanner::new(Arc::clone(&router))),
                )
            } else {
                (Arc::new(RuleBasedExtractor), Arc::new(KeywordPlanner))
            };
        let executor = Arc::new(
            OperationExecutor::new(Arc::clone(&registry), extractor)
                .with_max_attempts(config.parameter_attempts()),
        );

        let context = Arc::new(SnapshotContext::default());
        let pipeline = CommandPipeline::new(
            Arc::new(KeywordClassifier::new()),
            build_chain(&config, Arc::clone(&desktop)),
            router,
            planner,
            executor,
        )
        .with_context_provider(Arc::clone(&context) as Arc<dyn concierge_core::ContextProvider>);

        Self {
            config,
            registry,
            pipeline: Arc::new(pipeline),
            context,
            services,
            desktop,
        }
    }
}

/// Config bindings first (declaration order), then discovered handlers.
pub fn build_chain(config: &CoreConfig, desktop: Arc<dyn DesktopAutomation>) -> HandlerChain {
    HandlerChainBuilder::new(handler_factories(Arc::clone(&desktop)))
        .bindings(&config.handlers)
        .discovered(discovered_handlers(desktop))
        .build()
}

/// `catalog_url` wins over `catalog_store_path`. A store that cannot be opened is logged
/// and skipped so the local file still loads.
fn primary_source(config: &CoreConfig) -> Option<Arc<dyn CatalogSource>> {
    if let Some(url) = config.catalog_url.as_deref().filter(|u| !u.trim().is_empty()) {
        return Some(Arc::new(HttpCatalogSource::new(url)));
    }
    let path = config.catalog_store_path.as_deref().filter(|p| !p.trim().is_empty())?;
    match SledCatalogStore::open_path(path) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::warn!(
                target: "concierge::registry",
                path,
                error = %e,
                "Catalog store unavailable, using local file only"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::{CatalogOrigin, HandlerBinding, OperationDefinition, PipelineOutcome};

    fn config_in(dir: &std::path::Path) -> CoreConfig {
        CoreConfig {
            catalog_path: dir.join("operations.json").display().to_string(),
            sandbox_path: dir.join("sandbox").display().to_string(),
            ..CoreConfig::default()
        }
    }

    fn write_catalog(dir: &std::path::Path) {
        std::fs::write(
            dir.join("operations.json"),
            r#"{"operations": [
                {"name": "create_task", "required_parameters": ["title"], "optional_parameters": ["due", "notes"], "description": "Create a task"},
                {"name": "list_tasks", "description": "List tasks"}
            ]}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_local_file_catalog_and_complex_command() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let runtime = Runtime::start(config_in(dir.path())).await;
        assert_eq!(runtime.registry.catalog().len(), 2);

        let response = runtime
            .pipeline
            .process("complex: create task then list tasks", None)
            .await;
        let pending = match response.outcome {
            PipelineOutcome::NeedsInput { pending, .. } => pending,
            other => panic!("expected needs_input, got {:?}", other),
        };
        let response = runtime
            .pipeline
            .resume(pending, concierge_core::Answer::Text("title: Buy milk".into()))
            .await;
        let message = response.message();
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("✓ create_task: Task created: Buy milk"));
        assert!(lines[1].starts_with("✓ list_tasks: [ ] "));
    }

    #[tokio::test]
    async fn test_sled_store_is_primary() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(dir.path());
        let store_path = dir.path().join("store");
        {
            let store = SledCatalogStore::open_path(&store_path).unwrap();
            store
                .put(&OperationDefinition::new("generate_text").required(["prompt"]))
                .unwrap();
        }
        let config = CoreConfig {
            catalog_store_path: Some(store_path.display().to_string()),
            ..config_in(dir.path())
        };
        let runtime = Runtime::start(config).await;
        let catalog = runtime.registry.catalog();
        assert!(matches!(catalog.origin(), CatalogOrigin::Primary(_)));
        assert!(catalog.contains("generate_text"));
        assert!(!catalog.contains("create_task"));
    }

    #[tokio::test]
    async fn test_configured_handlers_come_first() {
        let config = CoreConfig {
            handlers: vec![HandlerBinding {
                intent: "search".into(),
                kind: "browser_control".into(),
            }],
            ..CoreConfig::default()
        };
        let chain = build_chain(&config, Arc::new(DryRunDesktop::new()));
        assert_eq!(chain.handler_names()[0], "browser_control:search");
        assert_eq!(chain.handler_names()[1], "file_ops");
    }

    #[test]
    fn test_default_intent_bindings_are_not_duplicated() {
        let bind = |intent: &str, kind: &str| HandlerBinding {
            intent: intent.into(),
            kind: kind.into(),
        };
        let config = CoreConfig {
            handlers: vec![
                bind("file_ops", "file_ops"),
                bind("window_management", "window_management"),
                bind("browser_control", "browser_control"),
                bind("search", "browser_control"),
                bind("email_reply", "email"),
                bind("clipboard", "clipboard"),
                bind("app_launcher", "app_launcher"),
            ],
            ..CoreConfig::default()
        };
        let names = build_chain(&config, Arc::new(DryRunDesktop::new())).handler_names();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len(), "duplicate handlers in {:?}", names);
        assert_eq!(names.len(), 8);
        assert_eq!(names.last().map(String::as_str), Some("email"));
    }
}
