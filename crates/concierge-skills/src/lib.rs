//! Concrete collaborators for the Concierge core: command handlers, built-in actions,
//! classifier, model router, planners, parameter extractors and catalog sources.

pub use concierge_core::{CommandHandler, OperationAction};

pub mod actions;
mod classifier;
mod desktop;
mod extractor;
pub mod handlers;
mod http_catalog;
mod model_router;
mod planner;
mod runtime;

pub use classifier::KeywordClassifier;
pub use desktop::{DesktopAction, DesktopAutomation, DryRunDesktop};
pub use extractor::{LlmParameterExtractor, RuleBasedExtractor};
pub use http_catalog::{parse_catalog_payload, HttpCatalogSource};
pub use model_router::{LlmMode, ModelError, ModelRouter};
pub use planner::{parse_plan, KeywordPlanner, LlmPlanner};
pub use runtime::{build_chain, Runtime};
