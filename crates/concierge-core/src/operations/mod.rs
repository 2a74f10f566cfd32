//! Operation engine: catalog, validation, parameter recovery, and batch execution.

mod action;
mod catalog;
mod definition;
mod error;
mod executor;
mod registry;
mod resolver;
mod store;
mod validator;

pub use action::{ActionFault, ActionOutput, ActionTable, OperationAction, SyncAction};
pub use catalog::{Catalog, CatalogOrigin, CatalogSource};
pub use definition::{OperationDefinition, OperationRequest, Parameters};
pub use error::{CatalogError, ExtractionError, OperationError};
pub use executor::{ExecutionOutcome, ExecutionReport, ExecutionStep, OperationExecutor, PendingExecution};
pub use registry::OperationRegistry;
pub use resolver::{
    resolve, Answer, AnswerSource, CollectedParameters, MissingParameters, ParameterExtractor,
    ParameterResolution, RoundOutcome,
};
pub use store::SledCatalogStore;
pub use validator::{validate, ValidationOutcome};
