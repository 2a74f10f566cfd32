//! concierge-core: assistant core library (shared types, operation engine, handler chain, pipeline).
//!
//! The operation engine resolves a planned batch of [`OperationRequest`]s against the
//! catalog held by the [`OperationRegistry`], recovers missing parameters through a bounded
//! [`ParameterResolution`] dialogue, and runs the bound actions into an [`ExecutionReport`].
//! The [`HandlerChain`] routes classified single-step commands, and the [`CommandPipeline`]
//! sequences both paths for one request.

mod chain;
mod operations;
mod pipeline;
mod shared;

// Shared
pub use shared::{
    CommandContext, CoreConfig, Entities, HandlerBinding, DEFAULT_MAX_PARAMETER_ATTEMPTS,
    DEFAULT_SESSION_TTL_SECS,
};

// Operation engine
pub use operations::{
    resolve, validate, ActionFault, ActionOutput, ActionTable, Answer, AnswerSource, Catalog,
    CatalogError, CatalogOrigin, CatalogSource, CollectedParameters, ExecutionOutcome,
    ExecutionReport, ExecutionStep, ExtractionError, MissingParameters, OperationAction,
    OperationDefinition, OperationError, OperationExecutor, OperationRegistry, OperationRequest,
    ParameterExtractor, ParameterResolution, Parameters, PendingExecution, RoundOutcome,
    SledCatalogStore, SyncAction, ValidationOutcome,
};

// Handler chain
pub use chain::{
    CommandHandler, Dispatch, HandlerChain, HandlerChainBuilder, HandlerFactories, HandlerFactory,
    HandlerFault, HandlerReply,
};

// Pipeline
pub use pipeline::{
    Classification, CommandPipeline, ContextProvider, FallbackResponder, IntentClassifier,
    OperationPlanner, PendingCommand, PipelineOutcome, PipelineResponse, PlanError,
    SnapshotContext, COMPLEX_INTENT,
};
