//! Pipeline orchestrator: context → classification → handler chain or operation plan.
//!
//! The pipeline only sequences collaborators. It never runs operations itself; multi-step
//! commands are planned into [`OperationRequest`]s and handed to the [`OperationExecutor`].

use crate::chain::{Dispatch, HandlerChain, HandlerFault, HandlerReply};
use crate::operations::{
    Answer, AnswerSource, Catalog, ExecutionReport, ExecutionStep, OperationExecutor,
    OperationRequest, PendingExecution,
};
use crate::shared::{CommandContext, Entities};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Intent that routes a command to the multi-operation path.
pub const COMPLEX_INTENT: &str = "complex";

/// Classifier output for one command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: String,
    #[serde(default)]
    pub entities: Entities,
}

impl Classification {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            entities: Entities::new(),
        }
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }

    pub fn is_complex(&self) -> bool {
        self.intent == COMPLEX_INTENT
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("planner backend failed: {0}")]
    Backend(String),
    #[error("planner returned an unparseable plan: {0}")]
    Unparseable(String),
}

#[async_trait::async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Never fails; unrecognized commands classify as an intent no handler claims.
    async fn classify(&self, command: &str) -> Classification;
}

#[async_trait::async_trait]
pub trait OperationPlanner: Send + Sync {
    /// Ordered operation requests for `query`, drawn from `catalog`.
    async fn plan(&self, query: &str, catalog: &Catalog) -> Result<Vec<OperationRequest>, PlanError>;
}

/// General-purpose responder used when no handler claims a command.
#[async_trait::async_trait]
pub trait FallbackResponder: Send + Sync {
    async fn respond(&self, command: &str, context: &CommandContext) -> Result<String, HandlerFault>;
}

/// Supplies context when the caller sends none.
#[async_trait::async_trait]
pub trait ContextProvider: Send + Sync {
    async fn current(&self) -> CommandContext;
}

/// Latest context snapshot pushed by a client; replaced wholesale.
#[derive(Debug, Default)]
pub struct SnapshotContext {
    snapshot: RwLock<CommandContext>,
}

impl SnapshotContext {
    pub fn new(initial: CommandContext) -> Self {
        Self {
            snapshot: RwLock::new(initial),
        }
    }

    pub fn replace(&self, context: CommandContext) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = context,
            Err(poisoned) => *poisoned.into_inner() = context,
        }
    }

    pub fn snapshot(&self) -> CommandContext {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait::async_trait]
impl ContextProvider for SnapshotContext {
    async fn current(&self) -> CommandContext {
        self.snapshot()
    }
}

/// A complex command suspended on the parameter dialogue.
#[derive(Debug)]
pub struct PendingCommand {
    pub command: String,
    pub intent: String,
    execution: PendingExecution,
}

impl PendingCommand {
    pub fn question(&self) -> Option<String> {
        self.execution.question()
    }

    pub fn rounds(&self) -> usize {
        self.execution.rounds()
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    /// A chain handler claimed the command.
    Handled(HandlerReply),
    /// No handler matched; the fallback responder answered.
    Fallback(String),
    /// Multi-operation path finished.
    Report(ExecutionReport),
    /// Multi-operation path waits for the requester.
    NeedsInput {
        question: String,
        pending: PendingCommand,
    },
    /// A collaborator failed for the whole command (planner, fallback).
    Failed(String),
}

#[derive(Debug)]
pub struct PipelineResponse {
    pub command: String,
    pub intent: String,
    pub outcome: PipelineOutcome,
}

impl PipelineResponse {
    /// Text shown to the user.
    pub fn message(&self) -> String {
        match &self.outcome {
            PipelineOutcome::Handled(reply) => reply.message.clone(),
            PipelineOutcome::Fallback(text) => text.clone(),
            PipelineOutcome::Report(report) => report.render(),
            PipelineOutcome::NeedsInput { question, .. } => question.clone(),
            PipelineOutcome::Failed(reason) => reason.clone(),
        }
    }

    pub fn succeeded(&self) -> bool {
        match &self.outcome {
            PipelineOutcome::Handled(reply) => reply.succeeded,
            PipelineOutcome::Fallback(_) | PipelineOutcome::NeedsInput { .. } => true,
            PipelineOutcome::Report(report) => report.all_succeeded(),
            PipelineOutcome::Failed(_) => false,
        }
    }

    /// Short status tag for wire responses.
    pub fn status(&self) -> &'static str {
        match &self.outcome {
            PipelineOutcome::Handled(_) => "handled",
            PipelineOutcome::Fallback(_) => "fallback",
            PipelineOutcome::Report(_) => "completed",
            PipelineOutcome::NeedsInput { .. } => "needs_input",
            PipelineOutcome::Failed(_) => "failed",
        }
    }
}

pub struct CommandPipeline {
    classifier: Arc<dyn IntentClassifier>,
    chain: RwLock<Arc<HandlerChain>>,
    fallback: Arc<dyn FallbackResponder>,
    planner: Arc<dyn OperationPlanner>,
    executor: Arc<OperationExecutor>,
    context: Option<Arc<dyn ContextProvider>>,
}

impl CommandPipeline {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        chain: HandlerChain,
        fallback: Arc<dyn FallbackResponder>,
        planner: Arc<dyn OperationPlanner>,
        executor: Arc<OperationExecutor>,
    ) -> Self {
        Self {
            classifier,
            chain: RwLock::new(Arc::new(chain)),
            fallback,
            planner,
            executor,
            context: None,
        }
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    /// Swaps in a new chain; in-flight dispatches keep the chain they started with.
    pub fn install_chain(&self, chain: HandlerChain) {
        let chain = Arc::new(chain);
        match self.chain.write() {
            Ok(mut guard) => *guard = chain,
            Err(poisoned) => *poisoned.into_inner() = chain,
        }
    }

    pub fn chain(&self) -> Arc<HandlerChain> {
        match self.chain.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn executor(&self) -> &Arc<OperationExecutor> {
        &self.executor
    }

    /// Runs one command. Complex commands may come back as
    /// [`PipelineOutcome::NeedsInput`]; continue them with [`resume`](Self::resume).
    pub async fn process(&self, command: &str, context: Option<CommandContext>) -> PipelineResponse {
        let context = match context {
            Some(context) => context,
            None => match &self.context {
                Some(provider) => provider.current().await,
                None => CommandContext::new(),
            },
        };

        let classification = self.classifier.classify(command).await;
        tracing::info!(
            target: "concierge::pipeline",
            intent = %classification.intent,
            entities = classification.entities.len(),
            "Command classified"
        );

        let outcome = if classification.is_complex() {
            self.plan_and_execute(command, &classification.intent).await
        } else {
            self.route(command, &classification, &context).await
        };

        PipelineResponse {
            command: command.to_string(),
            intent: classification.intent,
            outcome,
        }
    }

    /// Feeds the requester's answer into a suspended complex command.
    pub async fn resume(&self, pending: PendingCommand, answer: Answer) -> PipelineResponse {
        let PendingCommand {
            command,
            intent,
            execution,
        } = pending;
        let step = self.executor.resume(execution, answer).await;
        let outcome = Self::step_outcome(&command, &intent, step);
        PipelineResponse {
            command,
            intent,
            outcome,
        }
    }

    /// Abandons the dialogue; the batch still runs with what was collected.
    pub async fn cancel(&self, pending: PendingCommand) -> PipelineResponse {
        self.resume(pending, Answer::Cancelled).await
    }

    /// Runs one command to completion, answering questions from `answers` in place.
    pub async fn process_interactive(
        &self,
        command: &str,
        context: Option<CommandContext>,
        answers: &dyn AnswerSource,
    ) -> PipelineResponse {
        let mut response = self.process(command, context).await;
        loop {
            match response.outcome {
                PipelineOutcome::NeedsInput { question, pending } => {
                    let answer = answers.ask(&question).await;
                    response = self.resume(pending, answer).await;
                }
                outcome => {
                    return PipelineResponse {
                        outcome,
                        ..response
                    }
                }
            }
        }
    }

    async fn route(
        &self,
        command: &str,
        classification: &Classification,
        context: &CommandContext,
    ) -> PipelineOutcome {
        let chain = self.chain();
        match chain
            .dispatch(command, &classification.intent, &classification.entities, context)
            .await
        {
            Dispatch::Handled(reply) => PipelineOutcome::Handled(reply),
            Dispatch::Unmatched => match self.fallback.respond(command, context).await {
                Ok(text) => PipelineOutcome::Fallback(text),
                Err(e) => {
                    tracing::warn!(target: "concierge::pipeline", error = %e, "Fallback responder failed");
                    PipelineOutcome::Failed(format!("Error processing command: {}", e))
                }
            },
        }
    }

    async fn plan_and_execute(&self, command: &str, intent: &str) -> PipelineOutcome {
        let catalog = self.executor.registry().catalog();
        let requests = match self.planner.plan(command, &catalog).await {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!(target: "concierge::pipeline", error = %e, "Planning failed");
                return PipelineOutcome::Failed(format!("Could not plan operations: {}", e));
            }
        };
        tracing::info!(
            target: "concierge::pipeline",
            operations = requests.len(),
            "Command planned into operations"
        );
        let step = self.executor.begin(requests).await;
        Self::step_outcome(command, intent, step)
    }

    fn step_outcome(command: &str, intent: &str, step: ExecutionStep) -> PipelineOutcome {
        match step {
            ExecutionStep::Complete(report) => PipelineOutcome::Report(report),
            ExecutionStep::NeedsInput(execution) => {
                let question = execution.question().unwrap_or_default();
                PipelineOutcome::NeedsInput {
                    question,
                    pending: PendingCommand {
                        command: command.to_string(),
                        intent: intent.to_string(),
                        execution,
                    },
                }
            }
        }
    }
}
