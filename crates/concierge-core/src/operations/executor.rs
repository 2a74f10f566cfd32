//! Best-effort batch execution with two phases.
//!
//! Phase A validates every request against one catalog snapshot: fatal problems become
//! failed outcomes right away, requests missing required parameters are grouped by
//! operation name. Phase B asks once for the whole incomplete set, re-validates, and runs
//! each valid request's action exactly once, in request order. One failure never stops the
//! rest of the batch.

use super::action::ActionTable;
use super::catalog::Catalog;
use super::definition::{OperationRequest, Parameters};
use super::error::OperationError;
use super::registry::{resolve_in, OperationRegistry};
use super::resolver::{
    Answer, AnswerSource, CollectedParameters, MissingParameters, ParameterExtractor,
    ParameterResolution,
};
use super::validator::{validate, ValidationOutcome};
use crate::shared::DEFAULT_MAX_PARAMETER_ATTEMPTS;
use futures_util::FutureExt;
use serde::Serialize;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Result of one attempted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub operation_name: String,
    pub succeeded: bool,
    pub message: String,
}

impl ExecutionOutcome {
    pub fn success(operation_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(operation_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            succeeded: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.succeeded { '✓' } else { '✗' };
        write!(f, "{} {}: {}", mark, self.operation_name, self.message)
    }
}

/// Outcomes in request order. Never reordered or deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    outcomes: Vec<ExecutionOutcome>,
}

impl ExecutionReport {
    pub fn outcomes(&self) -> &[ExecutionOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded)
    }

    /// One `"<✓/✗> <name>: <message>"` line per outcome.
    pub fn render(&self) -> String {
        if self.outcomes.is_empty() {
            return "No operations provided.".to_string();
        }
        self.outcomes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Settled(ExecutionOutcome),
    Ready(OperationRequest),
    Incomplete(OperationRequest),
}

/// A batch suspended on the parameter dialogue. Owned by exactly one request.
#[derive(Debug)]
pub struct PendingExecution {
    catalog: Arc<Catalog>,
    slots: Vec<Slot>,
    resolution: ParameterResolution,
}

impl PendingExecution {
    /// The question to put to the requester; `None` once the dialogue is over.
    pub fn question(&self) -> Option<String> {
        self.resolution.question()
    }

    pub fn remaining(&self) -> &MissingParameters {
        self.resolution.remaining()
    }

    pub fn rounds(&self) -> usize {
        self.resolution.rounds()
    }

    pub fn request_count(&self) -> usize {
        self.slots.len()
    }
}

/// Either the finished report or a batch waiting for the requester's next answer.
#[derive(Debug)]
pub enum ExecutionStep {
    Complete(ExecutionReport),
    NeedsInput(PendingExecution),
}

pub struct OperationExecutor {
    registry: Arc<OperationRegistry>,
    extractor: Arc<dyn ParameterExtractor>,
    max_attempts: usize,
}

impl OperationExecutor {
    pub fn new(registry: Arc<OperationRegistry>, extractor: Arc<dyn ParameterExtractor>) -> Self {
        Self {
            registry,
            extractor,
            max_attempts: DEFAULT_MAX_PARAMETER_ATTEMPTS as usize,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Runs the batch, waiting on `answers` for any missing parameters.
    pub async fn execute(
        &self,
        requests: Vec<OperationRequest>,
        answers: &dyn AnswerSource,
    ) -> ExecutionReport {
        let mut step = self.begin(requests).await;
        loop {
            match step {
                ExecutionStep::Complete(report) => return report,
                ExecutionStep::NeedsInput(pending) => {
                    let answer = match pending.question() {
                        Some(question) => answers.ask(&question).await,
                        None => Answer::Cancelled,
                    };
                    step = self.resume(pending, answer).await;
                }
            }
        }
    }

    /// Phase A. Completes immediately when nothing needs asking.
    pub async fn begin(&self, requests: Vec<OperationRequest>) -> ExecutionStep {
        let catalog = self.registry.catalog();
        let actions = self.registry.actions();
        let mut missing = MissingParameters::new();
        let mut slots = Vec::with_capacity(requests.len());

        tracing::info!(
            target: "concierge::executor",
            requests = requests.len(),
            "Validating operation batch"
        );

        for request in requests {
            slots.push(classify_request(&catalog, actions, request, &mut missing));
        }

        if missing.is_empty() {
            return ExecutionStep::Complete(self.run(&catalog, slots, Default::default()).await);
        }

        tracing::info!(
            target: "concierge::executor",
            operations = missing.len(),
            "Operations with missing parameters, asking requester"
        );
        ExecutionStep::NeedsInput(PendingExecution {
            catalog,
            slots,
            resolution: ParameterResolution::new(missing, self.max_attempts),
        })
    }

    /// Feeds one answer into a suspended batch; runs Phase B once the dialogue is over.
    pub async fn resume(&self, mut pending: PendingExecution, answer: Answer) -> ExecutionStep {
        pending.resolution.submit(answer, self.extractor.as_ref()).await;
        if pending.resolution.is_finished() {
            ExecutionStep::Complete(self.finish(pending).await)
        } else {
            ExecutionStep::NeedsInput(pending)
        }
    }

    /// Stops asking and runs Phase B with whatever was collected.
    pub async fn finish(&self, pending: PendingExecution) -> ExecutionReport {
        let PendingExecution {
            catalog,
            slots,
            resolution,
        } = pending;
        self.run(&catalog, slots, resolution.into_collected()).await
    }

    async fn run(
        &self,
        catalog: &Catalog,
        slots: Vec<Slot>,
        collected: CollectedParameters,
    ) -> ExecutionReport {
        let mut outcomes = Vec::with_capacity(slots.len());
        for slot in slots {
            let outcome = match slot {
                Slot::Settled(outcome) => outcome,
                Slot::Ready(request) => self.invoke(catalog, request).await,
                Slot::Incomplete(mut request) => {
                    if let Some(extra) = collected.get(&request.name) {
                        request.parameters.extend(extra.clone());
                    }
                    match validate(catalog, &request.name, &request.parameters) {
                        ValidationOutcome::Valid => self.invoke(catalog, request).await,
                        ValidationOutcome::Invalid(err) => {
                            ExecutionOutcome::failure(&request.name, err.to_string())
                        }
                        ValidationOutcome::MissingRequired(missing) => ExecutionOutcome::failure(
                            &request.name,
                            OperationError::MissingRequiredParameter {
                                operation: request.name.clone(),
                                missing,
                            }
                            .to_string(),
                        ),
                    }
                }
            };
            if !outcome.succeeded {
                tracing::warn!(
                    target: "concierge::executor",
                    operation = %outcome.operation_name,
                    message = %outcome.message,
                    "Operation failed"
                );
            }
            outcomes.push(outcome);
        }
        ExecutionReport { outcomes }
    }

    async fn invoke(&self, catalog: &Catalog, request: OperationRequest) -> ExecutionOutcome {
        let action = match resolve_in(catalog, self.registry.actions(), &request.name) {
            Ok(action) => action,
            Err(err) => return ExecutionOutcome::failure(&request.name, err.to_string()),
        };
        tracing::debug!(target: "concierge::executor", operation = %request.name, "Invoking action");
        let params: Parameters = request.parameters;
        match AssertUnwindSafe(action.invoke(&params)).catch_unwind().await {
            Ok(Ok(output)) => ExecutionOutcome {
                operation_name: request.name,
                succeeded: output.succeeded,
                message: output.message,
            },
            Ok(Err(fault)) => ExecutionOutcome::failure(
                request.name,
                OperationError::ActionExecutionFault(fault.to_string()).to_string(),
            ),
            Err(_) => ExecutionOutcome::failure(
                request.name,
                OperationError::ActionExecutionFault("action panicked".to_string()).to_string(),
            ),
        }
    }
}

fn classify_request(
    catalog: &Catalog,
    actions: &ActionTable,
    request: OperationRequest,
    missing: &mut MissingParameters,
) -> Slot {
    if request.name.trim().is_empty() {
        return Slot::Settled(ExecutionOutcome::failure(
            "(unnamed)",
            "Operation missing 'name' field",
        ));
    }
    if let Err(err) = resolve_in(catalog, actions, &request.name) {
        return Slot::Settled(ExecutionOutcome::failure(&request.name, err.to_string()));
    }
    match validate(catalog, &request.name, &request.parameters) {
        ValidationOutcome::Valid => Slot::Ready(request),
        ValidationOutcome::Invalid(err) => {
            Slot::Settled(ExecutionOutcome::failure(&request.name, err.to_string()))
        }
        ValidationOutcome::MissingRequired(params) => {
            let entry = missing.entry(request.name.clone()).or_default();
            for param in params {
                if !entry.contains(&param) {
                    entry.push(param);
                }
            }
            Slot::Incomplete(request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::action::{ActionOutput, OperationAction, SyncAction};
    use crate::operations::catalog::CatalogOrigin;
    use crate::operations::definition::OperationDefinition;
    use crate::operations::error::ExtractionError;
    use crate::operations::action::ActionFault;
    use std::sync::Mutex;

    /// Records every invocation with its parameters.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, Parameters)>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<(String, Parameters)> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct Recording {
        name: &'static str,
        recorder: Arc<Recorder>,
        output: fn(&Parameters) -> Result<ActionOutput, ActionFault>,
    }

    #[async_trait::async_trait]
    impl OperationAction for Recording {
        async fn invoke(
            &self,
            parameters: &Parameters,
        ) -> Result<ActionOutput, ActionFault> {
            self.recorder
                .calls
                .lock()
                .unwrap()
                .push((self.name.to_string(), parameters.clone()));
            (self.output)(parameters)
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl OperationAction for Panicking {
        async fn invoke(
            &self,
            _parameters: &Parameters,
        ) -> Result<ActionOutput, ActionFault> {
            panic!("driver crashed");
        }
    }

    /// Returns a fixed extraction regardless of the answer text.
    struct FixedExtractor(CollectedParameters);

    #[async_trait::async_trait]
    impl ParameterExtractor for FixedExtractor {
        async fn extract(
            &self,
            _answer: &str,
            _missing: &MissingParameters,
        ) -> Result<CollectedParameters, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct Scripted(Mutex<Vec<Answer>>);

    impl Scripted {
        fn new(mut answers: Vec<Answer>) -> Self {
            answers.reverse();
            Self(Mutex::new(answers))
        }

        fn left(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl AnswerSource for Scripted {
        async fn ask(&self, _question: &str) -> Answer {
            self.0
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Answer::Text(String::new()))
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_definitions(
            vec![
                OperationDefinition::new("create_task").required(["title"]).optional(["due"]),
                OperationDefinition::new("send_email")
                    .required(["to", "subject", "body"])
                    .optional(["cc"]),
                OperationDefinition::new("opA"),
                OperationDefinition::new("opB"),
                OperationDefinition::new("opC"),
                OperationDefinition::new("office.ppt.create").required(["title"]),
            ],
            CatalogOrigin::Empty,
        )
        .unwrap()
    }

    fn ok_task(params: &Parameters) -> Result<ActionOutput, ActionFault> {
        let title = params["title"].as_str().unwrap_or_default();
        Ok(ActionOutput::ok(format!("Task created: {}", title)))
    }

    fn ok_done(_: &Parameters) -> Result<ActionOutput, ActionFault> {
        Ok(ActionOutput::ok("done"))
    }

    fn soft_fail(_: &Parameters) -> Result<ActionOutput, ActionFault> {
        Ok(ActionOutput::failed("disk full"))
    }

    fn raises(_: &Parameters) -> Result<ActionOutput, ActionFault> {
        Err("SMTP connection reset".into())
    }

    fn executor_with(
        recorder: &Arc<Recorder>,
        extractor: CollectedParameters,
        bindings: &[(&'static str, fn(&Parameters) -> Result<ActionOutput, ActionFault>)],
    ) -> OperationExecutor {
        let table = bindings.iter().fold(ActionTable::new(), |table, &(name, output)| {
            table.bind(
                name,
                Arc::new(Recording {
                    name,
                    recorder: Arc::clone(recorder),
                    output,
                }),
            )
        });
        let registry = Arc::new(OperationRegistry::with_catalog(catalog(), table));
        OperationExecutor::new(registry, Arc::new(FixedExtractor(extractor)))
    }

    fn no_answers() -> Scripted {
        Scripted::new(Vec::new())
    }

    #[tokio::test]
    async fn test_valid_request_invoked_once() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor_with(&recorder, CollectedParameters::new(), &[("create_task", ok_task)]);
        let report = executor
            .execute(
                vec![OperationRequest::new("create_task").with_param("title", "Buy milk")],
                &no_answers(),
            )
            .await;
        assert_eq!(report.render(), "✓ create_task: Task created: Buy milk");
        assert_eq!(recorder.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_never_invokes() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor_with(&recorder, CollectedParameters::new(), &[("create_task", ok_task)]);
        let report = executor
            .execute(vec![OperationRequest::new("unknown_op")], &no_answers())
            .await;
        assert_eq!(report.render(), "✗ unknown_op: Unknown op: unknown_op");
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_parameters_recovered_then_invoked() {
        let recorder = Arc::new(Recorder::default());
        let mut extracted = Parameters::new();
        extracted.insert("to".into(), serde_json::json!("alice@example.com"));
        extracted.insert("body".into(), serde_json::json!("hello"));
        let executor = executor_with(
            &recorder,
            [("send_email".to_string(), extracted)].into_iter().collect(),
            &[("send_email", ok_done)],
        );
        let answers = Scripted::new(vec![Answer::Text(
            "send it to alice@example.com with body hello".into(),
        )]);
        let report = executor
            .execute(
                vec![OperationRequest::new("send_email").with_param("subject", "Lunch")],
                &answers,
            )
            .await;

        assert_eq!(report.render(), "✓ send_email: done");
        assert_eq!(answers.left(), 0);
        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        let params = &calls[0].1;
        assert_eq!(params["to"], "alice@example.com");
        assert_eq!(params["subject"], "Lunch");
        assert_eq!(params["body"], "hello");
    }

    #[tokio::test]
    async fn test_batch_isolation_preserves_order() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor_with(
            &recorder,
            CollectedParameters::new(),
            &[("opA", ok_done), ("opB", raises), ("opC", soft_fail)],
        );
        let report = executor
            .execute(
                vec![
                    OperationRequest::new("opA"),
                    OperationRequest::new("opB"),
                    OperationRequest::new("opC"),
                ],
                &no_answers(),
            )
            .await;
        assert_eq!(
            report.render(),
            "✓ opA: done\n✗ opB: Execution error - SMTP connection reset\n✗ opC: disk full"
        );
        let names: Vec<String> = recorder.calls().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["opA", "opB", "opC"]);
    }

    #[tokio::test]
    async fn test_panicking_action_recorded_as_failure() {
        let table = ActionTable::new()
            .bind("opA", Arc::new(Panicking))
            .bind(
                "opB",
                Arc::new(SyncAction::new(|_: &Parameters| Ok(ActionOutput::ok("still ran")))),
            );
        let registry = Arc::new(OperationRegistry::with_catalog(catalog(), table));
        let executor =
            OperationExecutor::new(registry, Arc::new(FixedExtractor(CollectedParameters::new())));
        let report = executor
            .execute(
                vec![OperationRequest::new("opA"), OperationRequest::new("opB")],
                &no_answers(),
            )
            .await;
        assert_eq!(report.len(), 2);
        assert_eq!(report.outcomes()[0].message, "Execution error - action panicked");
        assert!(report.outcomes()[1].succeeded);
    }

    #[tokio::test]
    async fn test_unresolved_request_fails_without_blocking_others() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor_with(
            &recorder,
            CollectedParameters::new(),
            &[("create_task", ok_task), ("send_email", ok_done), ("opA", ok_done)],
        );
        let report = executor
            .execute(
                vec![
                    OperationRequest::new("send_email").with_param("subject", "Hi"),
                    OperationRequest::new("opA"),
                    OperationRequest::new("create_task").with_param("titel", "typo"),
                ],
                &no_answers(),
            )
            .await;
        let lines: Vec<String> = report.outcomes().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "✗ send_email: Missing required parameters for send_email: to, body".to_string(),
                "✓ opA: done".to_string(),
                "✗ create_task: Invalid parameters for create_task: titel. Valid: title, due"
                    .to_string(),
            ]
        );
        let names: Vec<String> = recorder.calls().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["opA"]);
    }

    #[tokio::test]
    async fn test_unbound_operation_reported_unavailable() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor_with(&recorder, CollectedParameters::new(), &[]);
        let report = executor
            .execute(
                vec![OperationRequest::new("office.ppt.create")],
                &no_answers(),
            )
            .await;
        assert_eq!(report.render(), "✗ office.ppt.create: Operation not implemented");
    }

    #[tokio::test]
    async fn test_begin_suspends_and_resume_completes() {
        let recorder = Arc::new(Recorder::default());
        let mut extracted = Parameters::new();
        extracted.insert("title".into(), serde_json::json!("Call mom"));
        let executor = executor_with(
            &recorder,
            [("create_task".to_string(), extracted)].into_iter().collect(),
            &[("create_task", ok_task), ("opA", ok_done)],
        );

        let step = executor
            .begin(vec![OperationRequest::new("opA"), OperationRequest::new("create_task")])
            .await;
        let pending = match step {
            ExecutionStep::NeedsInput(pending) => pending,
            ExecutionStep::Complete(report) => panic!("expected suspension, got {}", report),
        };
        assert!(pending.question().unwrap().contains("• For create_task: title"));
        // Nothing runs before the dialogue ends.
        assert!(recorder.calls().is_empty());

        let step = executor
            .resume(pending, Answer::Text("title is Call mom".into()))
            .await;
        let report = match step {
            ExecutionStep::Complete(report) => report,
            ExecutionStep::NeedsInput(_) => panic!("expected completion"),
        };
        assert_eq!(report.render(), "✓ opA: done\n✓ create_task: Task created: Call mom");
    }

    #[tokio::test]
    async fn test_cancel_runs_batch_with_partial_collection() {
        let recorder = Arc::new(Recorder::default());
        let executor = executor_with(
            &recorder,
            CollectedParameters::new(),
            &[("create_task", ok_task), ("opA", ok_done)],
        );
        let pending = match executor
            .begin(vec![OperationRequest::new("create_task"), OperationRequest::new("opA")])
            .await
        {
            ExecutionStep::NeedsInput(pending) => pending,
            ExecutionStep::Complete(_) => panic!("expected suspension"),
        };
        let report = match executor.resume(pending, Answer::Cancelled).await {
            ExecutionStep::Complete(report) => report,
            ExecutionStep::NeedsInput(_) => panic!("cancel must finish the dialogue"),
        };
        assert_eq!(
            report.render(),
            "✗ create_task: Missing required parameters for create_task: title\n✓ opA: done"
        );
    }

    #[test]
    fn test_empty_report_renders_placeholder() {
        assert_eq!(ExecutionReport::default().render(), "No operations provided.");
    }
}
