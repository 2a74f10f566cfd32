//! Interactive parameter recovery.
//!
//! [`ParameterResolution`] is the explicit suspend/resume state of one bounded dialogue:
//! the caller renders [`question`](ParameterResolution::question), obtains an [`Answer`]
//! however it likes (HTTP round trip, console), and feeds it back with
//! [`submit`](ParameterResolution::submit). [`resolve`] drives the same machine against
//! an [`AnswerSource`] for deployments that can wait in place.

use super::definition::Parameters;
use super::error::ExtractionError;
use std::collections::BTreeMap;

/// Operation name → required parameter names still missing.
pub type MissingParameters = BTreeMap<String, Vec<String>>;

/// Operation name → parameter values recovered from the requester.
pub type CollectedParameters = BTreeMap<String, Parameters>;

/// One reply from the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    /// The requester abandoned the request.
    Cancelled,
}

/// Where answers come from when the caller can wait for them in place.
#[async_trait::async_trait]
pub trait AnswerSource: Send + Sync {
    async fn ask(&self, question: &str) -> Answer;
}

/// Turns free text into structured values, limited to the parameters listed in `missing`.
#[async_trait::async_trait]
pub trait ParameterExtractor: Send + Sync {
    async fn extract(
        &self,
        answer: &str,
        missing: &MissingParameters,
    ) -> Result<CollectedParameters, ExtractionError>;
}

/// What one submitted answer achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Blank answer; the round is spent.
    Skipped,
    /// Extraction failed; treated as nothing extracted.
    ExtractionFailed,
    /// Number of parameters satisfied by this answer (possibly zero).
    Extracted(usize),
    Cancelled,
    /// The resolution had already finished; nothing happened.
    Finished,
}

#[derive(Debug, Clone)]
pub struct ParameterResolution {
    remaining: MissingParameters,
    collected: CollectedParameters,
    rounds: usize,
    max_attempts: usize,
    cancelled: bool,
}

impl ParameterResolution {
    pub fn new(missing: MissingParameters, max_attempts: usize) -> Self {
        let remaining = missing
            .into_iter()
            .filter(|(_, params)| !params.is_empty())
            .collect();
        Self {
            remaining,
            collected: CollectedParameters::new(),
            rounds: 0,
            max_attempts,
            cancelled: false,
        }
    }

    /// Done when nothing is missing, every round is spent, or the requester cancelled.
    pub fn is_finished(&self) -> bool {
        self.cancelled || self.remaining.is_empty() || self.rounds >= self.max_attempts
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn remaining(&self) -> &MissingParameters {
        &self.remaining
    }

    pub fn collected(&self) -> &CollectedParameters {
        &self.collected
    }

    /// The consolidated question for every still-missing parameter, or `None` once finished.
    pub fn question(&self) -> Option<String> {
        if self.is_finished() {
            return None;
        }
        let mut question = String::from("I need some additional information to proceed:\n");
        for (operation, params) in &self.remaining {
            question.push_str(&format!("• For {}: {}\n", operation, params.join(", ")));
        }
        question.push_str("\nPlease provide these details:");
        Some(question)
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Consumes one round with the given answer.
    pub async fn submit(&mut self, answer: Answer, extractor: &dyn ParameterExtractor) -> RoundOutcome {
        if self.is_finished() {
            return RoundOutcome::Finished;
        }
        let text = match answer {
            Answer::Cancelled => {
                self.cancel();
                tracing::info!(
                    target: "concierge::resolver",
                    round = self.rounds + 1,
                    "Parameter collection cancelled by requester"
                );
                return RoundOutcome::Cancelled;
            }
            Answer::Text(text) => text,
        };
        self.rounds += 1;

        if text.trim().is_empty() {
            tracing::debug!(target: "concierge::resolver", round = self.rounds, "Blank answer, round skipped");
            return RoundOutcome::Skipped;
        }

        let extracted = match extractor.extract(&text, &self.remaining).await {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!(
                    target: "concierge::resolver",
                    round = self.rounds,
                    error = %e,
                    "Parameter extraction failed, nothing collected this round"
                );
                return RoundOutcome::ExtractionFailed;
            }
        };

        let satisfied = self.merge(extracted);
        tracing::debug!(
            target: "concierge::resolver",
            round = self.rounds,
            satisfied,
            remaining = self.remaining.values().map(Vec::len).sum::<usize>(),
            "Answer merged"
        );
        if self.remaining.is_empty() {
            tracing::info!(target: "concierge::resolver", rounds = self.rounds, "All parameters collected");
        }
        RoundOutcome::Extracted(satisfied)
    }

    /// Keeps only values for parameters still missing; null values do not count.
    fn merge(&mut self, extracted: CollectedParameters) -> usize {
        let mut satisfied = 0;
        for (operation, mut values) in extracted {
            let Some(missing) = self.remaining.get_mut(&operation) else {
                continue;
            };
            let mut accepted = Parameters::new();
            missing.retain(|param| match values.remove(param) {
                Some(value) if !value.is_null() => {
                    accepted.insert(param.clone(), value);
                    false
                }
                _ => true,
            });
            satisfied += accepted.len();
            if !accepted.is_empty() {
                self.collected.entry(operation.clone()).or_default().extend(accepted);
            }
            if missing.is_empty() {
                self.remaining.remove(&operation);
            }
        }
        satisfied
    }

    pub fn into_collected(self) -> CollectedParameters {
        self.collected
    }
}

/// Runs the dialogue to completion against `answers`. Returns whatever was collected;
/// parameters still missing are left for the caller's re-validation.
pub async fn resolve(
    missing: MissingParameters,
    max_attempts: usize,
    answers: &dyn AnswerSource,
    extractor: &dyn ParameterExtractor,
) -> CollectedParameters {
    let mut resolution = ParameterResolution::new(missing, max_attempts);
    while let Some(question) = resolution.question() {
        let answer = answers.ask(&question).await;
        resolution.submit(answer, extractor).await;
    }
    resolution.into_collected()
}
