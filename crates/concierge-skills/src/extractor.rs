//! Parameter extractors: turn a free-text answer into values for missing parameters.

use crate::model_router::ModelRouter;
use crate::planner::strip_code_fences;
use concierge_core::{CollectedParameters, ExtractionError, MissingParameters, ParameterExtractor, Parameters};
use std::sync::Arc;

const SEGMENT_BREAKS: [&str; 4] = ["and", "with", "then", "also"];
const ADDRESS_PARAMS: [&str; 3] = ["to", "email", "recipient"];

/// Asks the model router to pull the missing values out of the answer.
pub struct LlmParameterExtractor {
    router: Arc<ModelRouter>,
}

impl LlmParameterExtractor {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }

    fn prompt(answer: &str, missing: &MissingParameters) -> String {
        let listing: String = missing
            .iter()
            .map(|(op, params)| format!("- {}: {}\n", op, params.join(", ")))
            .collect();
        format!(
            "Extract values for the missing parameters from the user's answer.\n\
             Missing parameters:\n{}\n\
             Answer: \"{}\"\n\n\
             Respond with only a JSON object shaped {{\"<operation>\": {{\"<parameter>\": value}}}}.\n\
             Leave out anything the answer does not state.",
            listing, answer
        )
    }
}

#[async_trait::async_trait]
impl ParameterExtractor for LlmParameterExtractor {
    async fn extract(
        &self,
        answer: &str,
        missing: &MissingParameters,
    ) -> Result<CollectedParameters, ExtractionError> {
        let reply = self
            .router
            .generate(&Self::prompt(answer, missing))
            .await
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;
        let mut parsed: CollectedParameters = serde_json::from_str(strip_code_fences(&reply))
            .map_err(|e| ExtractionError::Unparseable(e.to_string()))?;
        parsed.retain(|op, values| {
            let Some(wanted) = missing.get(op) else {
                return false;
            };
            values.retain(|param, value| wanted.contains(param) && !value.is_null());
            !values.is_empty()
        });
        Ok(parsed)
    }
}

/// Picks `param: value`, `param=value` and `param value` segments out of the answer,
/// plus the first e-mail address for address-like parameters. When a single parameter
/// is missing in total, an answer with no recognizable segment is taken as its value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn extract_values(&self, answer: &str, missing: &MissingParameters) -> CollectedParameters {
        let segments = segments(answer);
        let email = first_email(answer);
        let mut collected = CollectedParameters::new();

        for (op, params) in missing {
            let mut values = Parameters::new();
            for param in params {
                let value = segments
                    .iter()
                    .find_map(|segment| value_for(segment, param))
                    .or_else(|| {
                        ADDRESS_PARAMS
                            .contains(&param.as_str())
                            .then(|| email.clone())
                            .flatten()
                    });
                if let Some(value) = value {
                    values.insert(param.clone(), value.into());
                }
            }
            if !values.is_empty() {
                collected.insert(op.clone(), values);
            }
        }

        let total_missing: usize = missing.values().map(Vec::len).sum();
        if collected.is_empty() && total_missing == 1 && !answer.trim().is_empty() {
            if let Some((op, param)) = missing
                .iter()
                .find_map(|(op, params)| params.first().map(|p| (op, p)))
            {
                let mut values = Parameters::new();
                values.insert(param.clone(), answer.trim().into());
                collected.insert(op.clone(), values);
            }
        }
        collected
    }
}

#[async_trait::async_trait]
impl ParameterExtractor for RuleBasedExtractor {
    async fn extract(
        &self,
        answer: &str,
        missing: &MissingParameters,
    ) -> Result<CollectedParameters, ExtractionError> {
        Ok(self.extract_values(answer, missing))
    }
}

/// Splits on `,` `;` newlines and the connective words in [`SEGMENT_BREAKS`].
fn segments(answer: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut flush = |current: &mut Vec<&str>| {
        if !current.is_empty() {
            out.push(current.join(" "));
            current.clear();
        }
    };
    for line in answer.lines() {
        for word in line.split_whitespace() {
            if SEGMENT_BREAKS.contains(&word.to_lowercase().as_str()) {
                flush(&mut current);
                continue;
            }
            let ends_segment = word.ends_with(',') || word.ends_with(';');
            let word = word.trim_end_matches([',', ';']);
            if !word.is_empty() {
                current.push(word);
            }
            if ends_segment {
                flush(&mut current);
            }
        }
        flush(&mut current);
    }
    out
}

fn value_for(segment: &str, param: &str) -> Option<String> {
    let lower = segment.to_ascii_lowercase();
    let spaced = param.replace('_', " ");
    [param, spaced.as_str()].iter().find_map(|prefix| {
        let prefix = prefix.to_ascii_lowercase();
        let rest = lower.strip_prefix(&prefix)?;
        if !(rest.is_empty() || rest.starts_with([':', '=', ' '])) {
            return None;
        }
        let rest = segment[segment.len() - rest.len()..]
            .trim_start_matches([':', '=', ' '])
            .trim();
        let rest = rest
            .strip_prefix("is ")
            .or_else(|| rest.strip_prefix("Is "))
            .unwrap_or(rest)
            .trim()
            .trim_matches('"');
        (!rest.is_empty()).then(|| rest.to_string())
    })
}

fn first_email(answer: &str) -> Option<String> {
    answer
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !(c.is_alphanumeric() || c == '@' || c == '.' || c == '_' || c == '-' || c == '+')))
        .map(|t| t.trim_end_matches('.'))
        .find(|t| {
            t.split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                .unwrap_or(false)
        })
        .map(str::to_string)
}
