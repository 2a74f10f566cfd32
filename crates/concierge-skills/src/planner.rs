//! Planners turning a multi-step command into ordered operation requests.

use crate::model_router::ModelRouter;
use concierge_core::{Catalog, OperationPlanner, OperationRequest, PlanError};
use serde::Deserialize;
use std::sync::Arc;

/// Strips a surrounding markdown code fence (```json ... ```) from a model reply.
pub(crate) fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanPayload {
    Listed(Vec<OperationRequest>),
    Wrapped { operations: Vec<OperationRequest> },
}

/// Parses a model reply into requests. Accepts a bare array or `{"operations": [...]}`.
pub fn parse_plan(reply: &str) -> Result<Vec<OperationRequest>, PlanError> {
    let json = strip_code_fences(reply);
    match serde_json::from_str::<PlanPayload>(json) {
        Ok(PlanPayload::Listed(requests)) | Ok(PlanPayload::Wrapped { operations: requests }) => {
            Ok(requests)
        }
        Err(e) => Err(PlanError::Unparseable(e.to_string())),
    }
}

/// Asks the model router for a plan over the current catalog.
pub struct LlmPlanner {
    router: Arc<ModelRouter>,
}

impl LlmPlanner {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }

    fn prompt(query: &str, catalog: &Catalog) -> String {
        let mut listing = String::new();
        for def in catalog.definitions() {
            listing.push_str(&format!(
                "- {} (required: {}; optional: {}): {}\n",
                def.name,
                def.required_parameters.join(", "),
                def.optional_parameters.join(", "),
                def.description
            ));
        }
        format!(
            "Break the user's request into an ordered list of operations.\n\
             Use only these operations:\n{}\n\
             Respond with a JSON array of objects {{\"name\": string, \"parameters\": object}}.\n\
             Only fill in parameter values stated in the request; leave the rest out.\n\n\
             Request: {}",
            listing, query
        )
    }
}

#[async_trait::async_trait]
impl OperationPlanner for LlmPlanner {
    async fn plan(&self, query: &str, catalog: &Catalog) -> Result<Vec<OperationRequest>, PlanError> {
        let reply = self
            .router
            .generate(&Self::prompt(query, catalog))
            .await
            .map_err(|e| PlanError::Backend(e.to_string()))?;
        parse_plan(&reply)
    }
}

/// Plans by spotting catalog operation names in the command, in order of appearance.
/// `create_task` also matches "create task". Parameters are left for the resolver to ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordPlanner;

#[async_trait::async_trait]
impl OperationPlanner for KeywordPlanner {
    async fn plan(&self, query: &str, catalog: &Catalog) -> Result<Vec<OperationRequest>, PlanError> {
        let lower = query.to_lowercase();
        let mut found: Vec<(usize, String)> = catalog
            .definitions()
            .into_iter()
            .filter_map(|def| {
                let spaced = def.name.replace(['_', '.'], " ");
                [lower.find(&def.name.to_lowercase()), lower.find(&spaced.to_lowercase())]
                    .into_iter()
                    .flatten()
                    .min()
                    .map(|at| (at, def.name.clone()))
            })
            .collect();
        found.sort();
        Ok(found
            .into_iter()
            .map(|(_, name)| OperationRequest::new(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_router::LlmMode;
    use concierge_core::{CatalogOrigin, OperationDefinition};

    fn catalog() -> Catalog {
        Catalog::from_definitions(
            vec![
                OperationDefinition::new("create_task").required(["title"]),
                OperationDefinition::new("send_email").required(["to", "subject", "body"]),
                OperationDefinition::new("list_tasks"),
            ],
            CatalogOrigin::Empty,
        )
        .unwrap()
    }

    #[test]
    fn test_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  [] "), "[]");
    }

    #[test]
    fn test_parse_plan_shapes() {
        let listed = parse_plan(
            "```json\n[{\"name\": \"create_task\", \"parameters\": {\"title\": \"Buy milk\"}}, {\"name\": \"list_tasks\"}]\n```",
        )
        .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].parameters["title"], "Buy milk");
        assert!(listed[1].parameters.is_empty());

        let wrapped = parse_plan("{\"operations\": [{\"name\": \"list_tasks\"}]}").unwrap();
        assert_eq!(wrapped[0].name, "list_tasks");

        assert!(matches!(parse_plan("Sure! Here you go."), Err(PlanError::Unparseable(_))));
    }

    #[tokio::test]
    async fn test_keyword_plan_follows_mention_order() {
        let plan = KeywordPlanner
            .plan("complex: send email to bob, then create task and list_tasks", &catalog())
            .await
            .unwrap();
        let names: Vec<&str> = plan.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["send_email", "create_task", "list_tasks"]);
    }

    #[tokio::test]
    async fn test_llm_planner_reports_unparseable_mock_reply() {
        let planner = LlmPlanner::new(Arc::new(ModelRouter::with_mode(LlmMode::Mock)));
        let err = planner.plan("complex stuff", &catalog()).await.unwrap_err();
        assert!(matches!(err, PlanError::Unparseable(_)));
    }
}
