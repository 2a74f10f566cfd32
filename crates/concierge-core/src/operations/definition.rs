//! Operation contracts and the per-turn requests checked against them.

use super::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Parameter values of one request, keyed by parameter name.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// A named operation and the parameters it accepts.
///
/// Serialized form matches one catalog entry:
/// `{ "name", "required_parameters", "optional_parameters", "description" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub name: String,
    #[serde(default)]
    pub required_parameters: Vec<String>,
    #[serde(default)]
    pub optional_parameters: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl OperationDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_parameters: Vec::new(),
            optional_parameters: Vec::new(),
            description: String::new(),
        }
    }

    pub fn required<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_parameters = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn optional<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_parameters = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether `param` is part of the contract (required or optional).
    pub fn accepts(&self, param: &str) -> bool {
        self.required_parameters.iter().any(|p| p == param)
            || self.optional_parameters.iter().any(|p| p == param)
    }

    /// Required then optional parameter names, in declaration order.
    pub fn all_parameters(&self) -> Vec<String> {
        self.required_parameters
            .iter()
            .chain(self.optional_parameters.iter())
            .cloned()
            .collect()
    }

    /// Checks the entry invariants: non-empty name, no repeated names, required ∩ optional = ∅.
    pub fn check(&self) -> Result<(), CatalogError> {
        let malformed = |reason: String| CatalogError::Malformed {
            name: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(malformed("empty operation name".to_string()));
        }
        let mut seen = HashSet::new();
        for param in self.all_parameters() {
            if param.trim().is_empty() {
                return Err(malformed("empty parameter name".to_string()));
            }
            if !seen.insert(param.clone()) {
                return Err(malformed(format!(
                    "parameter '{}' declared more than once or both required and optional",
                    param
                )));
            }
        }
        Ok(())
    }
}

/// One planned call: an operation name plus the parameters supplied so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub name: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_rejects_overlap_between_required_and_optional() {
        let def = OperationDefinition::new("send_email")
            .required(["to", "subject"])
            .optional(["subject"]);
        assert!(matches!(def.check(), Err(CatalogError::Malformed { .. })));
    }

    #[test]
    fn test_check_rejects_blank_name() {
        assert!(OperationDefinition::new("  ").check().is_err());
        assert!(OperationDefinition::new("get_time").check().is_ok());
    }

    #[test]
    fn test_entry_defaults_when_fields_absent() {
        let def: OperationDefinition =
            serde_json::from_value(serde_json::json!({ "name": "list_tasks" })).unwrap();
        assert!(def.required_parameters.is_empty());
        assert!(def.optional_parameters.is_empty());
        assert_eq!(def.description, "");
    }

    #[test]
    fn test_request_parameters_default_to_empty() {
        let req: OperationRequest =
            serde_json::from_value(serde_json::json!({ "name": "get_time" })).unwrap();
        assert!(req.parameters.is_empty());
    }
}
