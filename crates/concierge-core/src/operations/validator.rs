//! Checks a proposed call against its catalog contract.

use super::catalog::Catalog;
use super::definition::Parameters;
use super::error::OperationError;

/// Result of validating one `(name, parameters)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// Fatal for the request: [`OperationError::UnknownOperation`] or
    /// [`OperationError::InvalidParameterSet`] (which carries the unknown keys).
    Invalid(OperationError),
    /// Recoverable: required parameters not supplied yet, in contract order.
    MissingRequired(Vec<String>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Unrecognized parameter keys, when the outcome is an invalid parameter set.
    pub fn unknown_parameters(&self) -> &[String] {
        match self {
            Self::Invalid(OperationError::InvalidParameterSet { unknown, .. }) => unknown,
            _ => &[],
        }
    }
}

/// Rules, in order: unknown operation → unknown parameter keys → missing required → valid.
/// Unknown keys are rejected rather than dropped so upstream planning mistakes surface.
pub fn validate(catalog: &Catalog, name: &str, parameters: &Parameters) -> ValidationOutcome {
    let Some(def) = catalog.get(name) else {
        return ValidationOutcome::Invalid(OperationError::UnknownOperation(name.to_string()));
    };

    let unknown: Vec<String> = parameters
        .keys()
        .filter(|key| !def.accepts(key))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return ValidationOutcome::Invalid(OperationError::InvalidParameterSet {
            operation: name.to_string(),
            unknown,
            valid: def.all_parameters(),
        });
    }

    let missing: Vec<String> = def
        .required_parameters
        .iter()
        .filter(|param| !parameters.contains_key(param.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return ValidationOutcome::MissingRequired(missing);
    }

    ValidationOutcome::Valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::catalog::CatalogOrigin;
    use crate::operations::definition::OperationDefinition;

    fn catalog() -> Catalog {
        Catalog::from_definitions(
            vec![
                OperationDefinition::new("create_task")
                    .required(["title"])
                    .optional(["due", "notes"]),
                OperationDefinition::new("send_email")
                    .required(["to", "subject", "body"])
                    .optional(["cc"]),
            ],
            CatalogOrigin::Empty,
        )
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    #[test]
    fn test_unknown_operation_is_invalid() {
        let outcome = validate(&catalog(), "unknown_op", &Parameters::new());
        assert_eq!(
            outcome,
            ValidationOutcome::Invalid(OperationError::UnknownOperation("unknown_op".into()))
        );
    }

    #[test]
    fn test_unknown_parameter_rejected_before_missing_check() {
        // "recipient" is a typo for "to"; the missing-required rule must not run first.
        let outcome = validate(&catalog(), "send_email", &params(&[("recipient", "a@b.c")]));
        assert_eq!(outcome.unknown_parameters(), ["recipient".to_string()]);
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid(OperationError::InvalidParameterSet { .. })
        ));
    }

    #[test]
    fn test_missing_required_in_contract_order() {
        let outcome = validate(&catalog(), "send_email", &params(&[("subject", "Hi")]));
        assert_eq!(
            outcome,
            ValidationOutcome::MissingRequired(vec!["to".into(), "body".into()])
        );
    }

    #[test]
    fn test_required_plus_any_optional_subset_is_valid() {
        let catalog = catalog();
        for extra in [vec![], vec![("due", "friday")], vec![("due", "friday"), ("notes", "2%")]] {
            let mut pairs = vec![("title", "Buy milk")];
            pairs.extend(extra);
            assert!(validate(&catalog, "create_task", &params(&pairs)).is_valid());
        }
    }

    #[test]
    fn test_validation_is_idempotent() {
        let catalog = catalog();
        let p = params(&[("subject", "Hi"), ("bogus", "x")]);
        assert_eq!(
            validate(&catalog, "send_email", &p),
            validate(&catalog, "send_email", &p)
        );
    }
}
