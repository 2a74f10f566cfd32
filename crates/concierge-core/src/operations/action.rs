//! Action bindings: the invocable unit behind each operation name.

use super::definition::Parameters;
use std::collections::HashMap;
use std::sync::Arc;

/// Fault raised by an action; recorded in the report, never propagated.
pub type ActionFault = Box<dyn std::error::Error + Send + Sync>;

/// What an action reports back: success flag plus a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub succeeded: bool,
    pub message: String,
}

impl ActionOutput {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Trait implemented by every bound operation. The executor only sees this signature.
#[async_trait::async_trait]
pub trait OperationAction: Send + Sync {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault>;
}

/// Adapts a plain function into an [`OperationAction`].
pub struct SyncAction<F>(F);

impl<F> SyncAction<F>
where
    F: Fn(&Parameters) -> Result<ActionOutput, ActionFault> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait::async_trait]
impl<F> OperationAction for SyncAction<F>
where
    F: Fn(&Parameters) -> Result<ActionOutput, ActionFault> + Send + Sync,
{
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        (self.0)(parameters)
    }
}

/// Name → action table. Built once at startup; immutable afterwards.
#[derive(Clone, Default)]
pub struct ActionTable {
    actions: HashMap<String, Arc<dyn OperationAction>>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `action`, replacing any earlier binding.
    pub fn bind(mut self, name: impl Into<String>, action: Arc<dyn OperationAction>) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Merges another table; bindings in `other` win.
    pub fn extend(mut self, other: ActionTable) -> Self {
        self.actions.extend(other.actions);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OperationAction>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
