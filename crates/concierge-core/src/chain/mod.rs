//! Intent router: an ordered, immutable list of command handlers. First match wins.

use crate::shared::{CommandContext, Entities, HandlerBinding};
use serde::Serialize;
use std::sync::Arc;

/// Fault raised by a handler while servicing a command.
pub type HandlerFault = Box<dyn std::error::Error + Send + Sync>;

/// A unit that may claim responsibility for a classified command.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handler name for logs and status listings.
    fn name(&self) -> &str;

    /// Whether this handler claims the command. Must be side-effect free.
    fn matches(&self, intent: &str, entities: &Entities, context: &CommandContext) -> bool;

    async fn handle(
        &self,
        command: &str,
        intent: &str,
        entities: &Entities,
        context: &CommandContext,
    ) -> Result<String, HandlerFault>;
}

/// What the claiming handler produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerReply {
    pub handler: String,
    pub message: String,
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled(HandlerReply),
    Unmatched,
}

/// Built once at startup; replaced wholesale, never mutated in place.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn CommandHandler>>,
}

impl HandlerChain {
    pub fn new(handlers: Vec<Arc<dyn CommandHandler>>) -> Self {
        Self { handlers }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in dispatch order.
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    /// Walks the chain in order; the first handler whose `matches` is true services the
    /// command and no later handler is consulted. A handler fault becomes a failed reply.
    pub async fn dispatch(
        &self,
        command: &str,
        intent: &str,
        entities: &Entities,
        context: &CommandContext,
    ) -> Dispatch {
        let Some(handler) = self
            .handlers
            .iter()
            .find(|h| h.matches(intent, entities, context))
        else {
            tracing::debug!(target: "concierge::chain", intent, "No handler matched");
            return Dispatch::Unmatched;
        };

        tracing::info!(target: "concierge::chain", handler = handler.name(), intent, "Handler claimed command");
        let reply = match handler.handle(command, intent, entities, context).await {
            Ok(message) => HandlerReply {
                handler: handler.name().to_string(),
                message,
                succeeded: true,
            },
            Err(e) => {
                tracing::warn!(
                    target: "concierge::chain",
                    handler = handler.name(),
                    error = %e,
                    "Handler failed"
                );
                HandlerReply {
                    handler: handler.name().to_string(),
                    message: format!("Error in {}: {}", handler.name(), e),
                    succeeded: false,
                }
            }
        };
        Dispatch::Handled(reply)
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

/// Builds a handler for the configured intent.
pub type HandlerFactory = Arc<dyn Fn(&str) -> Arc<dyn CommandHandler> + Send + Sync>;

/// Explicit registration table: handler kind → factory. Lookup order is insertion order.
#[derive(Clone, Default)]
pub struct HandlerFactories {
    entries: Vec<(String, HandlerFactory)>,
}

impl HandlerFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kind`; a later registration of the same kind replaces the factory in place.
    pub fn register<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn CommandHandler> + Send + Sync + 'static,
    {
        let kind = kind.into();
        let factory: HandlerFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((kind, factory)),
        }
        self
    }

    pub fn get(&self, kind: &str) -> Option<HandlerFactory> {
        self.entries
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, factory)| Arc::clone(factory))
    }

    pub fn kinds(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

/// Assembles a [`HandlerChain`]: config-declared handlers first in declaration order,
/// then discovered handlers in table order, regardless of call order on the builder.
pub struct HandlerChainBuilder {
    factories: HandlerFactories,
    configured: Vec<Arc<dyn CommandHandler>>,
    discovered: Vec<Arc<dyn CommandHandler>>,
}

impl HandlerChainBuilder {
    pub fn new(factories: HandlerFactories) -> Self {
        Self {
            factories,
            configured: Vec::new(),
            discovered: Vec::new(),
        }
    }

    /// Adds one config binding. Unknown kinds are logged and skipped.
    pub fn bind(mut self, binding: &HandlerBinding) -> Self {
        match self.factories.get(&binding.kind) {
            Some(factory) => self.configured.push(factory(binding.intent.as_str())),
            None => tracing::warn!(
                target: "concierge::chain",
                kind = %binding.kind,
                intent = %binding.intent,
                "Unknown handler kind in configuration, skipped"
            ),
        }
        self
    }

    pub fn bindings<'a>(self, bindings: impl IntoIterator<Item = &'a HandlerBinding>) -> Self {
        bindings.into_iter().fold(self, |builder, binding| builder.bind(binding))
    }

    pub fn discovered(mut self, handlers: impl IntoIterator<Item = Arc<dyn CommandHandler>>) -> Self {
        self.discovered.extend(handlers);
        self
    }

    /// Configured handlers first, then discovered ones whose name is not already bound.
    pub fn build(self) -> HandlerChain {
        let mut handlers = self.configured;
        for handler in self.discovered {
            if handlers.iter().any(|bound| bound.name() == handler.name()) {
                tracing::debug!(
                    target: "concierge::chain",
                    handler = handler.name(),
                    "Discovered handler already configured, skipped"
                );
                continue;
            }
            handlers.push(handler);
        }
        tracing::info!(
            target: "concierge::chain",
            handlers = handlers.len(),
            "Handler chain built"
        );
        HandlerChain::new(handlers)
    }
}
