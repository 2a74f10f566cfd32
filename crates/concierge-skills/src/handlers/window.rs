use super::{entity_str, handler_name};
use crate::desktop::{DesktopAction, DesktopAutomation};
use concierge_core::{CommandContext, CommandHandler, Entities, HandlerFault};
use std::sync::Arc;

const WINDOW_VERBS: [&str; 3] = ["minimize", "maximize", "switch"];

/// Minimizes, maximizes or switches the active application's window.
pub struct WindowHandler {
    name: String,
    intent: String,
    desktop: Arc<dyn DesktopAutomation>,
}

impl WindowHandler {
    pub const KIND: &'static str = "window_management";

    pub fn new(intent: &str, desktop: Arc<dyn DesktopAutomation>) -> Self {
        Self {
            name: handler_name(Self::KIND, intent),
            intent: intent.to_string(),
            desktop,
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for WindowHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, intent: &str, _entities: &Entities, _context: &CommandContext) -> bool {
        let intent_lower = intent.to_lowercase();
        intent == self.intent
            || intent_lower.contains("window")
            || WINDOW_VERBS.iter().any(|verb| intent_lower.contains(verb))
    }

    async fn handle(
        &self,
        command: &str,
        _intent: &str,
        entities: &Entities,
        context: &CommandContext,
    ) -> Result<String, HandlerFault> {
        let app = context
            .get_str("active_app")
            .unwrap_or("Unknown Application")
            .to_string();
        let lower = command.to_lowercase();
        let action = if lower.contains("minimize") {
            DesktopAction::MinimizeWindow { app }
        } else if lower.contains("maximize") {
            DesktopAction::MaximizeWindow { app }
        } else if lower.contains("switch") {
            DesktopAction::SwitchWindow {
                app: entity_str(entities, "app").unwrap_or(app),
            }
        } else {
            return Ok("Window action executed".to_string());
        };
        self.desktop.perform(action).await
    }
}
