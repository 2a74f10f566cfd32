use super::{entity_str, handler_name};
use crate::desktop::{DesktopAction, DesktopAutomation};
use concierge_core::{CommandContext, CommandHandler, Entities, HandlerFault};
use std::sync::Arc;

/// Launches the application named by the `app` entity.
pub struct AppLauncherHandler {
    name: String,
    intent: String,
    desktop: Arc<dyn DesktopAutomation>,
}

impl AppLauncherHandler {
    pub const KIND: &'static str = "app_launcher";

    pub fn new(intent: &str, desktop: Arc<dyn DesktopAutomation>) -> Self {
        Self {
            name: handler_name(Self::KIND, intent),
            intent: intent.to_string(),
            desktop,
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for AppLauncherHandler {
    fn name(&self) -> &str {
        &self.name
    }

    /// Claims only its own intent, and only when an app is named.
    fn matches(&self, intent: &str, entities: &Entities, _context: &CommandContext) -> bool {
        intent == self.intent && entity_str(entities, "app").is_some()
    }

    async fn handle(
        &self,
        _command: &str,
        _intent: &str,
        entities: &Entities,
        _context: &CommandContext,
    ) -> Result<String, HandlerFault> {
        let app = entity_str(entities, "app").ok_or("no application named")?;
        self.desktop.perform(DesktopAction::LaunchApp { app }).await
    }
}
