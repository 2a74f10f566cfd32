use super::{entity_str, handler_name};
use crate::desktop::{DesktopAction, DesktopAutomation};
use concierge_core::{CommandContext, CommandHandler, Entities, HandlerFault};
use std::sync::Arc;

/// Web searches and URL opening.
pub struct BrowserHandler {
    name: String,
    intent: String,
    desktop: Arc<dyn DesktopAutomation>,
}

impl BrowserHandler {
    pub const KIND: &'static str = "browser_control";

    pub fn new(intent: &str, desktop: Arc<dyn DesktopAutomation>) -> Self {
        Self {
            name: handler_name(Self::KIND, intent),
            intent: intent.to_string(),
            desktop,
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for BrowserHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, intent: &str, entities: &Entities, context: &CommandContext) -> bool {
        intent == self.intent
            || entities.contains_key("url")
            || context
                .get_str("active_app")
                .map(|app| app.eq_ignore_ascii_case("chrome"))
                .unwrap_or(false)
    }

    async fn handle(
        &self,
        command: &str,
        _intent: &str,
        entities: &Entities,
        _context: &CommandContext,
    ) -> Result<String, HandlerFault> {
        let lower = command.to_ascii_lowercase();
        if lower.contains("search") {
            let query = entity_str(entities, "query")
                .or_else(|| {
                    lower
                        .find("search for")
                        .map(|at| command[at + "search for".len()..].trim().to_string())
                        .filter(|q| !q.is_empty())
                })
                .ok_or("nothing to search for")?;
            self.desktop.perform(DesktopAction::WebSearch { query }).await
        } else if lower.contains("open") {
            let url = entity_str(entities, "url").ok_or("no URL in the command")?;
            self.desktop.perform(DesktopAction::OpenUrl { url }).await
        } else {
            Ok("Browser action executed".to_string())
        }
    }
}
