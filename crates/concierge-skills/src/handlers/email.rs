use super::{entity_str, handler_name};
use crate::desktop::{DesktopAction, DesktopAutomation};
use concierge_core::{CommandContext, CommandHandler, Entities, HandlerFault};
use std::sync::Arc;

/// Composes or replies to e-mail. The body defaults to the on-screen content.
pub struct EmailHandler {
    name: String,
    intent: String,
    desktop: Arc<dyn DesktopAutomation>,
}

impl EmailHandler {
    pub const KIND: &'static str = "email";

    pub fn new(intent: &str, desktop: Arc<dyn DesktopAutomation>) -> Self {
        Self {
            name: handler_name(Self::KIND, intent),
            intent: intent.to_string(),
            desktop,
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for EmailHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, intent: &str, entities: &Entities, context: &CommandContext) -> bool {
        intent == self.intent
            || intent.contains("send email")
            || entities.contains_key("email")
            || context.flag("is_email")
    }

    async fn handle(
        &self,
        command: &str,
        _intent: &str,
        entities: &Entities,
        context: &CommandContext,
    ) -> Result<String, HandlerFault> {
        let to = entity_str(entities, "to")
            .or_else(|| entity_str(entities, "email"))
            .or_else(|| context.get_str("sender").map(str::to_string))
            .ok_or("no recipient found")?;
        let subject = entity_str(entities, "subject").unwrap_or_else(|| {
            if command.to_lowercase().contains("reply") {
                "Re:".to_string()
            } else {
                String::new()
            }
        });
        let body = entity_str(entities, "body")
            .or_else(|| context.get_str("screen_content").map(str::to_string))
            .unwrap_or_default();
        self.desktop
            .perform(DesktopAction::ComposeEmail { to, subject, body })
            .await
    }
}
