use super::{entity_str, handler_name};
use crate::desktop::{DesktopAction, DesktopAutomation};
use concierge_core::{CommandContext, CommandHandler, Entities, HandlerFault};
use std::sync::Arc;

pub struct ClipboardHandler {
    name: String,
    intent: String,
    desktop: Arc<dyn DesktopAutomation>,
}

impl ClipboardHandler {
    pub const KIND: &'static str = "clipboard";

    pub fn new(intent: &str, desktop: Arc<dyn DesktopAutomation>) -> Self {
        Self {
            name: handler_name(Self::KIND, intent),
            intent: intent.to_string(),
            desktop,
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for ClipboardHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, intent: &str, _entities: &Entities, _context: &CommandContext) -> bool {
        intent == self.intent || intent.contains("copy") || intent.contains("paste")
    }

    async fn handle(
        &self,
        command: &str,
        _intent: &str,
        entities: &Entities,
        context: &CommandContext,
    ) -> Result<String, HandlerFault> {
        let lower = command.to_lowercase();
        if lower.contains("copy") {
            let text = entity_str(entities, "text")
                .or_else(|| context.get_str("screen_content").map(str::to_string))
                .ok_or("nothing to copy")?;
            self.desktop.perform(DesktopAction::CopyToClipboard { text }).await
        } else if lower.contains("paste") {
            self.desktop.perform(DesktopAction::PasteClipboard).await
        } else {
            Ok("Clipboard action executed".to_string())
        }
    }
}
