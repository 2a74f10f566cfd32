use super::{entity_str, handler_name};
use crate::desktop::{DesktopAction, DesktopAutomation};
use concierge_core::{CommandContext, CommandHandler, Entities, HandlerFault};
use std::sync::Arc;

/// Opens or copies files named by the `file` entity.
pub struct FileOpsHandler {
    name: String,
    intent: String,
    desktop: Arc<dyn DesktopAutomation>,
}

impl FileOpsHandler {
    pub const KIND: &'static str = "file_ops";

    pub fn new(intent: &str, desktop: Arc<dyn DesktopAutomation>) -> Self {
        Self {
            name: handler_name(Self::KIND, intent),
            intent: intent.to_string(),
            desktop,
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for FileOpsHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, intent: &str, entities: &Entities, context: &CommandContext) -> bool {
        intent == self.intent || entities.contains_key("file") || context.flag("file_type")
    }

    async fn handle(
        &self,
        command: &str,
        _intent: &str,
        entities: &Entities,
        _context: &CommandContext,
    ) -> Result<String, HandlerFault> {
        let lower = command.to_lowercase();
        if lower.contains("open") {
            let path = entity_str(entities, "file").ok_or("no file named in the command")?;
            self.desktop.perform(DesktopAction::OpenFile { path }).await
        } else if lower.contains("copy") {
            let from = entity_str(entities, "file").ok_or("no file named in the command")?;
            let to = entity_str(entities, "dest").ok_or("no copy destination given")?;
            self.desktop.perform(DesktopAction::CopyFile { from, to }).await
        } else {
            Ok("File operation executed".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::DryRunDesktop;

    fn entities(pairs: &[(&str, &str)]) -> Entities {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    #[test]
    fn test_matches_on_intent_entity_or_context() {
        let handler = FileOpsHandler::new("file_ops", Arc::new(DryRunDesktop::new()));
        let ctx = CommandContext::new();
        assert!(handler.matches("file_ops", &Entities::new(), &ctx));
        assert!(handler.matches("automation", &entities(&[("file", "a.txt")]), &ctx));
        assert!(handler.matches(
            "automation",
            &Entities::new(),
            &CommandContext::new().with_value("file_type", "pdf")
        ));
        assert!(!handler.matches("automation", &Entities::new(), &ctx));
    }

    #[tokio::test]
    async fn test_open_and_copy() {
        let desktop = Arc::new(DryRunDesktop::new());
        let handler = FileOpsHandler::new("file_ops", desktop.clone());
        let ctx = CommandContext::new();

        let msg = handler
            .handle("open report.pdf", "automation", &entities(&[("file", "report.pdf")]), &ctx)
            .await
            .unwrap();
        assert_eq!(msg, "Opened file report.pdf");

        let msg = handler
            .handle(
                "copy report.pdf",
                "automation",
                &entities(&[("file", "report.pdf"), ("dest", "backup/")]),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(msg, "Copied file to backup/");
        assert_eq!(desktop.performed().len(), 2);
    }

    #[tokio::test]
    async fn test_open_without_file_is_a_fault() {
        let handler = FileOpsHandler::new("file_ops", Arc::new(DryRunDesktop::new()));
        let err = handler
            .handle("open it", "file_ops", &Entities::new(), &CommandContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no file named in the command");
    }
}
