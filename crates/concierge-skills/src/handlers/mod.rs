//! Concrete command handlers and their registration tables.

mod app_launcher;
mod browser;
mod clipboard;
mod email;
mod file_ops;
mod window;

pub use app_launcher::AppLauncherHandler;
pub use browser::BrowserHandler;
pub use clipboard::ClipboardHandler;
pub use email::EmailHandler;
pub use file_ops::FileOpsHandler;
pub use window::WindowHandler;

use crate::desktop::DesktopAutomation;
use concierge_core::{CommandHandler, Entities, HandlerFactories};
use std::sync::Arc;

type Constructor = fn(&str, Arc<dyn DesktopAutomation>) -> Arc<dyn CommandHandler>;

fn shared<H: CommandHandler + 'static>(handler: H) -> Arc<dyn CommandHandler> {
    Arc::new(handler)
}

/// Every handler kind, in discovery order.
fn kinds() -> [(&'static str, Constructor); 6] {
    [
        (FileOpsHandler::KIND, |intent: &str, desktop: Arc<dyn DesktopAutomation>| {
            shared(FileOpsHandler::new(intent, desktop))
        }),
        (WindowHandler::KIND, |intent: &str, desktop: Arc<dyn DesktopAutomation>| {
            shared(WindowHandler::new(intent, desktop))
        }),
        (BrowserHandler::KIND, |intent: &str, desktop: Arc<dyn DesktopAutomation>| {
            shared(BrowserHandler::new(intent, desktop))
        }),
        (EmailHandler::KIND, |intent: &str, desktop: Arc<dyn DesktopAutomation>| {
            shared(EmailHandler::new(intent, desktop))
        }),
        (ClipboardHandler::KIND, |intent: &str, desktop: Arc<dyn DesktopAutomation>| {
            shared(ClipboardHandler::new(intent, desktop))
        }),
        (AppLauncherHandler::KIND, |intent: &str, desktop: Arc<dyn DesktopAutomation>| {
            shared(AppLauncherHandler::new(intent, desktop))
        }),
    ]
}

/// Handler kinds usable in `[[handlers]]` config bindings.
pub fn handler_factories(desktop: Arc<dyn DesktopAutomation>) -> HandlerFactories {
    kinds()
        .into_iter()
        .fold(HandlerFactories::new(), |factories, (kind, construct)| {
            let desktop = Arc::clone(&desktop);
            factories.register(kind, move |intent: &str| construct(intent, Arc::clone(&desktop)))
        })
}

/// Handlers appended after the configured ones, each bound to its default intent.
/// The order of this table is the dispatch order.
pub fn discovered_handlers(desktop: Arc<dyn DesktopAutomation>) -> Vec<Arc<dyn CommandHandler>> {
    kinds()
        .into_iter()
        .map(|(kind, construct)| construct(kind, Arc::clone(&desktop)))
        .collect()
}

/// `kind` when bound to its default intent, `kind:intent` otherwise.
fn handler_name(kind: &str, intent: &str) -> String {
    if kind == intent {
        kind.to_string()
    } else {
        format!("{}:{}", kind, intent)
    }
}

fn entity_str(entities: &Entities, key: &str) -> Option<String> {
    entities
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
