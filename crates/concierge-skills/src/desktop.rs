//! Desktop side effects requested by command handlers.

use concierge_core::HandlerFault;
use std::fmt;
use std::sync::Mutex;

/// One concrete thing to do on the user's machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopAction {
    OpenFile { path: String },
    CopyFile { from: String, to: String },
    MinimizeWindow { app: String },
    MaximizeWindow { app: String },
    SwitchWindow { app: String },
    OpenUrl { url: String },
    WebSearch { query: String },
    ComposeEmail { to: String, subject: String, body: String },
    CopyToClipboard { text: String },
    PasteClipboard,
    LaunchApp { app: String },
}

impl fmt::Display for DesktopAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFile { path } => write!(f, "open file {}", path),
            Self::CopyFile { from, to } => write!(f, "copy {} to {}", from, to),
            Self::MinimizeWindow { app } => write!(f, "minimize {}", app),
            Self::MaximizeWindow { app } => write!(f, "maximize {}", app),
            Self::SwitchWindow { app } => write!(f, "switch to {}", app),
            Self::OpenUrl { url } => write!(f, "open {}", url),
            Self::WebSearch { query } => write!(f, "search the web for {}", query),
            Self::ComposeEmail { to, .. } => write!(f, "compose email to {}", to),
            Self::CopyToClipboard { .. } => f.write_str("copy to clipboard"),
            Self::PasteClipboard => f.write_str("paste clipboard"),
            Self::LaunchApp { app } => write!(f, "launch {}", app),
        }
    }
}

/// Performs desktop actions. Returns the message shown to the user.
#[async_trait::async_trait]
pub trait DesktopAutomation: Send + Sync {
    async fn perform(&self, action: DesktopAction) -> Result<String, HandlerFault>;
}

/// Logs and records actions without touching the machine. Keeps an in-memory clipboard.
#[derive(Debug, Default)]
pub struct DryRunDesktop {
    performed: Mutex<Vec<DesktopAction>>,
    clipboard: Mutex<String>,
}

impl DryRunDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions performed so far, oldest first.
    pub fn performed(&self) -> Vec<DesktopAction> {
        match self.performed.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn clipboard(&self) -> std::sync::MutexGuard<'_, String> {
        self.clipboard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl DesktopAutomation for DryRunDesktop {
    async fn perform(&self, action: DesktopAction) -> Result<String, HandlerFault> {
        tracing::info!(target: "concierge::desktop", action = %action, "Dry-run desktop action");
        let message = match &action {
            DesktopAction::OpenFile { path } => format!("Opened file {}", path),
            DesktopAction::CopyFile { to, .. } => format!("Copied file to {}", to),
            DesktopAction::MinimizeWindow { app } => format!("Minimized {}", app),
            DesktopAction::MaximizeWindow { app } => format!("Maximized {}", app),
            DesktopAction::SwitchWindow { app } => format!("Switched to {}", app),
            DesktopAction::OpenUrl { url } => format!("Opened {}", url),
            DesktopAction::WebSearch { query } => format!("Searched for {}", query),
            DesktopAction::ComposeEmail { to, .. } => format!("Email drafted to {}", to),
            DesktopAction::CopyToClipboard { text } => {
                *self.clipboard() = text.clone();
                "Copied to clipboard".to_string()
            }
            DesktopAction::PasteClipboard => format!("Pasted: {}", self.clipboard()),
            DesktopAction::LaunchApp { app } => format!("Launched {}", app),
        };
        self.performed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(action);
        Ok(message)
    }
}
