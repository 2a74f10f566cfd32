//! Keyword classifier: lower-cased keyword routing plus light entity extraction.

use concierge_core::{Classification, Entities, IntentClassifier, COMPLEX_INTENT};

const AUTOMATION_KEYWORDS: [&str; 5] = ["open", "change", "reject", "order", "shut down"];
const QUERY_KEYWORDS: [&str; 3] = ["read", "summarize", "what"];
const WINDOW_KEYWORDS: [&str; 3] = ["minimize", "maximize", "switch to"];
const LAUNCH_PREFIXES: [&str; 3] = ["launch ", "start ", "open app "];

/// Deterministic, rule-based [`IntentClassifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_command(&self, command: &str) -> Classification {
        let entities = extract_entities(command);
        let intent = intent_for(command, &entities);
        if intent == "unknown" && !command.trim().is_empty() {
            tracing::debug!(target: "concierge::classifier", command, "Unrecognized command");
        }
        Classification {
            intent: intent.to_string(),
            entities,
        }
    }
}

#[async_trait::async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, command: &str) -> Classification {
        self.classify_command(command)
    }
}

fn intent_for(command: &str, entities: &Entities) -> &'static str {
    let lower = command.trim().to_lowercase();
    if lower.is_empty() {
        return "unknown";
    }
    let has = |keyword: &str| lower.contains(keyword);

    if has("complex") {
        COMPLEX_INTENT
    } else if WINDOW_KEYWORDS.iter().any(|k| has(k)) {
        "window_management"
    } else if has("clipboard") || ((has("copy") || has("paste")) && !entities.contains_key("file")) {
        "clipboard"
    } else if LAUNCH_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        "app_launcher"
    } else if AUTOMATION_KEYWORDS.iter().any(|k| has(k)) {
        if has("summarize") && has("http") {
            "web_summary"
        } else {
            "automation"
        }
    } else if has("copy") {
        "automation"
    } else if QUERY_KEYWORDS.iter().any(|k| has(k)) {
        "query"
    } else if has("search for") {
        "search"
    } else if has("reply to this") {
        "email_reply"
    } else {
        "unknown"
    }
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '!' | '?' | '(' | ')' | '<' | '>' | '"' | '\''))
        .trim_end_matches('.')
}

fn is_url(token: &str) -> bool {
    token.starts_with("http://") || token.starts_with("https://")
}

fn is_email(token: &str) -> bool {
    match token.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

fn is_file_name(token: &str) -> bool {
    if is_url(token) || is_email(token) {
        return false;
    }
    match token.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Text following `marker` (ASCII case-insensitive), trimmed.
fn text_after(command: &str, marker: &str) -> Option<String> {
    let lower = command.to_ascii_lowercase();
    let at = lower.find(marker)?;
    let rest = trim_token(command[at + marker.len()..].trim());
    (!rest.is_empty()).then(|| rest.to_string())
}

fn extract_entities(command: &str) -> Entities {
    let mut entities = Entities::new();
    let tokens: Vec<&str> = command.split_whitespace().map(trim_token).collect();

    if let Some(url) = tokens.iter().find(|t| is_url(t)) {
        entities.insert("url".into(), (*url).into());
    }
    if let Some(email) = tokens.iter().find(|t| is_email(t)) {
        entities.insert("email".into(), (*email).into());
    }

    let quoted = command
        .split('"')
        .nth(1)
        .map(str::trim)
        .filter(|q| !q.is_empty() && command.matches('"').count() >= 2);
    let file = quoted.or_else(|| tokens.iter().copied().find(|t| is_file_name(t)));
    if let Some(file) = file {
        entities.insert("file".into(), file.into());
        if command.to_ascii_lowercase().contains("copy") {
            if let Some(dest) = command
                .to_ascii_lowercase()
                .rfind(" to ")
                .map(|at| trim_token(command[at + 4..].trim()).to_string())
                .filter(|d| !d.is_empty() && d != file)
            {
                entities.insert("dest".into(), dest.into());
            }
        }
    }

    if let Some(query) = text_after(command, "search for") {
        entities.insert("query".into(), query.into());
    }
    let app = LAUNCH_PREFIXES
        .iter()
        .filter(|p| command.trim().to_ascii_lowercase().starts_with(*p))
        .find_map(|p| text_after(command.trim(), p.trim_end()))
        .or_else(|| text_after(command, "switch to"));
    if let Some(app) = app {
        entities.insert("app".into(), app.into());
    }
    entities
}
