//! Shared types used across all Concierge crates.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rounds the parameter resolver may spend on one batch when the config does not say.
pub const DEFAULT_MAX_PARAMETER_ATTEMPTS: u32 = 3;

/// Seconds a suspended command waits for its next answer before it is cancelled.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// Structured entities extracted from a command by the classifier (e.g. `file`, `url`, `email`).
pub type Entities = serde_json::Map<String, serde_json::Value>;

/// Ambient context attached to one command: what the user is looking at, which app is active, etc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandContext {
    /// Optional correlation id for request tracing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Free-form context values (`active_app`, `screen_content`, `file_type`, `is_email`, ...).
    #[serde(default, flatten)]
    pub values: serde_json::Map<String, serde_json::Value>,
}

impl CommandContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// True when the value is `true`, a non-empty string, or a non-zero number.
    pub fn flag(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(serde_json::Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Static handler configuration: routes `intent` to the handler registered under `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerBinding {
    pub intent: String,
    pub kind: String,
}

/// Global application configuration. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown by the status endpoint.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Local declarative operation catalog (fallback source).
    pub catalog_path: String,
    /// Sled directory used as the primary catalog store.
    #[serde(default)]
    pub catalog_store_path: Option<String>,
    /// HTTP endpoint used as the primary catalog source. Wins over `catalog_store_path`.
    #[serde(default)]
    pub catalog_url: Option<String>,
    /// Root directory for the built-in file actions.
    pub sandbox_path: String,
    /// LLM mode ("mock" or "live").
    pub llm_mode: String,
    /// Rounds of clarification the parameter resolver may spend on one batch.
    pub max_parameter_attempts: u32,
    /// Seconds an unanswered gateway session is kept before it is cancelled.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Handlers bound from configuration, in chain order.
    #[serde(default)]
    pub handlers: Vec<HandlerBinding>,
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Concierge".to_string(),
            port: 8001,
            catalog_path: "knowledge/operations.json".to_string(),
            catalog_store_path: None,
            catalog_url: None,
            sandbox_path: "./data/sandbox".to_string(),
            llm_mode: "mock".to_string(),
            max_parameter_attempts: DEFAULT_MAX_PARAMETER_ATTEMPTS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            handlers: Vec::new(),
        }
    }
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `CONCIERGE_CONFIG` path > `config/concierge` > defaults,
    /// then `CONCIERGE__*` environment overrides.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONCIERGE_CONFIG").unwrap_or_else(|_| "config/concierge".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Concierge")?
            .set_default("port", 8001_i64)?
            .set_default("catalog_path", "knowledge/operations.json")?
            .set_default("sandbox_path", "./data/sandbox")?
            .set_default("llm_mode", "mock")?
            .set_default("max_parameter_attempts", i64::from(DEFAULT_MAX_PARAMETER_ATTEMPTS))?
            .set_default("session_ttl_secs", DEFAULT_SESSION_TTL_SECS as i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder.add_source(config::File::with_name(&config_path).required(false))
        };

        let built = builder
            .add_source(config::Environment::with_prefix("CONCIERGE").separator("__"))
            .build()?;

        let mut loaded: Self = built.try_deserialize()?;
        loaded.max_parameter_attempts = loaded.max_parameter_attempts.max(1);
        Ok(loaded)
    }

    /// Resolver rounds as `usize`, never zero.
    pub fn parameter_attempts(&self) -> usize {
        self.max_parameter_attempts.max(1) as usize
    }

    /// Session lifetime, never below one second.
    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_ttl_secs.max(1))
    }

    pub fn is_live_llm(&self) -> bool {
        self.llm_mode.eq_ignore_ascii_case("live")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_flag_semantics() {
        let ctx = CommandContext::new()
            .with_value("is_email", true)
            .with_value("file_type", "pdf")
            .with_value("blank", "  ")
            .with_value("count", 0);
        assert!(ctx.flag("is_email"));
        assert!(ctx.flag("file_type"));
        assert!(!ctx.flag("blank"));
        assert!(!ctx.flag("count"));
        assert!(!ctx.flag("missing"));
    }

    #[test]
    fn test_context_deserializes_flattened_values() {
        let ctx: CommandContext = serde_json::from_value(serde_json::json!({
            "correlation_id": "abc",
            "active_app": "Chrome"
        }))
        .unwrap();
        assert_eq!(ctx.correlation_id.as_deref(), Some("abc"));
        assert_eq!(ctx.get_str("active_app"), Some("Chrome"));
        assert!(ctx.get("correlation_id").is_none());
    }

    #[test]
    fn test_load_reads_toml_file_and_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concierge.toml");
        std::fs::write(
            &path,
            r#"
app_name = "Desk Assistant"
port = 9100
max_parameter_attempts = 0

[[handlers]]
intent = "file_ops"
kind = "file_ops"

[[handlers]]
intent = "browser_control"
kind = "browser"
"#,
        )
        .unwrap();
        std::env::set_var("CONCIERGE_CONFIG", &path);
        let config = CoreConfig::load().unwrap();
        std::env::remove_var("CONCIERGE_CONFIG");

        assert_eq!(config.app_name, "Desk Assistant");
        assert_eq!(config.port, 9100);
        assert_eq!(config.catalog_path, "knowledge/operations.json");
        assert_eq!(config.max_parameter_attempts, 1);
        assert_eq!(config.handlers.len(), 2);
        assert_eq!(config.handlers[1].kind, "browser");
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
    }

    #[test]
    fn test_session_ttl_never_zero() {
        let config = CoreConfig {
            session_ttl_secs: 0,
            ..CoreConfig::default()
        };
        assert_eq!(config.session_ttl(), std::time::Duration::from_secs(1));
    }
}
