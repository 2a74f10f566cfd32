use super::{required_text, text_param};
use concierge_core::{ActionFault, ActionOutput, OperationAction, Parameters};
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Queue of messages awaiting delivery by an external mail transport.
#[derive(Debug, Default)]
pub struct Outbox {
    queued: Mutex<Vec<OutgoingEmail>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, email: OutgoingEmail) {
        self.queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(email);
    }

    pub fn queued(&self) -> Vec<OutgoingEmail> {
        self.queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

pub struct SendEmail {
    outbox: Arc<Outbox>,
}

impl SendEmail {
    pub fn new(outbox: Arc<Outbox>) -> Self {
        Self { outbox }
    }
}

#[async_trait::async_trait]
impl OperationAction for SendEmail {
    async fn invoke(&self, parameters: &Parameters) -> Result<ActionOutput, ActionFault> {
        let to = required_text(parameters, "to")?;
        if !to.contains('@') {
            return Ok(ActionOutput::failed(format!("Invalid recipient: {}", to)));
        }
        let email = OutgoingEmail {
            to: to.clone(),
            cc: text_param(parameters, "cc"),
            subject: required_text(parameters, "subject")?,
            body: required_text(parameters, "body")?,
        };
        tracing::info!(target: "concierge::actions", to = %email.to, "Email queued");
        self.outbox.push(email);
        Ok(ActionOutput::ok(format!("Email queued for {}", to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_send_email_queues_message() {
        let outbox = Arc::new(Outbox::new());
        let out = SendEmail::new(outbox.clone())
            .invoke(&params(&[
                ("to", "alice@example.com"),
                ("subject", "Lunch"),
                ("body", "hello"),
            ]))
            .await
            .unwrap();
        assert_eq!(out.message, "Email queued for alice@example.com");
        assert_eq!(outbox.queued().len(), 1);
        assert_eq!(outbox.queued()[0].cc, None);
    }

    #[tokio::test]
    async fn test_invalid_recipient_not_queued() {
        let outbox = Arc::new(Outbox::new());
        let out = SendEmail::new(outbox.clone())
            .invoke(&params(&[("to", "alice"), ("subject", "s"), ("body", "b")]))
            .await
            .unwrap();
        assert!(!out.succeeded);
        assert!(outbox.queued().is_empty());
    }
}
