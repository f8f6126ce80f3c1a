use reqwest::Client;
use serde::Serialize;
use std::env;
use std::time::Duration;

/// Registration calls that outlive this window are treated as failed
/// and retryable.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct RegisterRequest<'a> {
    event_id: i64,
    user_id: &'a str,
    telegram_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookReply {
    /// Registration accepted and a payment link was issued.
    Paylink(String),
    /// Structured reply without a payment link; the participant row has
    /// to be re-read to learn the real outcome.
    Accepted,
    /// Bare acknowledgement carrying no signal about the registration.
    Ack,
}

/// Client for the external registration workflow. The workflow owns all
/// participant writes; this service never inserts those rows itself.
pub struct RegistrationWebhook {
    client: Client,
    webhook_url: String,
}

impl RegistrationWebhook {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let webhook_url = env::var("REGISTRATION_WEBHOOK_URL")?;
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;

        Ok(RegistrationWebhook { client, webhook_url })
    }

    pub async fn register(
        &self,
        event_id: i64,
        user_id: &str,
        telegram_id: i64,
    ) -> Result<WebhookReply, Box<dyn std::error::Error>> {
        let request = RegisterRequest { event_id, user_id, telegram_id };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(format!("Registration webhook error {}: {}", status, body).into());
        }

        Ok(parse_reply(&body))
    }
}

/// The workflow answers either with a JSON object or with a plain-text
/// acknowledgement ("Accepted"). Only an object can carry a paylink.
pub(crate) fn parse_reply(body: &str) -> WebhookReply {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(reply)) => {
            match reply.get("paylink").and_then(|v| v.as_str()) {
                Some(link) if !link.is_empty() => WebhookReply::Paylink(link.to_string()),
                _ => WebhookReply::Accepted,
            }
        }
        _ => WebhookReply::Ack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paylink_reply_is_detected() {
        let reply = parse_reply(r#"{"paylink": "https://pay.example.com/abc"}"#);
        assert_eq!(reply, WebhookReply::Paylink("https://pay.example.com/abc".to_string()));
    }

    #[test]
    fn structured_reply_without_link_needs_requery() {
        assert_eq!(parse_reply(r#"{"ok": true}"#), WebhookReply::Accepted);
        assert_eq!(parse_reply(r#"{"paylink": ""}"#), WebhookReply::Accepted);
        assert_eq!(parse_reply("{}"), WebhookReply::Accepted);
    }

    #[test]
    fn bare_acknowledgement_is_ambiguous() {
        assert_eq!(parse_reply("Accepted"), WebhookReply::Ack);
        assert_eq!(parse_reply(""), WebhookReply::Ack);
        // A JSON scalar is still not a structured reply.
        assert_eq!(parse_reply(r#""Accepted""#), WebhookReply::Ack);
    }
}
