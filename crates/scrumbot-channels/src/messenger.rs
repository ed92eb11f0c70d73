//! Dooray messenger channel: webhook posting + dialog opening via the
//! tenant's messenger API.

use async_trait::async_trait;
use scrumbot_core::config::MessengerConfig;
use scrumbot_core::error::{Result, ScrumError};
use scrumbot_core::message::{Dialog, Message};
use scrumbot_core::traits::{Notifier, TenantContext};
use serde::Serialize;

/// Webhook body: the message with the target channel id merged in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    channel_id: &'a str,
    #[serde(flatten)]
    message: &'a Message,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DialogRequest<'a> {
    trigger_id: &'a str,
    dialog: &'a Dialog,
}

/// HTTP client for the messenger.
pub struct MessengerClient {
    client: reqwest::Client,
    config: MessengerConfig,
}

impl MessengerClient {
    pub fn new(config: MessengerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.timeout_secs)
    }

    /// `https://{domain}/messenger/api/channels/{id}/dialogs`.
    fn dialog_url(&self, domain: &str, channel_id: &str) -> String {
        format!(
            "{}://{}/messenger/api/channels/{}/dialogs",
            self.config.api_scheme, domain, channel_id
        )
    }

    async fn check_response(resp: reqwest::Response, what: &str) -> Result<()> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ScrumError::Notify(format!("{what} error {status}: {body}")));
        }
        // Webhooks may answer with an empty body; only a parsed header can fail us.
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) => check_api_result(&json).map_err(|e| ScrumError::Notify(format!("{what}: {e}"))),
            Err(_) => Ok(()),
        }
    }
}

/// The messenger reports failures in a `header` envelope even on HTTP 200.
fn check_api_result(json: &serde_json::Value) -> std::result::Result<(), String> {
    match json["header"]["isSuccessful"].as_bool() {
        Some(false) => Err(json["header"]["resultMessage"]
            .as_str()
            .unwrap_or("unsuccessful")
            .to_string()),
        _ => Ok(()),
    }
}

#[async_trait]
impl Notifier for MessengerClient {
    async fn send(&self, url: &str, channel_id: &str, message: &Message) -> Result<()> {
        let resp = self
            .client
            .post(url)
            .json(&WebhookPayload {
                channel_id,
                message,
            })
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| ScrumError::Notify(format!("Webhook send failed: {e}")))?;

        Self::check_response(resp, "Webhook").await?;
        tracing::debug!("✅ Message sent to channel {}: {}", channel_id, message.text);
        Ok(())
    }

    async fn open_dialog(
        &self,
        tenant: &TenantContext,
        channel_id: &str,
        trigger_id: &str,
        dialog: &Dialog,
    ) -> Result<()> {
        let resp = self
            .client
            .post(self.dialog_url(&tenant.domain, channel_id))
            .header("token", &tenant.cmd_token)
            .json(&DialogRequest { trigger_id, dialog })
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| ScrumError::Notify(format!("Dialog open failed: {e}")))?;

        Self::check_response(resp, "Dialog API").await?;
        tracing::debug!("🗒️ Dialog '{}' opened in channel {}", dialog.callback_id, channel_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrumbot_core::message::Visibility;

    #[test]
    fn test_webhook_payload_merges_channel_id() {
        let msg = Message::text("hi").visibility(Visibility::Ephemeral);
        let json = serde_json::to_value(WebhookPayload {
            channel_id: "123",
            message: &msg,
        })
        .unwrap();
        assert_eq!(json["channelId"], "123");
        assert_eq!(json["text"], "hi");
        assert_eq!(json["responseType"], "ephemeral");
    }

    #[test]
    fn test_dialog_url_uses_request_domain() {
        let client = MessengerClient::new(MessengerConfig::default());
        assert_eq!(
            client.dialog_url("acme.dooray.com", "77"),
            "https://acme.dooray.com/messenger/api/channels/77/dialogs"
        );
    }

    #[test]
    fn test_check_api_result() {
        let ok = serde_json::json!({"header": {"isSuccessful": true}});
        assert!(check_api_result(&ok).is_ok());

        let failed = serde_json::json!({
            "header": {"isSuccessful": false, "resultMessage": "invalid trigger"}
        });
        assert_eq!(check_api_result(&failed).unwrap_err(), "invalid trigger");

        // No envelope at all is fine.
        assert!(check_api_result(&serde_json::json!({})).is_ok());
    }

    #[tokio::test]
    async fn test_send_to_unreachable_url_fails() {
        let client = MessengerClient::new(MessengerConfig {
            timeout_secs: 1,
            ..Default::default()
        });
        let err = client
            .send("http://127.0.0.1:1/hook", "1", &Message::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrumError::Notify(_)));
    }
}
