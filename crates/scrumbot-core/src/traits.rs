//! Seams towards external collaborators.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Dialog, Message};

/// Per-request messenger context. Carried explicitly with each call instead
/// of living in process-wide state, so concurrent requests from different
/// tenants never see each other's domain or token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// e.g. `acme.dooray.com`.
    pub domain: String,
    /// Short-lived command token authorising dialog calls.
    pub cmd_token: String,
}

/// Notification gateway: everything the bot sends to the chat platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a message to a webhook or interaction response URL.
    async fn send(&self, url: &str, channel_id: &str, message: &Message) -> Result<()>;

    /// Open a dialog for the member who triggered `trigger_id`.
    async fn open_dialog(
        &self,
        tenant: &TenantContext,
        channel_id: &str,
        trigger_id: &str,
        dialog: &Dialog,
    ) -> Result<()>;
}
