//! In-memory `Notifier` double for tests.

use async_trait::async_trait;
use scrumbot_core::error::{Result, ScrumError};
use scrumbot_core::message::{Dialog, Message};
use scrumbot_core::traits::{Notifier, TenantContext};
use std::sync::Mutex;
use std::time::Duration;

/// Records everything sent; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, Message)>>,
    dialogs: Mutex<Vec<(TenantContext, String, String, Dialog)>>,
    /// Sends succeed this many times, then fail.
    fail_after: Option<usize>,
    /// Sends to URLs containing one of these always fail.
    fail_urls: Vec<String>,
    /// Sends to URLs containing the fragment stall this long first.
    delay: Option<(String, Duration)>,
}

impl RecordingNotifier {
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Default::default()
        }
    }

    pub fn failing_for(url_fragment: &str) -> Self {
        Self {
            fail_urls: vec![url_fragment.to_string()],
            ..Default::default()
        }
    }

    pub fn delayed_for(url_fragment: &str, delay: Duration) -> Self {
        Self {
            delay: Some((url_fragment.to_string(), delay)),
            ..Default::default()
        }
    }

    /// `(url, channel_id, message)` in send order.
    pub fn sent(&self) -> Vec<(String, String, Message)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// `(tenant, channel_id, trigger_id, dialog)` in open order.
    pub fn dialogs(&self) -> Vec<(TenantContext, String, String, Dialog)> {
        self.dialogs.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, url: &str, channel_id: &str, message: &Message) -> Result<()> {
        if let Some((fragment, delay)) = &self.delay {
            if url.contains(fragment.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if self.fail_urls.iter().any(|f| url.contains(f.as_str())) {
            return Err(ScrumError::Notify(format!("unreachable: {url}")));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| ScrumError::Notify(format!("Lock: {e}")))?;
        if self.fail_after.is_some_and(|n| sent.len() >= n) {
            return Err(ScrumError::Notify("send quota exhausted".into()));
        }
        sent.push((url.to_string(), channel_id.to_string(), message.clone()));
        Ok(())
    }

    async fn open_dialog(
        &self,
        tenant: &TenantContext,
        channel_id: &str,
        trigger_id: &str,
        dialog: &Dialog,
    ) -> Result<()> {
        self.dialogs
            .lock()
            .map_err(|e| ScrumError::Notify(format!("Lock: {e}")))?
            .push((
                tenant.clone(),
                channel_id.to_string(),
                trigger_id.to_string(),
                dialog.clone(),
            ));
        Ok(())
    }
}
