//! Report composer: turns a meeting's statuses into paginated messages and
//! delivers them in order.

use chrono_tz::Tz;
use scrumbot_core::error::Result;
use scrumbot_core::message::{Attachment, BLOCKER_COLOR, Field, Message, Visibility};
use scrumbot_core::traits::Notifier;
use scrumbot_core::types::{MeetingInstance, StatusEntry};

/// Messenger limit on attachments per message.
pub const MAX_ATTACHMENTS_PER_MESSAGE: usize = 20;

pub const NO_STATUS_TEXT: &str = "No one wrote next daily scrum status.";

/// One member's status rendered as an attachment.
pub fn status_attachment(status: &StatusEntry) -> Attachment {
    let mut fields = vec![
        Field::new("What did:", status.yesterday_work.clone()),
        Field::new("What to do:", status.today_work.clone()),
    ];
    let mut color = None;
    if let Some(blocker) = status.blocker() {
        fields.push(Field::new("Blockers:", blocker));
        color = Some(BLOCKER_COLOR.to_string());
    }
    Attachment {
        text: Some(status.member_mention.clone()),
        fields,
        color,
        ..Default::default()
    }
}

/// Render the report pages for `meeting`. `statuses` must already be in
/// submission order; the order is kept across pages.
pub fn compose_report(meeting: &MeetingInstance, statuses: &[StatusEntry], tz: Tz) -> Vec<Message> {
    if statuses.is_empty() {
        return vec![Message::text(NO_STATUS_TEXT)];
    }

    let date = meeting.date_label(tz);
    let chunks: Vec<&[StatusEntry]> = statuses.chunks(MAX_ATTACHMENTS_PER_MESSAGE).collect();
    let total = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let text = if total > 1 {
                format!("{date} Scrum Status ({}/{total})", index + 1)
            } else {
                format!("{date} Scrum Status")
            };
            Message {
                attachments: chunk.iter().map(status_attachment).collect(),
                ..Message::text(text).replace_original(false)
            }
        })
        .collect()
}

/// Send the pages one after another; a page is only dispatched once the
/// previous send has completed. Stops at the first failure.
pub async fn send_pages(
    notifier: &dyn Notifier,
    url: &str,
    channel_id: &str,
    pages: Vec<Message>,
    visibility: Visibility,
) -> Result<usize> {
    let mut sent = 0;
    for page in pages {
        let page = page.visibility(visibility).replace_original(false);
        notifier.send(url, channel_id, &page).await?;
        sent += 1;
    }
    Ok(sent)
}
