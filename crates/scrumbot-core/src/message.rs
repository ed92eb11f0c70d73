//! Outbound message and dialog model (messenger wire format, camelCase).

use serde::{Deserialize, Serialize};

/// Highlight color for attachments carrying a blocker.
pub const BLOCKER_COLOR: &str = "#ff0000";

/// Generic reply for transient failures.
pub const RETRY_TEXT: &str = "Sorry, Please retry.";

/// Who sees a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    /// Posted to the channel for everyone.
    InChannel,
    /// Only the requesting member sees it, not persisted.
    Ephemeral,
}

/// A structured chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_original: Option<bool>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.response_type = Some(visibility);
        self
    }

    pub fn in_channel(self) -> Self {
        self.visibility(Visibility::InChannel)
    }

    pub fn ephemeral(self) -> Self {
        self.visibility(Visibility::Ephemeral)
    }

    pub fn replace_original(mut self, replace: bool) -> Self {
        self.replace_original = Some(replace);
        self
    }

    pub fn delete_original(mut self) -> Self {
        self.delete_original = Some(true);
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub short: bool,
}

impl Field {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short: false,
        }
    }

    pub fn short(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            short: true,
            ..Self::new(title, value)
        }
    }
}

/// Interactive element inside an attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
}

impl Action {
    pub fn button(name: &str, text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: "button".into(),
            name: name.into(),
            value: value.into(),
            text: Some(text.into()),
            data_source: None,
        }
    }

    /// Member picker backed by the messenger's user directory.
    pub fn user_select(name: &str) -> Self {
        Self {
            kind: "select".into(),
            name: name.into(),
            value: String::new(),
            text: None,
            data_source: Some("users".into()),
        }
    }
}

/// A modal form opened through the messenger dialog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialog {
    pub callback_id: String,
    pub title: String,
    pub submit_label: String,
    pub elements: Vec<DialogElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogElement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub label: String,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

impl DialogElement {
    pub fn textarea(label: &str, name: &str, value: &str, placeholder: &str) -> Self {
        Self {
            kind: "textarea".into(),
            subtype: None,
            label: label.into(),
            name: name.into(),
            value: value.into(),
            placeholder: Some(placeholder.into()),
            optional: false,
            options: Vec::new(),
        }
    }

    pub fn number(label: &str, name: &str, value: &str, placeholder: &str) -> Self {
        Self {
            kind: "text".into(),
            subtype: Some("number".into()),
            ..Self::textarea(label, name, value, placeholder)
        }
    }

    pub fn select(label: &str, name: &str, value: &str, options: Vec<SelectOption>) -> Self {
        Self {
            kind: "select".into(),
            subtype: None,
            label: label.into(),
            name: name.into(),
            value: value.into(),
            placeholder: None,
            optional: false,
            options,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let msg = Message::text("hello")
            .in_channel()
            .replace_original(false)
            .attachment(Attachment {
                title: Some("Daily scrum info".into()),
                fields: vec![Field::short("Time", "09:00 (UTC)")],
                ..Default::default()
            });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["responseType"], "inChannel");
        assert_eq!(json["replaceOriginal"], false);
        assert!(json.get("deleteOriginal").is_none());
        assert_eq!(json["attachments"][0]["fields"][0]["short"], true);
        assert!(json["attachments"][0].get("color").is_none());
    }

    #[test]
    fn test_action_and_dialog_serialization() {
        let select = serde_json::to_value(Action::user_select("masterMention")).unwrap();
        assert_eq!(select["type"], "select");
        assert_eq!(select["dataSource"], "users");

        let element = DialogElement::number("Hour", "hour", "9", "00 ~ 23");
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["subtype"], "number");
        assert!(json.get("optional").is_none());
    }
}
