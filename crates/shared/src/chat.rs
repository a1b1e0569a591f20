//! Chat sessions with the assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CHAT_TITLE: &str = "New Conversation";
const TITLE_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

/// A single chat entry. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::text(Role::Ai, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// An attachment sent by the user; `content` holds the file path.
    pub fn attachment(kind: MessageKind, path: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            role: Role::User,
            content: path.into(),
            kind,
            caption: caption.filter(|c| !c.trim().is_empty()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            kind: MessageKind::Text,
            caption: None,
        }
    }
}

fn new_chat_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_title() -> String {
    DEFAULT_CHAT_TITLE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(default = "new_chat_id")]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(
        alias = "timestamp",
        default = "Utc::now",
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Title is still the placeholder and the next user text replaces it.
    /// Cleared by the first user message and by a rename.
    #[serde(default)]
    pub auto_title: bool,
}

/// Accepts RFC 3339 as well as naive ISO stamps written without an offset.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl ChatSession {
    pub fn new(title: Option<String>, initial_messages: Vec<ChatMessage>) -> Self {
        let title = title.filter(|t| !t.trim().is_empty());
        Self {
            id: new_chat_id(),
            auto_title: title.is_none(),
            title: title.unwrap_or_else(default_title),
            created_at: Utc::now(),
            messages: initial_messages,
        }
    }

    /// Appends a message. The first user text message names an untitled chat.
    pub fn add_message(&mut self, msg: ChatMessage) {
        if self.auto_title && msg.role == Role::User && msg.kind == MessageKind::Text {
            self.title = title_from(&msg.content);
            self.auto_title = false;
        }
        self.messages.push(msg);
    }

    /// User-chosen title. Never replaced automatically afterwards.
    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.auto_title = false;
    }

    /// Saved before the flag existed: still untitled if nothing the user
    /// typed has named it yet.
    pub(crate) fn infer_auto_title(&mut self) {
        if self.title == DEFAULT_CHAT_TITLE
            && !self
                .messages
                .iter()
                .any(|m| m.role == Role::User && m.kind == MessageKind::Text)
        {
            self.auto_title = true;
        }
    }
}

/// First 40 characters, with an ellipsis when the text was longer.
pub fn title_from(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > TITLE_MAX_CHARS {
        let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
        title.push_str("...");
        title
    } else {
        text.to_string()
    }
}
