//! Conversation Message Model
//!
//! Defines the message types held by the conversation log. Content is either
//! plain text or an ordered sequence of content blocks (text or image
//! reference); only plain-text messages are eligible for the outbound prompt
//! context.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The author of a conversation message.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

// Display renders the role the way the outbound context expects it
// ("User: ...", "Assistant: ...").
impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "System"),
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
            Role::Tool => write!(f, "Tool"),
        }
    }
}

/// One element of a block-structured message body.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { url: String },
}

/// A message body: plain text, or an ordered sequence of content blocks.
///
/// Block-structured bodies are display-only; the context builder skips them
/// when assembling conversation history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single entry in the conversation log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Returns the plain-text body, or `None` for block-structured content.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );

        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(format!("{}", Role::User), "User");
        assert_eq!(format!("{}", Role::Assistant), "Assistant");
        assert_eq!(format!("{}", Role::System), "System");
        assert_eq!(format!("{}", Role::Tool), "Tool");
    }

    #[test]
    fn test_text_message_round_trip() {
        let message = Message::user("What is a virtual network?");

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("What is a virtual network?"));

        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, message);
    }

    #[test]
    fn test_block_message_round_trip() {
        let message = Message::assistant_blocks(vec![
            ContentBlock::Text {
                text: "Reference Architecture".to_string(),
            },
            ContentBlock::ImageUrl {
                url: "http://127.0.0.1:8000/download/diagram.png".to_string(),
            },
        ]);

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"type\":\"image_url\""));

        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, message);
    }

    #[test]
    fn test_as_text_only_for_plain_content() {
        let text = Message::assistant("plain reply");
        assert_eq!(text.as_text(), Some("plain reply"));

        let blocks = Message::assistant_blocks(vec![ContentBlock::Text {
            text: "summary".to_string(),
        }]);
        assert_eq!(blocks.as_text(), None);
    }
}
