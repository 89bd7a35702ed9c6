//! Conversation Context
//!
//! Owns the ordered message log and derives the bounded textual context sent
//! with each backend request. The log always starts with exactly one system
//! message; changing the project brief replaces that message in place.

use crate::message::{Message, Role};
use crate::prompts;
use tracing::debug;

/// Maximum number of history messages included in an outbound prompt.
pub const CONTEXT_WINDOW: usize = 10;

/// The conversation log plus the brief used to derive the system message.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    messages: Vec<Message>,
    project_brief: String,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationContext {
    /// Creates a log holding only the generic system message.
    pub fn new() -> Self {
        Self {
            messages: vec![Message::system(prompts::GENERIC_COACH_PROMPT)],
            project_brief: String::new(),
        }
    }

    /// Stores the brief and recomputes the system message in place.
    ///
    /// An empty brief selects the generic coaching prompt; otherwise the
    /// brief-augmented template embeds the brief verbatim. Index 0 is
    /// replaced, never duplicated, so repeated calls are idempotent.
    pub fn set_project_brief(&mut self, text: &str) {
        self.project_brief = text.to_string();
        let prompt = if text.trim().is_empty() {
            prompts::GENERIC_COACH_PROMPT.to_string()
        } else {
            prompts::brief_augmented_prompt(text)
        };
        self.messages[0] = Message::system(prompt);
        debug!(brief_chars = text.len(), "System message recomputed.");
    }

    pub fn project_brief(&self) -> &str {
        &self.project_brief
    }

    /// Appends a message to the log.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drops all conversation history, keeping the current system message.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }

    /// Composes the outbound prompt for a new user query.
    ///
    /// History covers the last [`CONTEXT_WINDOW`] non-system messages whose
    /// content is plain text; block-structured (diagram) messages never enter
    /// the prompt. Sections appear as brief, history, then the current
    /// question, and an empty section is omitted rather than emitted as a
    /// bare header.
    pub fn build_outbound_context(&self, new_user_text: &str) -> String {
        let rendered: Vec<String> = self
            .messages
            .iter()
            .filter(|message| message.role != Role::System)
            .filter_map(|message| {
                message
                    .as_text()
                    .map(|text| format!("{}: {}", message.role, text))
            })
            .collect();
        let start = rendered.len().saturating_sub(CONTEXT_WINDOW);
        let history = &rendered[start..];

        let mut sections = Vec::with_capacity(3);
        if !self.project_brief.trim().is_empty() {
            sections.push(format!("Project Context: {}", self.project_brief));
        }
        if !history.is_empty() {
            sections.push(format!("Conversation History:\n{}", history.join("\n\n")));
        }
        sections.push(format!("Current Question: {}", new_user_text));
        sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentBlock;

    fn system_count(context: &ConversationContext) -> usize {
        context
            .messages()
            .iter()
            .filter(|m| m.role == Role::System)
            .count()
    }

    #[test]
    fn test_new_log_holds_single_system_message() {
        let context = ConversationContext::new();
        assert_eq!(context.messages().len(), 1);
        assert_eq!(context.messages()[0].role, Role::System);
        assert_eq!(
            context.messages()[0].as_text(),
            Some(prompts::GENERIC_COACH_PROMPT)
        );
    }

    #[test]
    fn test_system_message_singleton_across_brief_changes() {
        let mut context = ConversationContext::new();
        context.push(Message::user("hello"));
        context.push(Message::assistant("hi there"));

        context.set_project_brief("E-commerce replatform for a grocery chain.");
        context.set_project_brief("Batch analytics platform for IoT sensors.");
        context.set_project_brief("");
        context.set_project_brief("Final brief.");

        assert_eq!(system_count(&context), 1);
        assert_eq!(context.messages()[0].role, Role::System);
        let system = context.messages()[0].as_text().unwrap();
        assert!(system.contains("Final brief."));
        // History is untouched and keeps its order.
        assert_eq!(context.messages()[1].as_text(), Some("hello"));
        assert_eq!(context.messages()[2].as_text(), Some("hi there"));
    }

    #[test]
    fn test_set_project_brief_is_idempotent() {
        let mut context = ConversationContext::new();
        context.push(Message::user("first"));

        context.set_project_brief("Same brief.");
        let snapshot = context.messages().to_vec();
        context.set_project_brief("Same brief.");

        assert_eq!(context.messages(), &snapshot[..]);
    }

    #[test]
    fn test_empty_brief_selects_generic_prompt() {
        let mut context = ConversationContext::new();
        context.set_project_brief("Something.");
        context.set_project_brief("   ");
        assert_eq!(
            context.messages()[0].as_text(),
            Some(prompts::GENERIC_COACH_PROMPT)
        );
    }

    #[test]
    fn test_context_trims_to_last_ten_messages_in_order() {
        let mut context = ConversationContext::new();
        for i in 1..=15 {
            context.push(Message::user(format!("message {i}")));
        }

        let prompt = context.build_outbound_context("what next?");

        // The window keeps messages 6 through 15.
        assert!(!prompt.contains("User: message 4"));
        assert!(!prompt.contains("User: message 5"));
        assert!(prompt.contains("User: message 6"));
        assert!(prompt.contains("User: message 15"));
        let pos_6 = prompt.find("User: message 6").unwrap();
        let pos_15 = prompt.find("User: message 15").unwrap();
        assert!(pos_6 < pos_15);
    }

    #[test]
    fn test_outbound_sections_in_order() {
        let mut context = ConversationContext::new();
        context.set_project_brief("Two-region failover setup.");
        context.push(Message::user("how do I start?"));
        context.push(Message::assistant("Tell me about your workload."));

        let prompt = context.build_outbound_context("is active-active viable?");

        let brief_pos = prompt.find("Project Context: Two-region failover setup.").unwrap();
        let history_pos = prompt.find("Conversation History:").unwrap();
        let question_pos = prompt
            .find("Current Question: is active-active viable?")
            .unwrap();
        assert!(brief_pos < history_pos);
        assert!(history_pos < question_pos);
        assert!(prompt.contains("User: how do I start?"));
        assert!(prompt.contains("Assistant: Tell me about your workload."));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let context = ConversationContext::new();
        let prompt = context.build_outbound_context("first question");
        assert_eq!(prompt, "Current Question: first question");
        assert!(!prompt.contains("Project Context:"));
        assert!(!prompt.contains("Conversation History:"));
    }

    #[test]
    fn test_system_message_never_enters_history_block() {
        let mut context = ConversationContext::new();
        context.push(Message::user("only turn"));
        let prompt = context.build_outbound_context("next");
        assert!(!prompt.contains("coaching guidelines"));
        assert!(!prompt.contains("CRITICAL COACHING GUIDELINES"));
        assert!(prompt.contains("User: only turn"));
    }

    #[test]
    fn test_block_messages_are_excluded_from_context() {
        let mut context = ConversationContext::new();
        context.push(Message::user("draw it"));
        context.push(Message::assistant_blocks(vec![ContentBlock::Text {
            text: "Reference Architecture: generated with 7 services and 9 connections"
                .to_string(),
        }]));
        context.push(Message::assistant_blocks(vec![ContentBlock::ImageUrl {
            url: "http://127.0.0.1:8000/download/d.png".to_string(),
        }]));

        let prompt = context.build_outbound_context("and now?");

        assert!(prompt.contains("User: draw it"));
        assert!(!prompt.contains("Reference Architecture"));
        assert!(!prompt.contains("d.png"));
    }

    #[test]
    fn test_clear_keeps_current_system_message() {
        let mut context = ConversationContext::new();
        context.set_project_brief("Persistent brief.");
        context.push(Message::user("a"));
        context.push(Message::assistant("b"));

        context.clear();

        assert_eq!(context.messages().len(), 1);
        assert!(context.messages()[0].as_text().unwrap().contains("Persistent brief."));
    }
}
