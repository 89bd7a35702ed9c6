//! Response Router
//!
//! Classifies a backend reply and dispatches it to the right presentation
//! and speech path. Text replies join the conversation log and are spoken
//! verbatim. Diagram replies go to the display log only, as block-structured
//! messages the context builder skips, and the spoken line is a fixed
//! confirmation, never the diagram's own summary. Anything unrecognized gets
//! the fixed fallback utterance and is not logged.

use archcoach_core::backend::{ChatReply, DiagramSummary};
use archcoach_core::context::ConversationContext;
use archcoach_core::message::{ContentBlock, Message};
use archcoach_core::prompts;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::speech::queue::SpeechOutputQueue;

/// Routes one backend reply.
///
/// Log appends happen strictly before the corresponding speech is enqueued,
/// so the transcript is never behind what is about to be spoken.
pub async fn dispatch(
    reply: &serde_json::Value,
    context: &Mutex<ConversationContext>,
    queue: &SpeechOutputQueue,
    backend_base_url: &str,
) {
    match ChatReply::classify(reply) {
        ChatReply::Text { answer } => {
            let text = answer
                .filter(|answer| !answer.trim().is_empty())
                .unwrap_or_else(|| prompts::NO_ANSWER_PLACEHOLDER.to_string());
            context.lock().await.push(Message::assistant(text.clone()));
            queue.speak(text).await;
        }
        ChatReply::Diagram(diagram) => {
            let Some(image_url) = diagram.resolve_image_url(backend_base_url) else {
                error!("Diagram reply carried no resolvable image reference.");
                queue
                    .speak(prompts::DIAGRAM_RETRIEVAL_FAILED_UTTERANCE)
                    .await;
                return;
            };
            {
                let mut log = context.lock().await;
                // Block-structured content keeps both messages out of future
                // outbound context.
                if let Some(summary) = diagram.summary.as_ref().and_then(summary_line) {
                    log.push(Message::assistant_blocks(vec![ContentBlock::Text {
                        text: summary,
                    }]));
                }
                log.push(Message::assistant_blocks(vec![ContentBlock::ImageUrl {
                    url: image_url,
                }]));
            }
            queue.speak(prompts::DIAGRAM_READY_UTTERANCE).await;
        }
        ChatReply::Unknown => {
            warn!("Unrecognized backend reply shape.");
            queue.speak(prompts::UNEXPECTED_REPLY_UTTERANCE).await;
        }
    }
}

/// The leading summary shown above a diagram, present only when the reply
/// carries a title.
fn summary_line(summary: &DiagramSummary) -> Option<String> {
    let title = summary.title.as_deref()?;
    Some(format!(
        "{}: generated with {} services and {} connections",
        title,
        summary.nodes.unwrap_or(0),
        summary.edges.unwrap_or(0)
    ))
}
