//! Domain core for the archcoach session engine.
//!
//! This crate holds the conversation state and the backend chat contract:
//! the message model, the bounded outbound-context builder, project-brief
//! tracking, and the reply classification that drives response routing.
//! Everything with side effects (speech, transport, lifecycle) lives in the
//! `archcoach-session` service crate.

pub mod backend;
pub mod brief;
pub mod context;
pub mod message;
pub mod prompts;
