//! Agent Host - the BoviCheck assistant
//!
//! This crate turns user chat input into prompts for a generation backend:
//! - Summarises recent index values as prompt context
//! - Tracks chat sessions and the document attached to the current one
//! - Dispatches model answers, holding tool calls until the user confirms
//! - Produces dashboard and per-index suggestions

pub mod assistant;
pub mod context;
pub mod conversation;
pub mod prompts;

pub use assistant::{Assistant, ChatPhase, ChatViewModel, Suggestion, CANCELLED_MESSAGE};
pub use context::{format_data_context, format_data_context_for};
pub use conversation::{ActiveFileContext, ConversationManager};
