//! Chat session lifecycle and the transient attached-file context.

use shared::chat::{ChatMessage, ChatSession};
use shared::state::RenameError;
use shared::AppState;
use std::path::{Path, PathBuf};
use tracing::info;

const SUGGESTION_TITLE_CHARS: usize = 35;

/// Text extracted from the document most recently attached to a chat.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFileContext {
    pub chat_id: String,
    pub file_path: PathBuf,
    pub extracted_text: String,
}

impl ActiveFileContext {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    pub fn is_spreadsheet(&self) -> bool {
        services::ingest::is_spreadsheet(&self.file_path)
    }
}

#[derive(Debug, Default)]
pub struct ConversationManager {
    active_file: Option<ActiveFileContext>,
}

impl ConversationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session at the front of the history and makes it current.
    pub fn start_new_chat(
        &mut self,
        state: &mut AppState,
        title: Option<String>,
        initial_messages: Vec<ChatMessage>,
    ) -> String {
        self.active_file = None;
        let id = state.add_chat(ChatSession::new(title, initial_messages));
        info!(chat = %id, "started chat");
        id
    }

    /// Current chat id, creating a session when none is active.
    pub fn ensure_current(&mut self, state: &mut AppState) -> String {
        match state.current_chat() {
            Some(chat) => chat.id.clone(),
            None => self.start_new_chat(state, None, Vec::new()),
        }
    }

    pub fn open_chat(&mut self, state: &mut AppState, id: &str) -> bool {
        if state.current_chat_id.as_deref() != Some(id) {
            self.active_file = None;
        }
        state.set_current_chat(id)
    }

    pub fn rename_chat(
        &self,
        state: &mut AppState,
        id: &str,
        title: &str,
    ) -> Result<(), RenameError> {
        state.rename_chat(id, title)
    }

    pub fn delete_chat(&mut self, state: &mut AppState, id: &str) -> bool {
        if self.active_file.as_ref().is_some_and(|f| f.chat_id == id) {
            self.active_file = None;
        }
        state.delete_chat(id)
    }

    /// Appends to the given chat. Returns false if it no longer exists.
    pub fn append(&self, state: &mut AppState, chat_id: &str, msg: ChatMessage) -> bool {
        match state.chat_mut(chat_id) {
            Some(chat) => {
                chat.add_message(msg);
                true
            }
            None => false,
        }
    }

    /// Session seeded with a suggestion the user wants to discuss further.
    pub fn continue_in_chat(&mut self, state: &mut AppState, suggestion: &str) -> String {
        self.start_new_chat(
            state,
            Some(suggestion_title(suggestion)),
            vec![ChatMessage::ai(suggestion)],
        )
    }

    pub fn set_active_file(&mut self, chat_id: &str, file_path: &Path, extracted_text: String) {
        self.active_file = Some(ActiveFileContext {
            chat_id: chat_id.to_string(),
            file_path: file_path.to_path_buf(),
            extracted_text,
        });
    }

    /// The attached file, only if it belongs to `chat_id`.
    pub fn active_file_for(&self, chat_id: &str) -> Option<&ActiveFileContext> {
        self.active_file.as_ref().filter(|f| f.chat_id == chat_id)
    }

    pub fn clear_active_file(&mut self) {
        self.active_file = None;
    }
}

fn suggestion_title(suggestion: &str) -> String {
    let suggestion = suggestion.trim();
    if suggestion.chars().count() > SUGGESTION_TITLE_CHARS {
        let head: String = suggestion.chars().take(SUGGESTION_TITLE_CHARS).collect();
        format!("About: {}...", head)
    } else {
        format!("About: {}", suggestion)
    }
}
