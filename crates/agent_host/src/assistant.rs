//! Chat orchestration: prompt assembly, remote call, and the tool
//! confirmation flow.
//!
//! Every public turn method ends back in [`ChatPhase::Idle`] (or
//! [`ChatPhase::AwaitingConfirmation`] after a tool call) with the state
//! persisted. Failures become `system` chat messages; nothing is returned as
//! an error.

use crate::context::{format_data_context, format_data_context_for};
use crate::conversation::ConversationManager;
use crate::prompts;
use providers::{AiResponse, ApiError, GenerationBackend, GenerationRequest, PromptPart};
use services::import::{import_rows, parse_index_rows};
use services::ingest::{self, DocumentKind};
use services::StateSaver;
use shared::chat::{ChatMessage, MessageKind};
use shared::settings::ThemeMode;
use shared::state::RenameError;
use shared::tool::{PendingToolCall, ToolDefinition, ToolError, IMPORT_SPREADSHEET_TOOL};
use shared::AppState;
use std::path::Path;
use tracing::{debug, info, warn};

pub const CANCELLED_MESSAGE: &str = "Action cancelled by user.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
    AwaitingConfirmation,
}

/// Data-only snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatViewModel {
    pub chat_id: Option<String>,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub loading: bool,
    pub send_enabled: bool,
    /// Confirmation prompt for a pending tool call
    pub pending_confirmation: Option<String>,
}

/// Outcome of a dashboard or per-index suggestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    NotEnoughData,
    Ready(String),
    Failed(String),
}

impl Suggestion {
    pub fn display_text(&self) -> String {
        match self {
            Suggestion::NotEnoughData => prompts::NOT_ENOUGH_DATA.to_string(),
            Suggestion::Ready(text) => text.clone(),
            Suggestion::Failed(detail) => format!("Could not generate a suggestion: {}", detail),
        }
    }
}

type Observer = Box<dyn FnMut(&ChatViewModel) + Send>;

struct PendingCall {
    chat_id: String,
    call: PendingToolCall,
}

pub struct Assistant<B, S> {
    state: AppState,
    backend: B,
    saver: S,
    conversations: ConversationManager,
    phase: ChatPhase,
    pending: Option<PendingCall>,
    observer: Option<Observer>,
}

impl<B: GenerationBackend, S: StateSaver> Assistant<B, S> {
    pub fn new(state: AppState, backend: B, saver: S) -> Self {
        Self {
            state,
            backend,
            saver,
            conversations: ConversationManager::new(),
            phase: ChatPhase::Idle,
            pending: None,
            observer: None,
        }
    }

    /// Called with a fresh view model whenever the chat view changes.
    pub fn set_observer(&mut self, observer: impl FnMut(&ChatViewModel) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Direct access for calculation and restore flows. Call [`Self::persist`]
    /// afterwards.
    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    pub fn view_model(&self) -> ChatViewModel {
        let chat = self.state.current_chat();
        ChatViewModel {
            chat_id: chat.map(|c| c.id.clone()),
            title: chat.map(|c| c.title.clone()).unwrap_or_default(),
            messages: chat.map(|c| c.messages.clone()).unwrap_or_default(),
            loading: self.phase == ChatPhase::Sending,
            send_enabled: self.phase == ChatPhase::Idle,
            pending_confirmation: self.pending.as_ref().map(|p| p.call.confirmation_text()),
        }
    }

    fn notify(&mut self) {
        let vm = self.view_model();
        if let Some(observer) = self.observer.as_mut() {
            observer(&vm);
        }
    }

    /// Commits the whole state. Failures are logged, never raised.
    pub fn persist(&self) {
        if let Err(e) = self.saver.save(&self.state) {
            warn!(error = %e, "failed to save state");
        }
    }

    // --- sessions ---

    pub fn start_new_chat(&mut self) -> String {
        self.drop_pending();
        let id = self
            .conversations
            .start_new_chat(&mut self.state, None, Vec::new());
        self.persist();
        self.notify();
        id
    }

    pub fn open_chat(&mut self, id: &str) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.chat_id != id) {
            self.drop_pending();
        }
        let opened = self.conversations.open_chat(&mut self.state, id);
        self.notify();
        opened
    }

    /// Blank titles are rejected so the caller can re-prompt.
    pub fn rename_chat(&mut self, id: &str, title: &str) -> Result<(), RenameError> {
        self.conversations.rename_chat(&mut self.state, id, title)?;
        self.persist();
        self.notify();
        Ok(())
    }

    pub fn delete_chat(&mut self, id: &str) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.chat_id == id) {
            self.pending = None;
            self.phase = ChatPhase::Idle;
        }
        let deleted = self.conversations.delete_chat(&mut self.state, id);
        if deleted {
            self.persist();
            self.notify();
        }
        deleted
    }

    pub fn continue_in_chat(&mut self, suggestion: &str) -> Option<String> {
        if suggestion.trim().is_empty() {
            return None;
        }
        self.drop_pending();
        let id = self
            .conversations
            .continue_in_chat(&mut self.state, suggestion);
        self.persist();
        self.notify();
        Some(id)
    }

    /// Switching away from a chat with an unanswered tool call cancels it.
    fn drop_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.conversations.append(
                &mut self.state,
                &pending.chat_id,
                ChatMessage::system(CANCELLED_MESSAGE),
            );
            self.phase = ChatPhase::Idle;
        }
    }

    // --- settings ---

    pub fn set_ai_enabled(&mut self, enabled: bool) {
        self.state.ai_settings.enabled = enabled;
        info!(enabled, "AI toggled");
        self.persist();
    }

    pub fn set_suggestions_enabled(&mut self, enabled: bool) {
        self.state.ai_settings.suggestions_enabled = enabled;
        self.persist();
    }

    pub fn set_api_key(&mut self, key: &str) {
        self.state.ai_settings.api_key = key.trim().to_string();
        self.persist();
    }

    pub fn set_theme_mode(&mut self, mode: ThemeMode) {
        self.state.theme_preference.theme_mode = mode;
        self.persist();
    }

    pub fn set_primary_color(&mut self, name: &str) -> bool {
        let changed = self.state.theme_preference.set_primary_color(name);
        if changed {
            self.persist();
        }
        changed
    }

    // --- chat turns ---

    async fn call(&self, request: &GenerationRequest) -> AiResponse {
        if !self.state.ai_settings.is_configured() {
            return AiResponse::Failure(ApiError::NotConfigured);
        }
        debug!(
            chars = request
                .parts
                .iter()
                .map(|p| match p {
                    PromptPart::Text(t) => t.len(),
                    PromptPart::InlineData { data, .. } => data.len(),
                })
                .sum::<usize>(),
            "sending prompt"
        );
        self.backend
            .generate(&self.state.ai_settings.api_key, request)
            .await
    }

    /// Appends the user message, flips to `Sending` and returns the chat id.
    /// `None` while a confirmation is outstanding.
    fn begin_turn(&mut self, msg: ChatMessage) -> Option<String> {
        if self.phase != ChatPhase::Idle {
            debug!(phase = ?self.phase, "ignoring input while busy");
            return None;
        }
        let chat_id = self.conversations.ensure_current(&mut self.state);
        self.conversations.append(&mut self.state, &chat_id, msg);
        self.phase = ChatPhase::Sending;
        self.notify();
        Some(chat_id)
    }

    fn chat_request(&self, chat_id: &str, question: String) -> GenerationRequest {
        let active = self.conversations.active_file_for(chat_id);
        let import_available = active.is_some_and(|f| f.is_spreadsheet());
        let mut sections = vec![
            prompts::SYSTEM_INSTRUCTION.to_string(),
            format_data_context(&self.state),
        ];
        if let Some(file) = active {
            sections.push(prompts::active_file_block(
                &file.file_name(),
                &file.extracted_text,
                import_available,
            ));
        }
        sections.push(question);

        let mut request = GenerationRequest::text(prompts::assemble(&sections));
        if import_available {
            request = request.with_tool(ToolDefinition::import_spreadsheet());
        }
        request
    }

    pub async fn send_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let Some(chat_id) = self.begin_turn(ChatMessage::user(text)) else {
            return;
        };
        let request = self.chat_request(&chat_id, prompts::user_question_prompt(text));
        let response = self.call(&request).await;
        self.finish_turn(&chat_id, response);
    }

    /// Images go to the model inline. Documents are extracted, kept as the
    /// chat's active file, and summarised.
    pub async fn send_file(&mut self, path: &Path, caption: Option<&str>) {
        let caption = caption.map(str::to_string);
        let path_text = path.display().to_string();

        if ingest::is_image(path) {
            let msg = ChatMessage::attachment(MessageKind::Image, path_text, caption.clone());
            let Some(chat_id) = self.begin_turn(msg) else {
                return;
            };
            let response = match ingest::encode_image(path) {
                Ok(image) => {
                    let request = GenerationRequest::text(prompts::assemble(&[
                        prompts::SYSTEM_INSTRUCTION.to_string(),
                        prompts::image_prompt(caption.as_deref()),
                    ]))
                    .with_part(PromptPart::InlineData {
                        mime_type: image.mime_type,
                        data: image.data,
                    });
                    self.call(&request).await
                }
                Err(e) => AiResponse::Failure(ApiError::Unexpected(format!(
                    "could not read image: {}",
                    e
                ))),
            };
            self.finish_turn(&chat_id, response);
            return;
        }

        let msg = ChatMessage::attachment(MessageKind::File, path_text, caption.clone());
        let Some(chat_id) = self.begin_turn(msg) else {
            return;
        };
        let extracted = ingest::extract_text(path);
        let failed = ingest::is_extraction_failure(&extracted);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let spreadsheet = ingest::detect_kind(path) == DocumentKind::Spreadsheet && !failed;

        let mut sections = vec![
            prompts::SYSTEM_INSTRUCTION.to_string(),
            format_data_context(&self.state),
            prompts::document_prompt(&file_name, &extracted, caption.as_deref(), failed),
        ];
        if spreadsheet {
            sections.push(prompts::import_hint());
        }
        let mut request = GenerationRequest::text(prompts::assemble(&sections));
        if spreadsheet {
            request = request.with_tool(ToolDefinition::import_spreadsheet());
        }
        if !failed {
            self.conversations
                .set_active_file(&chat_id, path, extracted);
        }

        let response = self.call(&request).await;
        self.finish_turn(&chat_id, response);
    }

    fn finish_turn(&mut self, chat_id: &str, response: AiResponse) {
        self.phase = ChatPhase::Idle;
        match response {
            AiResponse::Text(text) => {
                self.conversations
                    .append(&mut self.state, chat_id, ChatMessage::ai(text));
            }
            AiResponse::ToolCall { name, args } if name == IMPORT_SPREADSHEET_TOOL => {
                info!(tool = %name, "tool call awaiting confirmation");
                self.pending = Some(PendingCall {
                    chat_id: chat_id.to_string(),
                    call: PendingToolCall { name, args },
                });
                self.phase = ChatPhase::AwaitingConfirmation;
            }
            AiResponse::ToolCall { name, .. } => {
                warn!(tool = %name, "unknown tool requested");
                self.conversations.append(
                    &mut self.state,
                    chat_id,
                    ChatMessage::system(format!(
                        "Error: the assistant requested an unknown function '{}'.",
                        name
                    )),
                );
            }
            AiResponse::Failure(e) => {
                self.conversations.append(
                    &mut self.state,
                    chat_id,
                    ChatMessage::system(format!("Error: {}", e)),
                );
            }
        }
        self.persist();
        self.notify();
    }

    // --- tool confirmation ---

    pub fn confirm_tool(&mut self) {
        let Some(PendingCall { chat_id, call }) = self.pending.take() else {
            return;
        };
        let message = match call.name.as_str() {
            IMPORT_SPREADSHEET_TOOL => match self.run_import(&chat_id) {
                Ok(added) => format!(
                    "Import finished: {} record(s) added from the spreadsheet.",
                    added
                ),
                Err(e) => format!("Error: {}", e),
            },
            other => format!("Error: the assistant requested an unknown function '{}'.", other),
        };
        self.conversations
            .append(&mut self.state, &chat_id, ChatMessage::system(message));
        self.phase = ChatPhase::Idle;
        self.persist();
        self.notify();
    }

    pub fn cancel_tool(&mut self) {
        if self.pending.is_none() {
            return;
        }
        self.drop_pending();
        self.persist();
        self.notify();
    }

    fn run_import(&mut self, chat_id: &str) -> Result<usize, ToolError> {
        let file = self
            .conversations
            .active_file_for(chat_id)
            .cloned()
            .ok_or(ToolError::NoActiveFile)?;
        self.conversations.clear_active_file();
        if !file.is_spreadsheet() {
            return Err(ToolError::NoActiveFile);
        }
        if ingest::is_extraction_failure(&file.extracted_text) {
            return Err(ToolError::Unreadable(file.extracted_text));
        }
        let rows = parse_index_rows(&file.extracted_text);
        if rows.is_empty() {
            return Err(ToolError::NothingToImport);
        }
        Ok(import_rows(&mut self.state, rows))
    }

    // --- suggestions ---

    async fn suggest(&self, instruction: String, data_context: String) -> Suggestion {
        if data_context.is_empty() {
            return Suggestion::NotEnoughData;
        }
        let request = GenerationRequest::text(format!("{}\n\n{}", instruction, data_context));
        match self.call(&request).await {
            AiResponse::Text(text) => Suggestion::Ready(text),
            AiResponse::ToolCall { name, .. } => {
                Suggestion::Failed(format!("unexpected function call '{}'", name))
            }
            AiResponse::Failure(e) => Suggestion::Failed(e.to_string()),
        }
    }

    pub async fn dashboard_suggestion(&self) -> Suggestion {
        self.suggest(
            prompts::DASHBOARD_SUGGESTION_PROMPT.to_string(),
            format_data_context(&self.state),
        )
        .await
    }

    pub async fn index_suggestion(&self, index_name: &str) -> Suggestion {
        self.suggest(
            prompts::index_suggestion_prompt(index_name),
            format_data_context_for(&self.state, index_name),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use services::PersistenceError;
    use shared::chat::Role;
    use shared::indices::CalculationRecord;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned responses and records every request.
    #[derive(Clone, Default)]
    struct Scripted {
        responses: Arc<Mutex<VecDeque<AiResponse>>>,
        requests: Arc<Mutex<Vec<GenerationRequest>>>,
    }

    impl Scripted {
        fn with(responses: Vec<AiResponse>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                requests: Arc::default(),
            }
        }

        fn last_prompt(&self) -> String {
            let requests = self.requests.lock().unwrap();
            match &requests.last().unwrap().parts[0] {
                PromptPart::Text(t) => t.clone(),
                other => panic!("unexpected part {:?}", other),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for Scripted {
        async fn generate(&self, _api_key: &str, request: &GenerationRequest) -> AiResponse {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(AiResponse::Text("ok".into()))
        }
    }

    #[derive(Clone, Default)]
    struct CountingSaver(Arc<Mutex<usize>>);

    impl StateSaver for CountingSaver {
        fn save(&self, _state: &AppState) -> Result<(), PersistenceError> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn configured_state() -> AppState {
        let mut state = AppState::default();
        state.ai_settings.enabled = true;
        state.ai_settings.api_key = "test-key".into();
        state
    }

    fn assistant(
        responses: Vec<AiResponse>,
    ) -> (Assistant<Scripted, CountingSaver>, Scripted, CountingSaver) {
        let backend = Scripted::with(responses);
        let saver = CountingSaver::default();
        let a = Assistant::new(configured_state(), backend.clone(), saver.clone());
        (a, backend, saver)
    }

    fn last_message(a: &Assistant<Scripted, CountingSaver>) -> ChatMessage {
        a.state().current_chat().unwrap().messages.last().unwrap().clone()
    }

    const SHEET: &str = "## Index Data\n\n\
        | Index Name | Index (Value and Unit) | Time | Date |\n\
        | --- | --- | --- | --- |\n\
        | Birth Rate | 90.00 % | 08:15 | 01/01/2024 |\n\
        | Weaning Rate | 88.00 % | 09:00 | 02/02/2024 |\n";

    #[tokio::test]
    async fn text_answer_is_appended_and_persisted() {
        let (mut a, _, saver) = assistant(vec![AiResponse::Text("Looks healthy.".into())]);
        a.send_text("  How is the herd?  ").await;

        let chat = a.state().current_chat().unwrap();
        assert_eq!(chat.title, "How is the herd?");
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, Role::User);
        assert_eq!(chat.messages[1], ChatMessage::ai("Looks healthy."));
        assert_eq!(a.phase(), ChatPhase::Idle);
        assert!(*saver.0.lock().unwrap() >= 1);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let (mut a, backend, _) = assistant(vec![]);
        a.send_text("   ").await;
        assert!(a.state().chat_history.is_empty());
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn loading_flag_wraps_the_call() {
        let (mut a, _, _) = assistant(vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        a.set_observer(move |vm| sink.lock().unwrap().push((vm.loading, vm.send_enabled)));
        a.send_text("hello").await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&(true, false)));
        assert_eq!(seen.last(), Some(&(false, true)));
    }

    #[tokio::test]
    async fn prompt_includes_data_context_in_order() {
        let (mut a, backend, _) = assistant(vec![]);
        a.state_mut().add_calculation(
            "Birth Rate",
            CalculationRecord {
                id: "r".into(),
                result_text: "80.00 %".into(),
                date: "01/01/2024".into(),
                time: "10:00".into(),
                raw_inputs: vec![],
            },
        );
        a.send_text("Is 80% good?").await;
        let prompt = backend.last_prompt();
        let system = prompt.find(prompts::SYSTEM_INSTRUCTION).unwrap();
        let context = prompt.find("### Birth Rate").unwrap();
        let question = prompt.find("answer the following user question: Is 80% good?").unwrap();
        assert!(system < context && context < question);
        assert!(backend.requests.lock().unwrap()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn failures_become_system_messages() {
        let (mut a, _, _) = assistant(vec![AiResponse::Failure(ApiError::Connection(
            "timed out".into(),
        ))]);
        a.send_text("hi").await;
        let msg = last_message(&a);
        assert_eq!(msg.role, Role::System);
        assert!(msg.content.starts_with("Error: "));
        assert!(msg.content.contains("timed out"));
        assert!(a.view_model().send_enabled);
    }

    #[tokio::test]
    async fn disabled_ai_reports_not_configured() {
        let (mut a, backend, _) = assistant(vec![]);
        a.set_ai_enabled(false);
        a.send_text("hi").await;
        assert!(backend.requests.lock().unwrap().is_empty());
        assert_eq!(
            last_message(&a).content,
            format!("Error: {}", ApiError::NotConfigured)
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_without_mutation() {
        let (mut a, _, _) = assistant(vec![AiResponse::ToolCall {
            name: "sell_the_herd".into(),
            args: serde_json::json!({}),
        }]);
        a.send_text("do it").await;
        let msg = last_message(&a);
        assert_eq!(msg.role, Role::System);
        assert!(msg.content.contains("sell_the_herd"));
        assert!(a.state().calculated_indices.is_empty());
        assert_eq!(a.phase(), ChatPhase::Idle);
        assert!(a.view_model().pending_confirmation.is_none());
    }

    #[tokio::test]
    async fn unsupported_attachment_still_completes_turn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herd.csv");
        std::fs::write(&path, "a,b").unwrap();
        let (mut a, backend, _) = assistant(vec![AiResponse::Text("Please paste it.".into())]);
        a.send_file(&path, None).await;

        let prompt = backend.last_prompt();
        assert!(prompt.contains("could not be extracted"));
        assert!(prompt.contains("not supported"));
        let chat = a.state().current_chat().unwrap();
        assert_eq!(chat.messages[0].kind, MessageKind::File);
        assert_eq!(chat.messages[1].role, Role::Ai);
        let chat_id = chat.id.clone();
        assert!(a.conversations().active_file_for(&chat_id).is_none());
    }

    #[tokio::test]
    async fn image_is_sent_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calf.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let (mut a, backend, _) = assistant(vec![AiResponse::Text("A calf.".into())]);
        a.send_file(&path, Some("body condition?")).await;

        let requests = backend.requests.lock().unwrap();
        assert_eq!(
            requests[0].parts[1],
            PromptPart::InlineData {
                mime_type: "image/png".into(),
                data: "AQID".into()
            }
        );
        let chat = a.state().current_chat().unwrap();
        assert_eq!(chat.messages[0].kind, MessageKind::Image);
        assert_eq!(chat.messages[0].caption.as_deref(), Some("body condition?"));
    }

    #[tokio::test]
    async fn text_document_becomes_active_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Lot 4 gained 0.9 kg/day").unwrap();
        let (mut a, backend, _) = assistant(vec![]);
        a.send_file(&path, None).await;
        a.send_text("Which lot?").await;

        let prompt = backend.last_prompt();
        assert!(prompt.contains("## Attached file: notes.txt"));
        assert!(prompt.contains("Lot 4 gained 0.9 kg/day"));
        assert!(backend.requests.lock().unwrap()[1].tools.is_empty());

        a.start_new_chat();
        a.send_text("Which lot?").await;
        assert!(!backend.last_prompt().contains("## Attached file"));
    }

    fn attach_sheet(a: &mut Assistant<Scripted, CountingSaver>) -> String {
        let chat_id = a.start_new_chat();
        a.conversations
            .set_active_file(&chat_id, Path::new("/data/herd.xlsx"), SHEET.to_string());
        chat_id
    }

    #[tokio::test]
    async fn spreadsheet_import_after_confirmation() {
        let (mut a, backend, _) = assistant(vec![AiResponse::ToolCall {
            name: IMPORT_SPREADSHEET_TOOL.into(),
            args: serde_json::json!({}),
        }]);
        let chat_id = attach_sheet(&mut a);
        a.send_text("Import these please").await;

        assert_eq!(
            backend.requests.lock().unwrap()[0].tools,
            vec![ToolDefinition::import_spreadsheet()]
        );
        assert_eq!(a.phase(), ChatPhase::AwaitingConfirmation);
        let vm = a.view_model();
        assert!(vm.pending_confirmation.is_some());
        assert!(!vm.send_enabled);
        assert!(a.state().calculated_indices.is_empty());

        a.confirm_tool();
        assert_eq!(a.phase(), ChatPhase::Idle);
        assert_eq!(a.state().history("Birth Rate").len(), 1);
        assert_eq!(a.state().history("Weaning Rate").len(), 1);
        let msg = last_message(&a);
        assert_eq!(msg.role, Role::System);
        assert!(msg.content.contains("2 record(s)"));
        assert!(a.conversations().active_file_for(&chat_id).is_none());
    }

    #[tokio::test]
    async fn cancel_leaves_state_untouched() {
        let (mut a, _, _) = assistant(vec![AiResponse::ToolCall {
            name: IMPORT_SPREADSHEET_TOOL.into(),
            args: serde_json::Value::Null,
        }]);
        attach_sheet(&mut a);
        a.send_text("Import").await;
        a.cancel_tool();
        assert_eq!(last_message(&a).content, CANCELLED_MESSAGE);
        assert!(a.state().calculated_indices.is_empty());
        assert_eq!(a.phase(), ChatPhase::Idle);
    }

    #[tokio::test]
    async fn input_is_ignored_while_awaiting_confirmation() {
        let (mut a, backend, _) = assistant(vec![AiResponse::ToolCall {
            name: IMPORT_SPREADSHEET_TOOL.into(),
            args: serde_json::Value::Null,
        }]);
        attach_sheet(&mut a);
        a.send_text("Import").await;
        a.send_text("are you there?").await;
        assert_eq!(backend.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn import_without_file_reports_error() {
        let (mut a, _, _) = assistant(vec![AiResponse::ToolCall {
            name: IMPORT_SPREADSHEET_TOOL.into(),
            args: serde_json::Value::Null,
        }]);
        a.send_text("import my sheet").await;
        a.confirm_tool();
        let msg = last_message(&a);
        assert!(msg.content.starts_with("Error: "));
        assert!(msg.content.contains("no spreadsheet"));
    }

    #[tokio::test]
    async fn suggestions_need_data() {
        let (a, backend, _) = assistant(vec![]);
        assert_eq!(a.dashboard_suggestion().await, Suggestion::NotEnoughData);
        assert_eq!(a.index_suggestion("Birth Rate").await, Suggestion::NotEnoughData);
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_suggestion_and_continue_in_chat() {
        let (mut a, backend, _) = assistant(vec![AiResponse::Text("Check bull fertility.".into())]);
        a.state_mut().add_calculation(
            "Pregnancy Rate",
            CalculationRecord {
                id: "p".into(),
                result_text: "60.00 %".into(),
                date: "01/01/2024".into(),
                time: "10:00".into(),
                raw_inputs: vec![],
            },
        );
        let suggestion = a.index_suggestion("Pregnancy Rate").await;
        assert_eq!(suggestion, Suggestion::Ready("Check bull fertility.".into()));
        assert!(backend.last_prompt().contains("'Pregnancy Rate'"));

        let id = a.continue_in_chat("Check bull fertility.").unwrap();
        let chat = a.state().chat(&id).unwrap();
        assert_eq!(chat.title, "About: Check bull fertility.");
        assert_eq!(chat.messages[0].role, Role::Ai);
    }

    #[tokio::test]
    async fn rename_rejects_blank_title() {
        let (mut a, _, _) = assistant(vec![]);
        let id = a.start_new_chat();
        assert_eq!(a.rename_chat(&id, " "), Err(RenameError::EmptyTitle));
        a.rename_chat(&id, "Dry season").unwrap();
        assert_eq!(a.view_model().title, "Dry season");
    }
}
