//! BoviCheck terminal host.
//!
//! Wires configuration, the JSON store and the Gemini backend into the
//! assistant, then reads one command per line with line editing and
//! in-session history. Each command runs to completion before the next
//! line is read.

mod commands;
mod config;

use agent_host::{Assistant, Suggestion};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use commands::{parse_command, Command, CommandError, HELP};
use config::AppConfig;
use providers::GeminiClient;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use services::{backup, export, JsonStore};
use shared::chat::{ChatMessage, MessageKind, Role};
use shared::indices::{find_index, search_catalog, CalculationRecord, SlotKind};
use std::fs;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Host {
    assistant: Assistant<GeminiClient, JsonStore>,
    runtime: Runtime,
    last_suggestion: Option<String>,
}

fn print_message(msg: &ChatMessage) {
    let who = match msg.role {
        Role::User => "you",
        Role::Ai => "assistant",
        Role::System => "system",
    };
    match msg.kind {
        MessageKind::Text => println!("[{}] {}", who, msg.content),
        MessageKind::Image | MessageKind::File => {
            let label = if msg.kind == MessageKind::Image { "image" } else { "file" };
            match &msg.caption {
                Some(caption) => println!("[{}] ({}: {}) {}", who, label, msg.content, caption),
                None => println!("[{}] ({}: {})", who, label, msg.content),
            }
        }
    }
}

fn print_record(record: &CalculationRecord) {
    let short_id: String = record.id.chars().take(8).collect();
    println!(
        "  #{}  {}  {} {}",
        short_id, record.result_text, record.date, record.time
    );
}

impl Host {
    fn index_name(name: &str) -> Result<&'static str> {
        find_index(name)
            .map(|d| d.name)
            .ok_or_else(|| anyhow!("unknown index '{}', type indices", name))
    }

    /// Full record id from a unique prefix.
    fn record_id(&self, index: &str, prefix: &str) -> Result<String> {
        let matches: Vec<&CalculationRecord> = self
            .assistant
            .state()
            .history(index)
            .iter()
            .filter(|r| r.id.starts_with(prefix))
            .collect();
        match matches.as_slice() {
            [record] => Ok(record.id.clone()),
            [] => bail!("no record #{} under {}", prefix, index),
            _ => bail!("#{} matches several records, use more characters", prefix),
        }
    }

    /// Selected names, or every index with data when none were given.
    fn selection(&self, names: Vec<String>) -> Vec<String> {
        if names.is_empty() {
            self.assistant
                .state()
                .calculated_indices
                .keys()
                .cloned()
                .collect()
        } else {
            names
        }
    }

    /// Runs a chat action and prints what it appended.
    fn chat_turn(&mut self, turn: impl FnOnce(&mut Self)) {
        let before = self.assistant.view_model();
        turn(self);
        let after = self.assistant.view_model();
        let skip = if before.chat_id == after.chat_id {
            before.messages.len()
        } else {
            0
        };
        after.messages.iter().skip(skip).for_each(print_message);
        if let Some(prompt) = &after.pending_confirmation {
            println!("{} (confirm / cancel)", prompt);
        }
    }

    fn run(&mut self, cmd: Command) -> Result<bool> {
        match cmd {
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
            Command::Indices(query) => {
                for def in search_catalog(&query) {
                    let slots: Vec<String> = def
                        .inputs
                        .iter()
                        .map(|s| match s.kind {
                            SlotKind::Numeric => s.label.to_string(),
                            SlotKind::Date => format!("{} (DD/MM/YYYY)", s.label),
                        })
                        .collect();
                    println!("{} [{}]\n  {}\n  inputs: {}", def.name, def.short_name, def.concept, slots.join("; "));
                }
            }
            Command::Calc { index, inputs } => {
                let def = find_index(&index)
                    .ok_or_else(|| anyhow!("unknown index '{}', type indices", index))?;
                let record = services::calculate(def, &inputs)?;
                println!("{} = {}", def.name, record.result_text);
                self.assistant.state_mut().add_calculation(def.name, record);
                self.assistant.persist();
            }
            Command::Edit { index, id, inputs } => {
                let def = find_index(&index)
                    .ok_or_else(|| anyhow!("unknown index '{}', type indices", index))?;
                let id = self.record_id(def.name, &id)?;
                let record = services::recalculate(def, &inputs, &id)?;
                println!("{} = {}", def.name, record.result_text);
                self.assistant
                    .state_mut()
                    .update_calculation(def.name, &id, record);
                self.assistant.persist();
            }
            Command::History { index, range } => {
                let name = Self::index_name(&index)?;
                let state = self.assistant.state();
                let records = match range {
                    Some((start, end)) => state.history_in_range(name, &start, &end)?,
                    None => state.history_sorted(name),
                };
                if records.is_empty() {
                    println!("No records for {}.", name);
                }
                records.into_iter().for_each(print_record);
            }
            Command::Delete { index, id } => {
                let name = Self::index_name(&index)?;
                let id = self.record_id(name, &id)?;
                self.assistant.state_mut().delete_calculation(name, &id);
                self.assistant.persist();
                println!("Record deleted.");
            }
            Command::Clear(index) => {
                let name = Self::index_name(&index)?;
                if self.assistant.state_mut().clear_index(name) {
                    self.assistant.persist();
                    println!("All {} records deleted.", name);
                } else {
                    println!("No records for {}.", name);
                }
            }
            Command::Backup { file, indices } => {
                let selected = self.selection(indices);
                let json =
                    backup::create_backup(&self.assistant.state().calculated_indices, &selected)?;
                write_file(&file, json.as_bytes())?;
                println!("Backup saved to {}.", file.display());
            }
            Command::Restore(file) => {
                let raw = fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let restored = backup::parse_backup(&raw)?;
                let added = self.assistant.state_mut().merge_restored(restored);
                self.assistant.persist();
                println!("Restore finished: {} record(s) added.", added);
            }
            Command::Export { file, indices } => {
                let selected = self.selection(indices);
                let bytes = export::export_spreadsheet(
                    &self.assistant.state().calculated_indices,
                    &selected,
                )?;
                write_file(&file, &bytes)?;
                println!("Spreadsheet saved to {}.", file.display());
            }
            Command::Chat(text) => {
                let runtime = self.runtime.handle().clone();
                self.chat_turn(|host| runtime.block_on(host.assistant.send_text(&text)));
            }
            Command::Attach { path, caption } => {
                let runtime = self.runtime.handle().clone();
                self.chat_turn(|host| {
                    runtime.block_on(host.assistant.send_file(&path, caption.as_deref()))
                });
            }
            Command::Confirm => self.chat_turn(|host| host.assistant.confirm_tool()),
            Command::Cancel => self.chat_turn(|host| host.assistant.cancel_tool()),
            Command::Chats => {
                let state = self.assistant.state();
                for chat in &state.chat_history {
                    let marker = if state.current_chat_id.as_deref() == Some(chat.id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {}  {}  ({} messages, {})",
                        marker,
                        chat.id,
                        chat.title,
                        chat.messages.len(),
                        chat.created_at.format("%d/%m/%Y %H:%M")
                    );
                }
            }
            Command::NewChat => {
                let id = self.assistant.start_new_chat();
                println!("Started chat {}.", id);
            }
            Command::OpenChat(id) => {
                if !self.assistant.open_chat(&id) {
                    bail!("no chat {}", id);
                }
                self.assistant
                    .view_model()
                    .messages
                    .iter()
                    .for_each(print_message);
            }
            Command::RemoveChat(id) => {
                if !self.assistant.delete_chat(&id) {
                    bail!("no chat {}", id);
                }
                println!("Chat deleted.");
            }
            Command::RenameChat { id, title } => {
                self.assistant.rename_chat(&id, &title)?;
                println!("Chat renamed.");
            }
            Command::Suggest(index) => {
                if !self.assistant.state().ai_settings.suggestions_enabled {
                    println!("Suggestions are turned off (suggestions on).");
                    return Ok(true);
                }
                let suggestion = match index {
                    Some(index) => {
                        let name = Self::index_name(&index)?;
                        self.runtime.block_on(self.assistant.index_suggestion(name))
                    }
                    None => self.runtime.block_on(self.assistant.dashboard_suggestion()),
                };
                println!("{}", suggestion.display_text());
                if let Suggestion::Ready(text) = suggestion {
                    self.last_suggestion = Some(text);
                }
            }
            Command::Continue => {
                let text = self
                    .last_suggestion
                    .take()
                    .ok_or_else(|| anyhow!("no suggestion to continue, run suggest first"))?;
                if let Some(id) = self.assistant.continue_in_chat(&text) {
                    println!("Started chat {}.", id);
                }
            }
            Command::Ai(enabled) => self.assistant.set_ai_enabled(enabled),
            Command::Suggestions(enabled) => self.assistant.set_suggestions_enabled(enabled),
            Command::ApiKey(key) => {
                self.assistant.set_api_key(&key);
                println!("API key saved.");
            }
            Command::Theme(mode) => self.assistant.set_theme_mode(mode),
            Command::Color(name) => {
                if !self.assistant.set_primary_color(&name) {
                    bail!("unknown color '{}'", name);
                }
            }
            Command::Reset => {
                self.assistant.state_mut().reset();
                self.assistant.persist();
                self.last_suggestion = None;
                println!("All indices and chats deleted.");
            }
        }
        Ok(true)
    }
}

#[derive(Debug, PartialEq)]
enum Input {
    Line(String),
    /// Ctrl-C: drop the line, keep the session.
    Interrupted,
    /// Ctrl-D or a broken terminal.
    End,
}

fn next_input(read: Result<String, ReadlineError>) -> Input {
    match read {
        Ok(line) => Input::Line(line),
        Err(ReadlineError::Interrupted) => Input::Interrupted,
        Err(ReadlineError::Eof) => Input::End,
        Err(e) => {
            warn!(error = %e, "reading input failed");
            Input::End
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let store = JsonStore::in_dir(&config.data_dir);
    info!(path = %store.path().display(), model = %config.gemini_model, "starting BoviCheck");

    let state = store.load();
    let backend = GeminiClient::new(&config.gemini_model, &config.gemini_base_url)?;
    let mut assistant = Assistant::new(state, backend, store);
    assistant.set_observer(|vm| {
        if vm.loading {
            println!("... thinking");
        }
    });

    let mut host = Host {
        assistant,
        runtime: Runtime::new().context("starting async runtime")?,
        last_suggestion: None,
    };

    println!(
        "BoviCheck {} - type help for commands ({})",
        env!("CARGO_PKG_VERSION"),
        Local::now().format("%d/%m/%Y")
    );
    let mut rl = DefaultEditor::new().context("starting line editor")?;
    loop {
        let line = match next_input(rl.readline("> ")) {
            Input::Line(line) => line,
            Input::Interrupted => {
                println!("CTRL-C detected. Type 'quit' to exit.");
                continue;
            }
            Input::End => break,
        };
        let cmd = match parse_command(&line) {
            Ok(cmd) => cmd,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        // Keys are never written to the history.
        if !matches!(cmd, Command::ApiKey(_)) {
            let _ = rl.add_history_entry(line.trim());
        }
        match host.run(cmd) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!(error = %e, "command failed");
                println!("Error: {:#}", e);
            }
        }
    }
    host.assistant.persist();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_c_keeps_the_session_and_ctrl_d_ends_it() {
        assert_eq!(next_input(Ok("help".into())), Input::Line("help".into()));
        assert_eq!(next_input(Err(ReadlineError::Interrupted)), Input::Interrupted);
        assert_eq!(next_input(Err(ReadlineError::Eof)), Input::End);
        let broken = ReadlineError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(next_input(Err(broken)), Input::End);
    }

    #[test]
    fn blank_lines_are_skipped_without_an_error() {
        assert_eq!(parse_command("  \t"), Err(CommandError::Empty));
        assert!(matches!(parse_command("ai perhaps"), Err(CommandError::Expected(_))));
    }
}
