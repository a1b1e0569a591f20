//! In-memory aggregate of everything BoviCheck persists.

use crate::chat::ChatSession;
use crate::indices::{newest_first, CalculatedIndices, CalculationRecord, DATE_FORMAT};
use crate::settings::{AiSettings, ThemePreference};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenameError {
    #[error("the title cannot be empty")]
    EmptyTitle,
    #[error("conversation {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("{field}: '{value}' is not a valid date (DD/MM/YYYY)")]
    InvalidDate { field: &'static str, value: String },
    #[error("the start date must not be after the end date")]
    StartAfterEnd,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub calculated_indices: CalculatedIndices,
    #[serde(default)]
    pub theme_preference: ThemePreference,
    #[serde(default)]
    pub ai_settings: AiSettings,
    #[serde(default)]
    pub chat_history: Vec<ChatSession>,
    /// Active conversation. Weak reference by id, never persisted.
    #[serde(skip)]
    pub current_chat_id: Option<String>,
}

impl AppState {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a persisted blob and repairs legacy records.
    ///
    /// Only invalid JSON or a non-object root is an error. A record or chat
    /// that does not fit the schema is skipped on its own, and an unreadable
    /// settings section falls back to its default.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let mut root = match serde_json::from_str::<Value>(raw)? {
            Value::Object(root) => root,
            other => return serde_json::from_value(other),
        };
        let mut state = AppState {
            calculated_indices: load_indices(root.remove("calculated_indices")),
            theme_preference: load_section(&mut root, "theme_preference"),
            ai_settings: load_section(&mut root, "ai_settings"),
            chat_history: load_chats(root.remove("chat_history")),
            current_chat_id: None,
        };
        state.normalize();
        Ok(state)
    }

    /// Drops empty histories and backfills blank record ids.
    pub fn normalize(&mut self) {
        self.calculated_indices.retain(|_, records| !records.is_empty());
        for records in self.calculated_indices.values_mut() {
            for record in records.iter_mut().filter(|r| r.id.trim().is_empty()) {
                record.id = Uuid::new_v4().to_string();
            }
        }
    }

    /// Clears index history and chats. Settings and theme survive.
    pub fn reset(&mut self) {
        self.calculated_indices.clear();
        self.chat_history.clear();
        self.current_chat_id = None;
    }

    pub fn has_data(&self) -> bool {
        !self.calculated_indices.is_empty()
    }

    // --- calculation history ---

    pub fn add_calculation(&mut self, index_name: &str, record: CalculationRecord) {
        debug!(index = index_name, id = %record.id, "adding calculation");
        self.calculated_indices
            .entry(index_name.to_string())
            .or_default()
            .push(record);
    }

    pub fn history(&self, index_name: &str) -> &[CalculationRecord] {
        self.calculated_indices
            .get(index_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn history_sorted(&self, index_name: &str) -> Vec<&CalculationRecord> {
        newest_first(self.history(index_name))
    }

    /// Records whose date falls within `start..=end`, newest first.
    pub fn history_in_range(
        &self,
        index_name: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<&CalculationRecord>, RangeError> {
        let start = parse_bound("start date", start)?;
        let end = parse_bound("end date", end)?;
        if start > end {
            return Err(RangeError::StartAfterEnd);
        }
        Ok(self
            .history_sorted(index_name)
            .into_iter()
            .filter(|r| matches!(r.parsed_date(), Some(d) if d >= start && d <= end))
            .collect())
    }

    pub fn find_calculation(&self, index_name: &str, id: &str) -> Option<&CalculationRecord> {
        self.history(index_name).iter().find(|r| r.id == id)
    }

    /// Replaces a record in place, keeping its id. Returns false when absent.
    pub fn update_calculation(
        &mut self,
        index_name: &str,
        id: &str,
        mut record: CalculationRecord,
    ) -> bool {
        let Some(slot) = self
            .calculated_indices
            .get_mut(index_name)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
        else {
            return false;
        };
        record.id = id.to_string();
        *slot = record;
        true
    }

    pub fn delete_calculation(&mut self, index_name: &str, id: &str) -> bool {
        let Some(records) = self.calculated_indices.get_mut(index_name) else {
            return false;
        };
        let before = records.len();
        records.retain(|r| r.id != id);
        let removed = records.len() != before;
        if records.is_empty() {
            self.calculated_indices.remove(index_name);
        }
        removed
    }

    pub fn clear_index(&mut self, index_name: &str) -> bool {
        self.calculated_indices.remove(index_name).is_some()
    }

    /// Appends restored records whose id is not yet present under their
    /// index. Returns the number of records added.
    pub fn merge_restored(&mut self, restored: CalculatedIndices) -> usize {
        let mut added = 0;
        for (name, records) in restored {
            if records.is_empty() {
                continue;
            }
            let existing = self.calculated_indices.entry(name).or_default();
            for record in records {
                if !existing.iter().any(|r| r.id == record.id) {
                    existing.push(record);
                    added += 1;
                }
            }
        }
        self.normalize();
        added
    }

    // --- chat sessions ---

    /// Inserts at the front of the history and makes it current.
    pub fn add_chat(&mut self, chat: ChatSession) -> String {
        let id = chat.id.clone();
        self.chat_history.insert(0, chat);
        self.current_chat_id = Some(id.clone());
        id
    }

    pub fn chat(&self, id: &str) -> Option<&ChatSession> {
        self.chat_history.iter().find(|c| c.id == id)
    }

    pub fn chat_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.chat_history.iter_mut().find(|c| c.id == id)
    }

    pub fn current_chat(&self) -> Option<&ChatSession> {
        self.current_chat_id.as_deref().and_then(|id| self.chat(id))
    }

    pub fn current_chat_mut(&mut self) -> Option<&mut ChatSession> {
        let id = self.current_chat_id.clone()?;
        self.chat_mut(&id)
    }

    pub fn set_current_chat(&mut self, id: &str) -> bool {
        if self.chat(id).is_some() {
            self.current_chat_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn rename_chat(&mut self, id: &str, title: &str) -> Result<(), RenameError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RenameError::EmptyTitle);
        }
        let chat = self
            .chat_mut(id)
            .ok_or_else(|| RenameError::NotFound(id.to_string()))?;
        chat.set_title(title);
        Ok(())
    }

    pub fn delete_chat(&mut self, id: &str) -> bool {
        let before = self.chat_history.len();
        self.chat_history.retain(|c| c.id != id);
        if self.current_chat_id.as_deref() == Some(id) {
            self.current_chat_id = None;
        }
        self.chat_history.len() != before
    }
}

fn load_section<T: DeserializeOwned + Default>(root: &mut Map<String, Value>, key: &str) -> T {
    match root.remove(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(section = key, error = %e, "unreadable section, using defaults");
            T::default()
        }),
    }
}

/// Items that fail to deserialize are logged and dropped.
fn load_list<T: DeserializeOwned>(value: Option<Value>, what: &str) -> Vec<T> {
    let items = match value {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => return Vec::new(),
        Some(_) => {
            warn!(what, "expected a list, ignoring");
            return Vec::new();
        }
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(what, position, error = %e, "skipping unreadable entry");
                None
            }
        })
        .collect()
}

/// Chats saved without `auto_title` get it inferred from their content.
fn load_chats(value: Option<Value>) -> Vec<ChatSession> {
    let items = match value {
        Some(Value::Array(items)) => items,
        other => return load_list(other, "chat"),
    };
    let legacy: Vec<bool> = items
        .iter()
        .map(|c| c.get("auto_title").is_none())
        .collect();
    items
        .into_iter()
        .zip(legacy)
        .enumerate()
        .filter_map(|(position, (item, legacy))| {
            match serde_json::from_value::<ChatSession>(item) {
                Ok(mut chat) => {
                    if legacy {
                        chat.infer_auto_title();
                    }
                    Some(chat)
                }
                Err(e) => {
                    warn!(what = "chat", position, error = %e, "skipping unreadable entry");
                    None
                }
            }
        })
        .collect()
}

fn load_indices(value: Option<Value>) -> CalculatedIndices {
    match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(name, records)| (name, load_list(Some(records), "record")))
            .collect(),
        None | Some(Value::Null) => CalculatedIndices::new(),
        Some(_) => {
            warn!("calculated_indices is not an object, ignoring");
            CalculatedIndices::new()
        }
    }
}

fn parse_bound(field: &'static str, value: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| RangeError::InvalidDate {
        field,
        value: value.to_string(),
    })
}
