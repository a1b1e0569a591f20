//! Tool types for assistant function calls.
//!
//! The model may answer with a structured call instead of prose. Every call
//! is held as a [`PendingToolCall`] until the user confirms or cancels it.

use serde::{Deserialize, Serialize};

pub const IMPORT_SPREADSHEET_TOOL: &str = "import_indices_from_spreadsheet";

/// Declaration advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments, `None` for no-argument tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ToolDefinition {
    pub fn import_spreadsheet() -> Self {
        Self {
            name: IMPORT_SPREADSHEET_TOOL.to_string(),
            description: "Imports the index records found in the spreadsheet the user attached \
                          to this conversation into the BoviCheck history. Call it only when the \
                          user asks to import or save the spreadsheet data."
                .to_string(),
            parameters: None,
        }
    }
}

/// A call the model requested and the user has not yet answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl PendingToolCall {
    /// Text for the confirmation prompt shown to the user.
    pub fn confirmation_text(&self) -> String {
        match self.name.as_str() {
            IMPORT_SPREADSHEET_TOOL => {
                "The assistant wants to import the attached spreadsheet's index records. Confirm?"
                    .to_string()
            }
            other => format!("The assistant wants to run '{}'. Confirm?", other),
        }
    }
}

/// Tool execution errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("no spreadsheet is attached to this conversation")]
    NoActiveFile,

    #[error("the attached file has no index rows to import")]
    NothingToImport,

    #[error("the attached file could not be read: {0}")]
    Unreadable(String),
}
