//! Line commands accepted by the terminal front end.

use shared::settings::ThemeMode;
use std::path::PathBuf;

pub const HELP: &str = "\
Indices
  indices [query]                      list the index catalog
  calc <index> = v1; v2; ...           calculate and store a record
  edit <index> #<id> = v1; v2; ...     recalculate an existing record
  history <index> [DD/MM/YYYY DD/MM/YYYY]
  delete <index> #<id>                 delete one record
  clear <index>                        delete every record of an index
Files
  backup <file> [index; index ...]     write a JSON backup (default: all)
  restore <file>                       merge a JSON backup
  export <file> [index; index ...]     write an .xlsx spreadsheet
Assistant
  chat <text>                          ask the assistant
  attach <path> [| caption]            send an image or document
  confirm | cancel                     answer a pending action
  chats | new | open <id> | remove <id>
  rename <id> = <title>
  suggest [index]                      dashboard or per-index suggestion
  continue                             discuss the last suggestion in a new chat
Settings
  ai on|off   suggestions on|off   key <api key>
  theme system|light|dark   color <name>
  reset                                delete all indices and chats
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}', type help")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("expected {0}")]
    Expected(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Indices(String),
    Calc { index: String, inputs: Vec<String> },
    Edit { index: String, id: String, inputs: Vec<String> },
    History { index: String, range: Option<(String, String)> },
    Delete { index: String, id: String },
    Clear(String),
    Backup { file: PathBuf, indices: Vec<String> },
    Restore(PathBuf),
    Export { file: PathBuf, indices: Vec<String> },
    Chat(String),
    Attach { path: PathBuf, caption: Option<String> },
    Confirm,
    Cancel,
    Chats,
    NewChat,
    OpenChat(String),
    RemoveChat(String),
    RenameChat { id: String, title: String },
    Suggest(Option<String>),
    Continue,
    Ai(bool),
    Suggestions(bool),
    ApiKey(String),
    Theme(ThemeMode),
    Color(String),
    Reset,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<'a>(rest: &'a str, what: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Missing(what))
    } else {
        Ok(rest)
    }
}

/// `<head> = <tail>`, both trimmed and non-empty.
fn split_assign<'a>(
    rest: &'a str,
    usage: &'static str,
) -> Result<(&'a str, &'a str), CommandError> {
    match rest.split_once('=') {
        Some((head, tail)) if !head.trim().is_empty() && !tail.trim().is_empty() => {
            Ok((head.trim(), tail.trim()))
        }
        _ => Err(CommandError::Usage(usage)),
    }
}

/// `<index> #<id>`
fn split_record_ref<'a>(
    raw: &'a str,
    usage: &'static str,
) -> Result<(&'a str, &'a str), CommandError> {
    match raw.rsplit_once('#') {
        Some((index, id)) if !index.trim().is_empty() && !id.trim().is_empty() => {
            Ok((index.trim(), id.trim()))
        }
        _ => Err(CommandError::Usage(usage)),
    }
}

fn on_off(rest: &str) -> Result<bool, CommandError> {
    match rest.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(CommandError::Expected("on or off")),
    }
}

/// `<file> [index; index ...]`. File paths cannot contain spaces here.
fn file_and_indices(
    rest: &str,
    what: &'static str,
) -> Result<(PathBuf, Vec<String>), CommandError> {
    let rest = required(rest, what)?;
    let (file, indices) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Ok((PathBuf::from(file), split_list(indices)))
}

/// Splits a trailing pair of dates off a history command.
fn history_args(rest: &str) -> (String, Option<(String, String)>) {
    let words: Vec<&str> = rest.split_whitespace().collect();
    let is_date = |w: &str| w.len() == 10 && w.matches('/').count() == 2;
    if words.len() >= 3 && is_date(words[words.len() - 1]) && is_date(words[words.len() - 2]) {
        let index = words[..words.len() - 2].join(" ");
        let range = (
            words[words.len() - 2].to_string(),
            words[words.len() - 1].to_string(),
        );
        (index, Some(range))
    } else {
        (rest.to_string(), None)
    }
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "indices" => Command::Indices(rest.to_string()),
        "calc" => {
            let (index, inputs) = split_assign(rest, "calc <index> = v1; v2; ...")?;
            Command::Calc {
                index: index.to_string(),
                inputs: split_list(inputs),
            }
        }
        "edit" => {
            let usage = "edit <index> #<id> = v1; v2; ...";
            let (target, inputs) = split_assign(rest, usage)?;
            let (index, id) = split_record_ref(target, usage)?;
            Command::Edit {
                index: index.to_string(),
                id: id.to_string(),
                inputs: split_list(inputs),
            }
        }
        "history" => {
            let (index, range) = history_args(required(rest, "index name")?);
            Command::History { index, range }
        }
        "delete" => {
            let (index, id) = split_record_ref(rest, "delete <index> #<id>")?;
            Command::Delete {
                index: index.to_string(),
                id: id.to_string(),
            }
        }
        "clear" => Command::Clear(required(rest, "index name")?.to_string()),
        "backup" => {
            let (file, indices) = file_and_indices(rest, "backup file")?;
            Command::Backup { file, indices }
        }
        "restore" => Command::Restore(PathBuf::from(required(rest, "backup file")?)),
        "export" => {
            let (file, indices) = file_and_indices(rest, "spreadsheet file")?;
            Command::Export { file, indices }
        }
        "chat" => Command::Chat(required(rest, "message")?.to_string()),
        "attach" => {
            let (path, caption) = match rest.split_once('|') {
                Some((path, caption)) => (path.trim(), Some(caption.trim().to_string())),
                None => (rest, None),
            };
            Command::Attach {
                path: PathBuf::from(required(path, "file path")?),
                caption: caption.filter(|c| !c.is_empty()),
            }
        }
        "confirm" => Command::Confirm,
        "cancel" => Command::Cancel,
        "chats" => Command::Chats,
        "new" => Command::NewChat,
        "open" => Command::OpenChat(required(rest, "chat id")?.to_string()),
        "remove" => Command::RemoveChat(required(rest, "chat id")?.to_string()),
        "rename" => {
            let (id, title) = split_assign(rest, "rename <id> = <title>")?;
            Command::RenameChat {
                id: id.to_string(),
                title: title.to_string(),
            }
        }
        "suggest" => Command::Suggest(Some(rest.to_string()).filter(|s| !s.is_empty())),
        "continue" => Command::Continue,
        "ai" => Command::Ai(on_off(rest)?),
        "suggestions" => Command::Suggestions(on_off(rest)?),
        "key" => Command::ApiKey(required(rest, "API key")?.to_string()),
        "theme" => Command::Theme(match rest.to_ascii_lowercase().as_str() {
            "system" => ThemeMode::System,
            "light" => ThemeMode::Light,
            "dark" => ThemeMode::Dark,
            _ => return Err(CommandError::Expected("system, light or dark")),
        }),
        "color" => Command::Color(required(rest, "color name")?.to_string()),
        "reset" => Command::Reset,
        "" => return Err(CommandError::Empty),
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(cmd)
}
