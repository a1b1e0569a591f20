//! Backup and restore of calculation history.

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::indices::{CalculatedIndices, CalculationRecord};
use tracing::warn;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("select at least one index to back up")]
    NothingSelected,

    #[error("none of the selected indices has data")]
    NoData,

    #[error("invalid backup file: {0}")]
    InvalidFormat(String),

    #[error("could not serialize backup: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub app_version: String,
    pub backup_timestamp: String,
    pub selected_indices_data: CalculatedIndices,
}

/// Serializes the selected indices that have at least one record.
pub fn create_backup<S: AsRef<str>>(
    indices: &CalculatedIndices,
    selected: &[S],
) -> Result<String, BackupError> {
    if selected.is_empty() {
        return Err(BackupError::NothingSelected);
    }
    let selected_indices_data: CalculatedIndices = selected
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            indices
                .get(name)
                .filter(|records| !records.is_empty())
                .map(|records| (name.to_string(), records.clone()))
        })
        .collect();
    if selected_indices_data.is_empty() {
        return Err(BackupError::NoData);
    }
    let backup = BackupFile {
        app_version: APP_VERSION.to_string(),
        backup_timestamp: Local::now().to_rfc3339(),
        selected_indices_data,
    };
    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Reads the `selected_indices_data` mapping of a backup. Records without an
/// id receive `restored_{timestamp}_{index}_{position}`. Malformed records
/// are skipped.
pub fn parse_backup(raw: &str) -> Result<CalculatedIndices, BackupError> {
    let root: Value =
        serde_json::from_str(raw).map_err(|e| BackupError::InvalidFormat(e.to_string()))?;
    let data = root
        .get("selected_indices_data")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            BackupError::InvalidFormat("'selected_indices_data' must be an object".into())
        })?;

    let stamp = Utc::now().timestamp();
    let mut restored = CalculatedIndices::new();
    for (name, records) in data {
        let Some(records) = records.as_array() else {
            warn!(index = %name, "skipping non-list index entry in backup");
            continue;
        };
        let mut parsed = Vec::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            let mut record = record.clone();
            let Some(fields) = record.as_object_mut() else {
                continue;
            };
            let has_id = fields
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| !id.trim().is_empty());
            if !has_id {
                fields.insert(
                    "id".into(),
                    Value::String(format!("restored_{}_{}_{}", stamp, name, position)),
                );
            }
            match serde_json::from_value::<CalculationRecord>(record) {
                Ok(rec) => parsed.push(rec),
                Err(e) => warn!(index = %name, position, error = %e, "skipping malformed record"),
            }
        }
        if !parsed.is_empty() {
            restored.insert(name.clone(), parsed);
        }
    }
    Ok(restored)
}

pub fn backup_file_name(day: NaiveDate) -> String {
    format!("bovicheck_backup_{}.json", day.format("%Y%m%d"))
}
