//! Host configuration read from the environment.

use providers::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "BOVICHECK_DATA_DIR";
pub const MODEL_ENV: &str = "BOVICHECK_GEMINI_MODEL";
pub const BASE_URL_ENV: &str = "BOVICHECK_GEMINI_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub gemini_model: String,
    pub gemini_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let data_dir = non_blank(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self {
            data_dir,
            gemini_model: non_blank(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: non_blank(BASE_URL_ENV)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("br.com", "BoviCheck", "BoviCheck")
        .map(|proj| proj.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.gemini_model, DEFAULT_MODEL);
        assert_eq!(cfg.gemini_base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.data_dir, default_data_dir());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            (DATA_DIR_ENV, "/srv/bovicheck"),
            (MODEL_ENV, "gemini-2.0-flash"),
            (BASE_URL_ENV, "http://localhost:8080"),
        ]);
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/bovicheck"));
        assert_eq!(cfg.gemini_model, "gemini-2.0-flash");
        assert_eq!(cfg.gemini_base_url, "http://localhost:8080");
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = config(&[(MODEL_ENV, "  ")]);
        assert_eq!(cfg.gemini_model, DEFAULT_MODEL);
    }
}
