pub mod chat;
pub mod indices;
pub mod state;
pub mod tool;

pub use chat::{ChatMessage, ChatSession, MessageKind, Role};
pub use indices::{CalculatedIndices, CalculationRecord, IndexDefinition, InputSlot, SlotKind};
pub use state::AppState;

pub mod settings {
    use serde::{Deserialize, Serialize};
    use std::env;

    pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

    fn api_key_from_env() -> String {
        env::var(API_KEY_ENV).unwrap_or_default()
    }

    /// Assistant configuration. Persisted on every toggle.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AiSettings {
        #[serde(default)]
        pub enabled: bool,
        #[serde(default = "api_key_from_env")]
        pub api_key: String,
        /// Suggestion cards on the dashboard and index pages
        #[serde(default, alias = "suggestions_on_dashboard")]
        pub suggestions_enabled: bool,
    }

    impl Default for AiSettings {
        fn default() -> Self {
            Self {
                enabled: false,
                api_key: api_key_from_env(),
                suggestions_enabled: false,
            }
        }
    }

    impl AiSettings {
        /// True when a remote call may be attempted.
        pub fn is_configured(&self) -> bool {
            self.enabled && !self.api_key.trim().is_empty()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum ThemeMode {
        Light,
        Dark,
        /// Also absorbs unknown mode strings.
        #[default]
        #[serde(other)]
        System,
    }

    /// Seed colors offered to the presentation layer.
    pub const PRIMARY_COLORS: &[&str] = &[
        "TEAL_ACCENT_700",
        "BLUE_ACCENT_700",
        "RED_ACCENT_700",
        "GREEN_ACCENT_700",
        "ORANGE_ACCENT_700",
        "PURPLE_ACCENT_700",
        "INDIGO_ACCENT_700",
        "AMBER_ACCENT_700",
        "CYAN_ACCENT_700",
        "PINK_ACCENT_700",
        "BROWN",
        "BLUE_GREY",
    ];

    fn default_color() -> String {
        PRIMARY_COLORS[0].to_string()
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ThemePreference {
        #[serde(default)]
        pub theme_mode: ThemeMode,
        #[serde(default = "default_color")]
        pub primary_color_name: String,
    }

    impl Default for ThemePreference {
        fn default() -> Self {
            Self {
                theme_mode: ThemeMode::System,
                primary_color_name: default_color(),
            }
        }
    }

    impl ThemePreference {
        /// Returns false and leaves the preference unchanged for unknown names.
        pub fn set_primary_color(&mut self, name: &str) -> bool {
            if PRIMARY_COLORS.contains(&name) {
                self.primary_color_name = name.to_string();
                true
            } else {
                false
            }
        }
    }

}
