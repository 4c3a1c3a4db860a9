use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    // Bearer token; requests go out anonymously (guest mode) when unset
    pub token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    // Defaults to ~/.quill/history.json
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_history_shown: usize,
    pub language: String,
    // Whether to use terminal alternate screen in the editor
    pub alt_screen: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EditorConfig {
    pub scroll_debounce_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_history_shown: 20,
            language: "auto".to_string(),
            alt_screen: true,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            scroll_debounce_ms: 50,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            let config = Config::default();
            if let Err(err) = config.save() {
                tracing::warn!(error = %err, "could not write default config");
            }
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path();
        fs::create_dir_all(Self::base_dir())?;

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// Environment variables win over the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("QUILL_API_URL") {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }
        if let Ok(token) = std::env::var("QUILL_TOKEN") {
            if !token.trim().is_empty() {
                self.api.token = Some(token.trim().to_string());
            }
        }
        if let Ok(v) = std::env::var("QUILL_ALT_SCREEN") {
            let v = v.to_lowercase();
            self.display.alt_screen = !(v == "0" || v == "false");
        }
    }

    pub fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quill")
    }

    fn get_config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    pub fn history_path(&self) -> PathBuf {
        self.storage
            .history_file
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("history.json"))
    }

    pub fn log_path() -> PathBuf {
        Self::base_dir().join("quill.log")
    }

    pub fn get_effective_language(&self) -> String {
        if self.display.language == "auto" {
            // Try to get system language
            std::env::var("LANG")
                .unwrap_or_else(|_| "en_US".to_string())
                .split('.')
                .next()
                .unwrap_or("en")
                .to_string()
        } else {
            self.display.language.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str("[api]\nbase_url = \"https://notes.example\"\n").unwrap();
        assert_eq!(config.api.base_url, "https://notes.example");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.token, None);
        assert_eq!(config.editor.scroll_debounce_ms, 50);
        assert_eq!(config.display.max_history_shown, 20);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.api.base_url, "http://localhost:8000");
        assert!(back.storage.history_file.is_none());
    }
}
