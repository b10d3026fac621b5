use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RecadoError;

/// Top-level Recado configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub recado: RecadoConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub time: TimeConfig,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecadoConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RecadoConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Provider selection plus per-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub default: String,
    pub openai: Option<OpenAiConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            openai: Some(OpenAiConfig::default()),
        }
    }
}

/// OpenAI-compatible API config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Read from `OPENAI_API_KEY` when empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Read from `TELEGRAM_BOT_TOKEN` when empty.
    #[serde(default)]
    pub bot_token: String,
    /// Telegram user IDs allowed to talk to the bot. Empty = allow all.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

/// Notion task database config.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotionConfig {
    /// Read from `NOTION_API_TOKEN` when empty.
    #[serde(default)]
    pub api_token: String,
    /// Read from `NOTION_DATABASE_ID` when empty.
    #[serde(default)]
    pub database_id: String,
}

/// Local persistence config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Reminder scheduler config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Local timezone config. Reminder times are shown to the user in this
/// timezone and stored in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl TimeConfig {
    /// Parse the configured IANA timezone name.
    pub fn tz(&self) -> Result<chrono_tz::Tz, RecadoError> {
        self.timezone
            .parse()
            .map_err(|_| RecadoError::Config(format!("unknown timezone: {}", self.timezone)))
    }
}

fn default_name() -> String {
    "Olivia".to_string()
}

fn default_data_dir() -> String {
    "~/.recado".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_db_path() -> String {
    "~/.recado/reminders.db".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_timezone() -> String {
    "America/Santiago".to_string()
}

fn default_true() -> bool {
    true
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Secrets left empty in
/// the file are filled from the environment.
pub fn load(path: &str) -> Result<Config, RecadoError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RecadoError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| RecadoError::Config(format!("failed to parse config: {e}")))?
    } else {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        Config::default()
    };

    fill_from_env(&mut config);
    Ok(config)
}

fn fill_from_env(config: &mut Config) {
    if let Some(ref mut openai) = config.provider.openai {
        if openai.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                openai.api_key = key;
            }
        }
    }
    if let Some(ref mut tg) = config.channel.telegram {
        if tg.bot_token.is_empty() {
            if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
                tg.bot_token = token;
            }
        }
    }
    if config.notion.api_token.is_empty() {
        if let Ok(token) = std::env::var("NOTION_API_TOKEN") {
            config.notion.api_token = token;
        }
    }
    if config.notion.database_id.is_empty() {
        if let Ok(id) = std::env::var("NOTION_DATABASE_ID") {
            config.notion.database_id = id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let cfg = load("/nonexistent/recado.toml").unwrap();
        assert_eq!(cfg.recado.name, "Olivia");
        assert_eq!(cfg.scheduler.poll_interval_secs, 60);
        assert!(cfg.scheduler.enabled);
        assert_eq!(cfg.time.timezone, "America/Santiago");
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
            [recado]
            name = "Olivia"
            log_level = "debug"

            [provider]
            default = "openai"

            [provider.openai]
            api_key = "sk-test"
            model = "gpt-4"

            [channel.telegram]
            enabled = true
            bot_token = "123:abc"
            allowed_users = [42]

            [notion]
            api_token = "secret"
            database_id = "db123"

            [memory]
            db_path = "/tmp/reminders.db"

            [scheduler]
            poll_interval_secs = 30

            [time]
            timezone = "Europe/Madrid"
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.provider.openai.unwrap().api_key, "sk-test");
        assert_eq!(cfg.channel.telegram.unwrap().allowed_users, vec![42]);
        assert_eq!(cfg.scheduler.poll_interval_secs, 30);
        assert_eq!(cfg.time.tz().unwrap(), chrono_tz::Europe::Madrid);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let time = TimeConfig {
            timezone: "Mars/Olympus".to_string(),
        };
        assert!(time.tz().is_err());
    }

    #[test]
    fn shellexpand_home() {
        std::env::set_var("HOME", "/home/test");
        assert_eq!(shellexpand("~/x.db"), "/home/test/x.db");
        assert_eq!(shellexpand("/abs/x.db"), "/abs/x.db");
    }
}
