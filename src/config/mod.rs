//! Typed bot configuration.
//!
//! Loaded from a JSON5 file; every field has a serde default so a minimal
//! config only needs the command prefix and a bot token. The token can also
//! come from the `VOTABOT_TOKEN` environment variable, which wins over the
//! file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::channels::discord::DiscordConfig;

/// Environment variable overriding the configured bot token.
pub const TOKEN_ENV: &str = "VOTABOT_TOKEN";

/// Default config file path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "votabot.json5";

/// Configuration load errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] json5::Error),
}

/// Root bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotConfig {
    /// Command prefix, e.g. `!vota`.
    pub prefix: String,
    /// Invite link handed out by the `invite` command.
    pub invite_link: Option<String>,
    /// Poll store snapshot path.
    pub store_path: PathBuf,
    /// Store autosave interval in seconds.
    pub autosave_secs: u64,
    /// Expiration sweep interval in seconds.
    pub expiration_sweep_secs: u64,
    /// Retention sweep interval in seconds.
    pub retention_sweep_secs: u64,
    /// Discord channel settings.
    pub discord: DiscordConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: "!vota".to_string(),
            invite_link: None,
            store_path: PathBuf::from("polls.json"),
            autosave_secs: 3_600,
            expiration_sweep_secs: 10,
            retention_sweep_secs: 86_400,
            discord: DiscordConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => json5::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                config.discord.bot_token = token;
            }
        }
        Ok(config)
    }

    /// Serialize the config as pretty JSON with the bot token redacted.
    pub fn redacted_json(&self) -> String {
        let mut copy = self.clone();
        if !copy.discord.bot_token.is_empty() {
            copy.discord.bot_token = "<redacted>".to_string();
        }
        serde_json::to_string_pretty(&copy).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load(&dir.path().join("absent.json5")).unwrap();
        assert_eq!(config.prefix, "!vota");
        assert_eq!(config.expiration_sweep_secs, 10);
        assert_eq!(config.retention_sweep_secs, 86_400);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votabot.json5");
        std::fs::write(
            &path,
            r#"{ prefix: "!poll", inviteLink: "https://discord.gg/x" }"#,
        )
        .unwrap();

        let config = BotConfig::load(&path).unwrap();
        assert_eq!(config.prefix, "!poll");
        assert_eq!(config.invite_link.as_deref(), Some("https://discord.gg/x"));
        assert_eq!(config.autosave_secs, 3_600);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votabot.json5");
        std::fs::write(&path, "{ prefix: ").unwrap();

        assert!(matches!(BotConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn redacted_json_hides_the_token() {
        let mut config = BotConfig::default();
        config.discord.bot_token = "secret-token".to_string();

        let json = config.redacted_json();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("<redacted>"));
    }
}
