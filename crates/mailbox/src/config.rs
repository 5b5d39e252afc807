//! Configuration loading for the mailbox engine
//!
//! Settings are loaded from (in order of priority):
//! 1. JSON file (~/.config/mailbox/mailbox.json)
//! 2. Runtime environment variables (fallback)
//!
//! Every setting except the service URL has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings filename in the mailbox config directory
const CONFIG_FILE: &str = "mailbox.json";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Base URL of the mail service, e.g. `https://ent.example.org/zimbra/`
    pub base_url: String,
    /// Debounce window of the draft autosave
    pub autosave_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Largest local file accepted for upload, `0` for no limit
    pub max_attachment_bytes: u64,
    /// Value of the `Authorization` header sent with every request
    pub auth_header: Option<String>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090/zimbra/".to_string(),
            autosave_delay_ms: 5000,
            request_timeout_secs: 30,
            max_attachment_bytes: 0,
            auth_header: None,
        }
    }
}

impl MailboxConfig {
    /// Load settings from the config file, falling back to the environment
    pub fn load() -> Result<Self> {
        if config::config_exists(CONFIG_FILE) {
            let settings: MailboxConfig = config::load_json(CONFIG_FILE)?;
            log::info!("Mailbox settings loaded from {}", CONFIG_FILE);
            return Ok(settings);
        }

        Self::from_env()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse mailbox settings JSON")
    }

    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("MAILBOX_BASE_URL")
            .context("MAILBOX_BASE_URL environment variable not set")?;
        let defaults = Self::default();

        Ok(Self {
            base_url,
            autosave_delay_ms: env_number("MAILBOX_AUTOSAVE_MS")?.unwrap_or(defaults.autosave_delay_ms),
            request_timeout_secs: env_number("MAILBOX_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            max_attachment_bytes: env_number("MAILBOX_MAX_ATTACHMENT_BYTES")?
                .unwrap_or(defaults.max_attachment_bytes),
            auth_header: std::env::var("MAILBOX_AUTH_HEADER").ok(),
        })
    }

    /// Persist settings to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(CONFIG_FILE, self)
    }

    /// Get the default settings file path (~/.config/mailbox/mailbox.json)
    pub fn default_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    /// Upload limit, `None` when unlimited
    pub fn attachment_limit(&self) -> Option<u64> {
        (self.max_attachment_bytes > 0).then_some(self.max_attachment_bytes)
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a number, got {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_settings() {
        let json = r#"{ "base_url": "https://ent.example.org/zimbra/", "autosave_delay_ms": 2000 }"#;

        let settings = MailboxConfig::from_json(json).unwrap();
        assert_eq!(settings.base_url, "https://ent.example.org/zimbra/");
        assert_eq!(settings.autosave_delay(), Duration::from_secs(2));
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.attachment_limit(), None);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{ "base_url": "https://mail.example.org/", "max_attachment_bytes": 1024 }"#,
        )
        .unwrap();

        let settings = MailboxConfig::from_file(&path).unwrap();
        assert_eq!(settings.attachment_limit(), Some(1024));
        assert_eq!(settings.autosave_delay_ms, 5000);
    }

    #[test]
    fn test_invalid_json() {
        assert!(MailboxConfig::from_json("{ not json").is_err());
    }
}
