//! Telegram transport settings.

use config::ConfigError;
use poll_points_core::config::CoreSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bot name used in the welcome message when none is configured.
pub const DEFAULT_BOT_NAME: &str = "AlphaverseArc_bot";

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    #[serde(default)]
    pub telegram_token: String,
    /// Legacy name of the token variable (`BOT_TOKEN`).
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Name shown in the welcome message.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

fn default_bot_name() -> String {
    DEFAULT_BOT_NAME.to_string()
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Core settings shared across transport handlers.
    pub core: Arc<CoreSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(core: CoreSettings, telegram: TelegramSettings) -> Self {
        Self {
            core: Arc::new(core),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or no token is configured.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = poll_points_core::config::build_config()?.try_deserialize()?;
        settings.resolve_token()
    }

    /// Fall back to `BOT_TOKEN` when `TELEGRAM_TOKEN` is unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when neither variable holds a token.
    pub fn resolve_token(mut self) -> Result<Self, ConfigError> {
        if self.telegram_token.trim().is_empty() {
            if let Some(token) = self.bot_token.take().filter(|t| !t.trim().is_empty()) {
                self.telegram_token = token;
            }
        }
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::NotFound(
                "telegram_token (set TELEGRAM_TOKEN or BOT_TOKEN)".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Max retry attempts for Telegram API send operations.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff delay (milliseconds) between retries.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay (milliseconds) between retries.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
