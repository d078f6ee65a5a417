//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the scoring defaults.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Default SQLite database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite://bot_data.db";
/// Points granted for each credited poll answer
pub const DEFAULT_POINTS_PER_POLL: i64 = 1;
/// Number of rows shown by the leaderboard
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;
/// Maximum pool size for file-backed databases
pub const DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Core settings shared by every transport
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoreSettings {
    /// SQLite connection URL (`sqlite://path` or `sqlite::memory:`)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Points awarded per unique poll answer
    #[serde(default = "default_points_per_poll")]
    pub points_per_poll: i64,

    /// Maximum number of leaderboard entries
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: u32,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

const fn default_points_per_poll() -> i64 {
    DEFAULT_POINTS_PER_POLL
}

const fn default_leaderboard_limit() -> u32 {
    DEFAULT_LEADERBOARD_LIMIT
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            points_per_poll: DEFAULT_POINTS_PER_POLL,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
        }
    }
}

impl CoreSettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use poll_points_core::config::CoreSettings;
    ///
    /// let settings = CoreSettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a value is out of range.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the scoring rules cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` for a negative award or an empty leaderboard.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.points_per_poll < 0 {
            return Err(ConfigError::Message(format!(
                "points_per_poll must be non-negative, got {}",
                self.points_per_poll
            )));
        }
        if self.leaderboard_limit == 0 {
            return Err(ConfigError::Message(
                "leaderboard_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the layered configuration source used by all settings structs.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` variables, then plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
        // UPPER_SNAKE_CASE env vars map onto snake_case keys
        .add_source(Environment::default().ignore_empty(true).try_parsing(true))
        .build()
}
