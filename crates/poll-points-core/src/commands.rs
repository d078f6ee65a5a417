//! Transport-agnostic command logic.
//!
//! Validates user input and delegates to the store, the registry and the
//! transport's poll publisher. Formatting the replies is left to the transport.

use crate::registry::PollRegistry;
use crate::storage::{LeaderboardEntry, PointsStore, StorageError, WhitelistEntry};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Usage hint for `/createpoll`
pub const CREATE_POLL_USAGE: &str = "Usage: /createpoll Question? Option1;Option2;Option3";
/// Usage hint for `/whitelist`
pub const WHITELIST_USAGE: &str = "Usage: /whitelist <min_points>";
/// Minimum number of poll options
pub const MIN_POLL_OPTIONS: usize = 2;
/// Maximum number of poll options accepted by Telegram
pub const MAX_POLL_OPTIONS: usize = 10;

/// Errors returned by command operations
#[derive(Error, Debug)]
pub enum CommandError {
    /// Malformed input; the message is meant for the user
    #[error("{0}")]
    Usage(String),
    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// The transport could not create the poll
    #[error("Failed to publish poll: {0}")]
    Publish(String),
}

/// Creates polls on the chat platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PollPublisher: Send + Sync {
    /// Publish a poll and return the platform's poll identifier
    async fn publish_poll(&self, question: &str, options: &[String]) -> anyhow::Result<String>;
}

/// A validated poll creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    question: String,
    options: Vec<String>,
}

impl PollRequest {
    /// Validate and normalize a question and its options.
    ///
    /// Whitespace is trimmed and empty options are dropped.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Usage` for an empty question, fewer than two
    /// non-empty options, or more options than Telegram allows.
    pub fn new<I, S>(question: &str, options: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let question = question.trim();
        if question.is_empty() || question == "?" {
            return Err(CommandError::Usage(CREATE_POLL_USAGE.to_string()));
        }

        let options: Vec<String> = options
            .into_iter()
            .map(|opt| opt.as_ref().trim().to_string())
            .filter(|opt| !opt.is_empty())
            .collect();

        if options.len() < MIN_POLL_OPTIONS {
            return Err(CommandError::Usage(
                "Provide at least 2 options.".to_string(),
            ));
        }
        if options.len() > MAX_POLL_OPTIONS {
            return Err(CommandError::Usage(format!(
                "Provide at most {MAX_POLL_OPTIONS} options."
            )));
        }

        Ok(Self {
            question: question.to_string(),
            options,
        })
    }

    /// Poll question
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Poll options, trimmed and non-empty
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

/// Parse `/createpoll` arguments of the form `Question? Option1;Option2;...`.
///
/// The question keeps its trailing question mark.
///
/// # Errors
///
/// Returns `CommandError::Usage` when the text has no `?` or no `;`, or when
/// the parts fail [`PollRequest::new`] validation.
///
/// # Examples
///
/// ```
/// use poll_points_core::commands::parse_poll_request;
///
/// let request = parse_poll_request("Best color? Red; Blue ;Green").unwrap();
/// assert_eq!(request.question(), "Best color?");
/// assert_eq!(request.options(), ["Red", "Blue", "Green"]);
/// ```
pub fn parse_poll_request(text: &str) -> Result<PollRequest, CommandError> {
    let Some((question, options)) = text.split_once('?') else {
        return Err(CommandError::Usage(CREATE_POLL_USAGE.to_string()));
    };
    if !options.contains(';') {
        return Err(CommandError::Usage(CREATE_POLL_USAGE.to_string()));
    }
    PollRequest::new(&format!("{}?", question.trim()), options.split(';'))
}

/// Parse the `/whitelist` threshold from the command arguments.
///
/// Only the first whitespace-separated token is considered.
///
/// # Errors
///
/// Returns `CommandError::Usage` when the token is missing or not an integer.
pub fn parse_threshold(args: &str) -> Result<i64, CommandError> {
    args.split_whitespace()
        .next()
        .and_then(|token| token.parse::<i64>().ok())
        .ok_or_else(|| CommandError::Usage(WHITELIST_USAGE.to_string()))
}

/// Command operations shared by every transport
pub struct CommandService {
    store: Arc<dyn PointsStore>,
    registry: Arc<dyn PollRegistry>,
    leaderboard_limit: u32,
}

impl CommandService {
    /// Creates a new command service
    #[must_use]
    pub fn new(
        store: Arc<dyn PointsStore>,
        registry: Arc<dyn PollRegistry>,
        leaderboard_limit: u32,
    ) -> Self {
        Self {
            store,
            registry,
            leaderboard_limit,
        }
    }

    /// Publish a poll and register it so its answers earn points.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Publish` if the transport fails; nothing is
    /// registered in that case.
    pub async fn create_poll<P>(
        &self,
        publisher: &P,
        request: &PollRequest,
    ) -> Result<String, CommandError>
    where
        P: PollPublisher + ?Sized,
    {
        let poll_id = publisher
            .publish_poll(request.question(), request.options())
            .await
            .map_err(|e| CommandError::Publish(e.to_string()))?;

        self.registry.register(poll_id.clone()).await;
        info!("Created poll {poll_id}");
        Ok(poll_id)
    }

    /// Current points of a user.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Storage` if the store cannot be read.
    pub async fn get_score(&self, user_id: i64) -> Result<i64, CommandError> {
        Ok(self.store.get_points(user_id).await?)
    }

    /// Top users by points, limited to the configured leaderboard size.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Storage` if the store cannot be read.
    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, CommandError> {
        Ok(self.store.top_n(self.leaderboard_limit).await?)
    }

    /// Users with at least the threshold given in `args`.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Usage` for a missing or non-integer threshold,
    /// before any store access, or `CommandError::Storage` on read failure.
    pub async fn get_whitelist(&self, args: &str) -> Result<Vec<WhitelistEntry>, CommandError> {
        let threshold = parse_threshold(args)?;
        info!("[/whitelist] called with threshold={threshold}");

        let rows = self.store.above_threshold(threshold).await?;
        info!(
            "[/whitelist] found {} users with >={threshold} points",
            rows.len()
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{InMemoryPollRegistry, MockPollRegistry};
    use crate::storage::MockPointsStore;

    #[test]
    fn test_parse_poll_request_valid() {
        let request = parse_poll_request(" Lunch?  Pizza;Sushi; ;Tacos ").unwrap();
        assert_eq!(request.question(), "Lunch?");
        assert_eq!(request.options(), ["Pizza", "Sushi", "Tacos"]);
    }

    #[test]
    fn test_parse_poll_request_splits_at_first_question_mark() {
        let request = parse_poll_request("Why? Because?;No").unwrap();
        assert_eq!(request.question(), "Why?");
        assert_eq!(request.options(), ["Because?", "No"]);
    }

    #[test]
    fn test_parse_poll_request_usage_errors() {
        for text in ["", "No question mark; a;b", "Question? only one option", "? a;b"] {
            match parse_poll_request(text) {
                Err(CommandError::Usage(msg)) => assert_eq!(msg, CREATE_POLL_USAGE, "{text}"),
                other => panic!("expected usage error for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_poll_request_too_few_options() {
        match parse_poll_request("Q? a; ;") {
            Err(CommandError::Usage(msg)) => assert_eq!(msg, "Provide at least 2 options."),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_poll_request_too_many_options() {
        let options: Vec<String> = (0..=MAX_POLL_OPTIONS).map(|i| i.to_string()).collect();
        assert!(matches!(
            PollRequest::new("Q?", options),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("5").unwrap(), 5);
        assert_eq!(parse_threshold("  0 extra").unwrap(), 0);
        assert_eq!(parse_threshold("-3").unwrap(), -3);
        assert!(matches!(parse_threshold(""), Err(CommandError::Usage(_))));
        assert!(matches!(
            parse_threshold("ten"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            parse_threshold("2.5"),
            Err(CommandError::Usage(_))
        ));
    }

    #[tokio::test]
    async fn test_create_poll_registers_published_id() {
        let registry = Arc::new(InMemoryPollRegistry::new());
        let service = CommandService::new(Arc::new(MockPointsStore::new()), registry.clone(), 10);

        let mut publisher = MockPollPublisher::new();
        publisher
            .expect_publish_poll()
            .times(1)
            .withf(|question, options| question == "Q?" && options.len() == 2)
            .returning(|_, _| Ok("poll-77".to_string()));

        let request = PollRequest::new("Q?", ["A", "B"]).unwrap();
        let poll_id = service.create_poll(&publisher, &request).await.unwrap();

        assert_eq!(poll_id, "poll-77");
        assert!(registry.is_active("poll-77").await);
    }

    #[tokio::test]
    async fn test_create_poll_failure_registers_nothing() {
        let mut registry = MockPollRegistry::new();
        registry.expect_register().never();
        let service = CommandService::new(Arc::new(MockPointsStore::new()), Arc::new(registry), 10);

        let mut publisher = MockPollPublisher::new();
        publisher
            .expect_publish_poll()
            .returning(|_, _| Err(anyhow::anyhow!("network down")));

        let request = PollRequest::new("Q?", ["A", "B"]).unwrap();
        let err = service.create_poll(&publisher, &request).await.unwrap_err();
        assert!(matches!(err, CommandError::Publish(_)));
    }

    #[tokio::test]
    async fn test_leaderboard_uses_configured_limit() {
        let mut store = MockPointsStore::new();
        store
            .expect_top_n()
            .withf(|limit| *limit == 3)
            .times(1)
            .returning(|_| Ok(Vec::new()));
        let service =
            CommandService::new(Arc::new(store), Arc::new(InMemoryPollRegistry::new()), 3);

        assert!(service.get_leaderboard().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_whitelist_usage_error_skips_store() {
        let mut store = MockPointsStore::new();
        store.expect_above_threshold().never();
        let service =
            CommandService::new(Arc::new(store), Arc::new(InMemoryPollRegistry::new()), 10);

        match service.get_whitelist("lots").await {
            Err(CommandError::Usage(msg)) => assert_eq!(msg, WHITELIST_USAGE),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_score_delegates_to_store() {
        let mut store = MockPointsStore::new();
        store
            .expect_get_points()
            .withf(|user_id| *user_id == 5)
            .returning(|_| Ok(4));
        let service =
            CommandService::new(Arc::new(store), Arc::new(InMemoryPollRegistry::new()), 10);

        assert_eq!(service.get_score(5).await.unwrap(), 4);
    }
}
