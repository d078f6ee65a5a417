//! Answer crediting rules.
//!
//! The first answer of a user to an active poll earns the configured award
//! amount. Answers to polls this instance did not create, and repeated
//! answers to the same poll, change nothing.
//!
//! Marking the pair and awarding the points happen inside one database
//! transaction. The `UNIQUE(poll_id, user_id)` constraint is the final arbiter,
//! so two concurrent deliveries of the same answer credit it once.

use crate::registry::PollRegistry;
use crate::storage::{CreditOutcome, PointsStore, StorageError};
use std::sync::Arc;
use tracing::{debug, info};

/// Name stored when the platform gives neither a username nor a display name
pub const UNKNOWN_USER_NAME: &str = "Unknown";

/// A user selecting an option in a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEvent {
    /// Poll the answer belongs to
    pub poll_id: String,
    /// Answering user
    pub user_id: i64,
    /// Platform handle, if the user has one
    pub username: Option<String>,
    /// Human readable name (first name on Telegram)
    pub display_name: Option<String>,
}

impl AnswerEvent {
    /// Name recorded with the points: username, then display name.
    #[must_use]
    pub fn credited_name(&self) -> String {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| self.display_name.as_deref().filter(|name| !name.is_empty()))
            .unwrap_or(UNKNOWN_USER_NAME)
            .to_string()
    }
}

/// What happened to an answer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The poll was not created by this instance
    UnknownPoll,
    /// The user was already credited for this poll
    AlreadyCredited,
    /// Points were awarded
    Awarded {
        /// Points added to the user's total
        amount: i64,
    },
}

/// Applies the crediting rules on top of a store and a poll registry
pub struct ScoringEngine {
    store: Arc<dyn PointsStore>,
    registry: Arc<dyn PollRegistry>,
    award_amount: i64,
}

impl ScoringEngine {
    /// Creates a new engine awarding `award_amount` points per credited answer
    #[must_use]
    pub fn new(
        store: Arc<dyn PointsStore>,
        registry: Arc<dyn PollRegistry>,
        award_amount: i64,
    ) -> Self {
        Self {
            store,
            registry,
            award_amount,
        }
    }

    /// Points granted per credited answer
    #[must_use]
    pub const fn award_amount(&self) -> i64 {
        self.award_amount
    }

    /// Process one answer event.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the store cannot be read or written. The
    /// event then leaves no trace in the store.
    pub async fn handle_answer(&self, event: &AnswerEvent) -> Result<AnswerOutcome, StorageError> {
        let AnswerEvent {
            poll_id, user_id, ..
        } = event;

        if !self.registry.is_active(poll_id).await {
            debug!("Ignoring answer for unknown poll {poll_id}");
            return Ok(AnswerOutcome::UnknownPoll);
        }

        if self.store.has_credited(poll_id, *user_id).await? {
            debug!("User {user_id} already answered poll {poll_id}");
            return Ok(AnswerOutcome::AlreadyCredited);
        }

        let name = event.credited_name();
        match self
            .store
            .credit_answer(poll_id, *user_id, &name, self.award_amount)
            .await?
        {
            CreditOutcome::Credited => {
                info!(
                    "Awarded {} point(s) to {user_id} ({name}) for poll {poll_id}",
                    self.award_amount
                );
                Ok(AnswerOutcome::Awarded {
                    amount: self.award_amount,
                })
            }
            CreditOutcome::Duplicate => {
                debug!("Concurrent duplicate answer from {user_id} to poll {poll_id}");
                Ok(AnswerOutcome::AlreadyCredited)
            }
        }
    }
}
