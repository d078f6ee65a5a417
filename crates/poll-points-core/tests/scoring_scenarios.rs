//! End-to-end crediting scenarios against an in-memory SQLite store.

use poll_points_core::commands::{CommandService, PollPublisher, PollRequest};
use poll_points_core::registry::{InMemoryPollRegistry, PollRegistry};
use poll_points_core::scoring::{AnswerEvent, AnswerOutcome, ScoringEngine};
use poll_points_core::storage::{PointsStore, SqliteStorage, WhitelistEntry};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Hands out sequential poll ids instead of talking to a chat platform.
#[derive(Default)]
struct SequentialPublisher {
    next: AtomicU32,
}

#[async_trait::async_trait]
impl PollPublisher for SequentialPublisher {
    async fn publish_poll(&self, _question: &str, _options: &[String]) -> anyhow::Result<String> {
        Ok(format!("poll-{}", self.next.fetch_add(1, Ordering::SeqCst)))
    }
}

struct Harness {
    store: Arc<SqliteStorage>,
    registry: Arc<InMemoryPollRegistry>,
    engine: ScoringEngine,
    commands: CommandService,
    publisher: SequentialPublisher,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(SqliteStorage::connect("sqlite::memory:").await.unwrap());
        let registry = Arc::new(InMemoryPollRegistry::new());
        Self {
            engine: ScoringEngine::new(store.clone(), registry.clone(), 1),
            commands: CommandService::new(store.clone(), registry.clone(), 10),
            store,
            registry,
            publisher: SequentialPublisher::default(),
        }
    }

    async fn create_poll(&self) -> String {
        let request = PollRequest::new("Pick one?", ["A", "B"]).unwrap();
        self.commands
            .create_poll(&self.publisher, &request)
            .await
            .unwrap()
    }

    async fn answer(&self, poll_id: &str, user_id: i64) -> AnswerOutcome {
        let event = AnswerEvent {
            poll_id: poll_id.to_string(),
            user_id,
            username: None,
            display_name: Some(format!("User {user_id}")),
        };
        self.engine.handle_answer(&event).await.unwrap()
    }

    async fn snapshot(&self) -> Vec<WhitelistEntry> {
        self.store.above_threshold(i64::MIN).await.unwrap()
    }
}

#[tokio::test]
async fn duplicate_and_foreign_answers_are_not_credited() {
    let h = Harness::new().await;
    let poll = h.create_poll().await;
    assert!(h.registry.is_active(&poll).await);

    assert_eq!(
        h.answer(&poll, 1).await,
        AnswerOutcome::Awarded { amount: 1 }
    );
    assert_eq!(h.store.get_points(1).await.unwrap(), 1);

    assert_eq!(h.answer(&poll, 1).await, AnswerOutcome::AlreadyCredited);
    assert_eq!(h.store.get_points(1).await.unwrap(), 1);

    assert_eq!(
        h.answer("unregistered", 2).await,
        AnswerOutcome::UnknownPoll
    );
    assert_eq!(h.store.get_points(2).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_poll_leaves_store_untouched() {
    let h = Harness::new().await;
    let poll = h.create_poll().await;
    h.answer(&poll, 1).await;

    let before = h.snapshot().await;
    let credited_before = h.store.has_credited("stranger", 3).await.unwrap();

    assert_eq!(h.answer("stranger", 3).await, AnswerOutcome::UnknownPoll);

    assert_eq!(h.snapshot().await, before);
    assert_eq!(
        h.store.has_credited("stranger", 3).await.unwrap(),
        credited_before
    );
    assert_eq!(h.store.get_points(1).await.unwrap(), 1);
}

#[tokio::test]
async fn whitelist_threshold_selects_and_orders() {
    let h = Harness::new().await;
    let polls = [
        h.create_poll().await,
        h.create_poll().await,
        h.create_poll().await,
    ];

    // user 1 answers three polls, user 2 one, user 3 two
    for poll in &polls {
        h.answer(poll, 1).await;
    }
    h.answer(&polls[0], 2).await;
    h.answer(&polls[0], 3).await;
    h.answer(&polls[1], 3).await;

    let rows = h.commands.get_whitelist("2").await.unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.user_id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(rows[0].display_name, "User 1");

    assert_eq!(h.commands.get_whitelist("0").await.unwrap().len(), 3);
    assert!(h.commands.get_whitelist("4").await.unwrap().is_empty());
}

#[tokio::test]
async fn leaderboard_is_capped_at_ten() {
    let h = Harness::new().await;
    let polls: Vec<String> = {
        let mut polls = Vec::new();
        for _ in 0..3 {
            polls.push(h.create_poll().await);
        }
        polls
    };

    for user_id in 1..=12 {
        let answered = usize::try_from(user_id % 3).unwrap() + 1;
        for poll in polls.iter().take(answered) {
            h.answer(poll, user_id).await;
        }
    }

    let board = h.commands.get_leaderboard().await.unwrap();
    assert_eq!(board.len(), 10);
    assert!(board
        .windows(2)
        .all(|pair| pair[0].points >= pair[1].points));
    assert_eq!(board[0].points, 3);
}

#[tokio::test]
async fn leaderboard_returns_fewer_when_few_users() {
    let h = Harness::new().await;
    let poll = h.create_poll().await;
    h.answer(&poll, 1).await;
    h.answer(&poll, 2).await;

    assert_eq!(h.commands.get_leaderboard().await.unwrap().len(), 2);
}

#[tokio::test]
async fn registry_does_not_survive_a_new_instance() {
    let h = Harness::new().await;
    let poll = h.create_poll().await;

    // A fresh registry models a process restart with the same database.
    let restarted = ScoringEngine::new(h.store.clone(), Arc::new(InMemoryPollRegistry::new()), 1);
    let event = AnswerEvent {
        poll_id: poll,
        user_id: 1,
        username: Some("alice".to_string()),
        display_name: None,
    };
    assert_eq!(
        restarted.handle_answer(&event).await.unwrap(),
        AnswerOutcome::UnknownPoll
    );
}
