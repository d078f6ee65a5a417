#![deny(missing_docs)]
//! Poll Points core library.
//!
//! Shared logic for poll bookkeeping, point scoring and storage.

/// Transport-agnostic command logic (validation and delegation).
pub mod commands;
/// Configuration management.
pub mod config;
/// Registry of polls created by this process.
pub mod registry;
/// Answer crediting rules.
pub mod scoring;
/// Storage layer (SQLite).
pub mod storage;

pub use commands::{CommandError, CommandService, PollPublisher, PollRequest};
pub use registry::{InMemoryPollRegistry, PollRegistry};
pub use scoring::{AnswerEvent, AnswerOutcome, ScoringEngine};
pub use storage::{PointsStore, SqliteStorage, StorageError};
