/// General command and poll answer handlers
pub mod handlers;
/// Reply formatting (leaderboard, whitelist, mentions)
pub mod messaging;
/// Telegram implementation of the core poll publisher
pub mod publisher;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
