use crate::bot;
use crate::bot::handlers::Command;
use crate::config::BotSettings;
use poll_points_core::commands::CommandService;
use poll_points_core::registry::{InMemoryPollRegistry, PollRegistry};
use poll_points_core::scoring::ScoringEngine;
use poll_points_core::storage::{PointsStore, SqliteStorage, StorageError};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::PollAnswer;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let storage = init_storage(&settings).await;

    // Polls from before a restart are not re-registered, so their answers
    // stop earning points.
    let registry: Arc<dyn PollRegistry> = Arc::new(InMemoryPollRegistry::new());
    warn!("Poll registry is in-memory; polls created before this start will not award points.");

    let scoring = Arc::new(ScoringEngine::new(
        storage.clone(),
        registry.clone(),
        settings.core.points_per_poll,
    ));
    let commands = Arc::new(CommandService::new(
        storage,
        registry,
        settings.core.leaderboard_limit,
    ));
    info!(
        "Scoring engine initialized ({} point(s) per poll, leaderboard of {}).",
        scoring.award_amount(),
        settings.core.leaderboard_limit
    );

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to publish the command list: {e}");
    }
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![scoring, commands, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_storage(settings: &BotSettings) -> Arc<dyn PointsStore> {
    match open_storage(&settings.core.database_url).await {
        Ok(storage) => {
            info!("SQLite storage initialized.");
            storage
        }
        Err(e) => {
            error!("Failed to initialize SQLite storage: {}", e);
            std::process::exit(1);
        }
    }
}

/// Connect to the database and verify it answers queries.
async fn open_storage(database_url: &str) -> Result<Arc<dyn PointsStore>, StorageError> {
    let storage = SqliteStorage::connect(database_url).await?;
    storage.check_connection().await?;
    Ok(Arc::new(storage))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_poll_answer().endpoint(handle_poll_answer))
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    commands: Arc<CommandService>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, settings).await,
        Command::CreatePoll(args) => bot::handlers::create_poll(bot, msg, args, commands).await,
        Command::Score => bot::handlers::score(bot, msg, commands).await,
        Command::Leaderboard => bot::handlers::leaderboard(bot, msg, commands).await,
        Command::Whitelist(args) => bot::handlers::whitelist(bot, msg, args, commands).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_poll_answer(
    answer: PollAnswer,
    scoring: Arc<ScoringEngine>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_poll_answer(answer, scoring).await {
        error!("Poll answer handler error: {}", e);
    }
    respond(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_storage_checks_the_connection() {
        let storage = open_storage("sqlite::memory:").await.unwrap();
        assert_eq!(storage.get_points(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_storage_fails_for_unreachable_database() {
        let url = "sqlite:///nonexistent-dir/poll-points/bot_data.db";
        assert!(open_storage(url).await.is_err());
    }
}
