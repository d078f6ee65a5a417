use crate::bot::messaging::{
    format_leaderboard, format_score, format_welcome, format_whitelist, whitelist_keyboard,
};
use crate::bot::publisher::TelegramPollPublisher;
use crate::bot::resilient::{send_message_resilient, send_message_with_optional_keyboard};
use crate::config::BotSettings;
use anyhow::Result;
use poll_points_core::commands::{parse_poll_request, CommandError, CommandService};
use poll_points_core::scoring::{AnswerEvent, ScoringEngine};
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{MaybeAnonymousUser, ParseMode, PollAnswer},
    utils::command::BotCommands,
};
use tracing::{debug, error, info};

const STORAGE_FAILURE_TEXT: &str =
    "Something went wrong while reading the scores. Please try again later.";

// Helper function to get user name from Message
fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Create a poll: `/createpoll Question? Option1;Option2`
    #[command(description = "Create a poll: /createpoll Question? Option1;Option2;Option3")]
    CreatePoll(String),
    /// Show the sender's points
    #[command(description = "Show your points.")]
    Score,
    /// Show the top participants
    #[command(description = "Show the top participants.")]
    Leaderboard,
    /// List users with at least the given points
    #[command(description = "List users with at least <min_points> points.")]
    Whitelist(String),
}

/// Convert a Telegram poll answer into a core answer event.
///
/// Answers cast on behalf of a chat carry no user and yield `None`.
#[must_use]
pub fn answer_event(answer: &PollAnswer) -> Option<AnswerEvent> {
    voter_event(answer.poll_id.to_string(), &answer.voter)
}

fn voter_event(poll_id: String, voter: &MaybeAnonymousUser) -> Option<AnswerEvent> {
    match voter {
        MaybeAnonymousUser::User(user) => Some(AnswerEvent {
            poll_id,
            user_id: user.id.0.cast_signed(),
            username: user.username.clone(),
            display_name: Some(user.first_name.clone()).filter(|name| !name.is_empty()),
        }),
        MaybeAnonymousUser::Chat(_) => None,
    }
}

/// Reply to a failed command: usage errors go back verbatim, everything else
/// is logged and answered with a generic message.
async fn reply_command_error(bot: &Bot, msg: &Message, err: CommandError) -> Result<()> {
    let text = match err {
        CommandError::Usage(usage) => usage,
        CommandError::Publish(e) => {
            error!("Poll creation failed in chat {}: {e}", msg.chat.id);
            "Could not create the poll. Please try again later.".to_string()
        }
        CommandError::Storage(e) => {
            error!("Storage error in chat {}: {e}", msg.chat.id);
            STORAGE_FAILURE_TEXT.to_string()
        }
    };
    send_message_resilient(bot, msg.chat.id, text, None, None).await?;
    Ok(())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, settings: Arc<BotSettings>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let first_name = msg
        .from
        .as_ref()
        .map_or_else(|| "there".to_string(), |u| u.first_name.clone());

    info!("User {user_id} initiated /start command.");

    let text = format_welcome(&first_name, &settings.telegram.bot_name);
    send_message_resilient(&bot, msg.chat.id, text, None, None).await?;
    Ok(())
}

/// `/createpoll` handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn create_poll(
    bot: Bot,
    msg: Message,
    args: String,
    commands: Arc<CommandService>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} ({}) requested a poll.", get_user_name(&msg));

    let request = match parse_poll_request(&args) {
        Ok(request) => request,
        Err(e) => return reply_command_error(&bot, &msg, e).await,
    };

    let publisher = TelegramPollPublisher::new(bot.clone(), msg.chat.id, Some(msg.id));
    if let Err(e) = commands.create_poll(&publisher, &request).await {
        return reply_command_error(&bot, &msg, e).await;
    }
    Ok(())
}

/// `/score` handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn score(bot: Bot, msg: Message, commands: Arc<CommandService>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    match commands.get_score(user_id).await {
        Ok(points) => {
            send_message_resilient(&bot, msg.chat.id, format_score(points), None, None).await?;
            Ok(())
        }
        Err(e) => reply_command_error(&bot, &msg, e).await,
    }
}

/// `/leaderboard` handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn leaderboard(bot: Bot, msg: Message, commands: Arc<CommandService>) -> Result<()> {
    match commands.get_leaderboard().await {
        Ok(entries) => {
            let text = format_leaderboard(&entries);
            send_message_resilient(&bot, msg.chat.id, text, None, None).await?;
            Ok(())
        }
        Err(e) => reply_command_error(&bot, &msg, e).await,
    }
}

/// `/whitelist` handler
///
/// # Errors
///
/// Returns an error if a reply part cannot be sent.
pub async fn whitelist(
    bot: Bot,
    msg: Message,
    args: String,
    commands: Arc<CommandService>,
) -> Result<()> {
    let entries = match commands.get_whitelist(&args).await {
        Ok(entries) => entries,
        Err(e) => return reply_command_error(&bot, &msg, e).await,
    };

    let parts = format_whitelist(&entries);
    let last = parts.len().saturating_sub(1);
    let mut keyboard = whitelist_keyboard(&entries);
    for (i, part) in parts.into_iter().enumerate() {
        let markup = if i == last { keyboard.take() } else { None };
        send_message_with_optional_keyboard(&bot, msg.chat.id, part, Some(ParseMode::Html), markup)
            .await?;
    }
    Ok(())
}

/// Poll answer handler
///
/// # Errors
///
/// Returns an error if the store fails while crediting the answer.
pub async fn handle_poll_answer(answer: PollAnswer, scoring: Arc<ScoringEngine>) -> Result<()> {
    let Some(event) = answer_event(&answer) else {
        debug!("Ignoring chat vote on poll {}", answer.poll_id);
        return Ok(());
    };

    scoring.handle_answer(&event).await?;
    Ok(())
}
