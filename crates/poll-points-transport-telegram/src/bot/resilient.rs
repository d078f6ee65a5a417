//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Replies are retried on transient network failures using exponential backoff
//! with jitter. Poll creation is deliberately not routed through here, since a
//! retried `sendPoll` could publish the same poll twice.

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};
use anyhow::Result;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, ParseMode};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Retry a Telegram API operation with exponential backoff.
///
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3 (see constants in `config.rs`)
///
/// # Errors
///
/// Returns the last error if all attempts fail.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

/// Send a message with automatic retry on network failures.
///
/// # Arguments
///
/// * `bot` - The Telegram bot instance
/// * `chat_id` - Target chat ID
/// * `text` - Message text to send
/// * `parse_mode` - Optional parse mode (HTML, Markdown, etc.)
/// * `keyboard` - Optional inline keyboard attached to the message
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
///
/// # Examples
///
/// ```ignore
/// let msg = send_message_resilient(&bot, chat_id, "No scores yet.", None, None).await?;
/// ```
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = text.into();
    retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(markup) = keyboard.clone() {
            req = req.reply_markup(markup);
        }
        req.await.map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Send with an optional keyboard, dropping the keyboard if Telegram rejects it.
///
/// The keyboard attempt is made once: rejections such as
/// `BUTTON_USER_PRIVACY_RESTRICTED` are permanent, so retrying them only
/// delays the reply. The plain send goes through [`retry_telegram_operation`].
///
/// # Errors
///
/// Returns an error if the send without keyboard also fails after all retries.
pub async fn send_with_keyboard_fallback<K, F, Fut, T>(
    keyboard: Option<K>,
    mut send: F,
) -> Result<T>
where
    F: FnMut(Option<K>) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    if let Some(markup) = keyboard {
        match send(Some(markup)).await {
            Ok(sent) => return Ok(sent),
            Err(e) => warn!("Message with inline keyboard rejected, resending without it: {e}"),
        }
    }
    retry_telegram_operation(|| send(None)).await
}

/// Send a message whose inline keyboard is optional to the reader.
///
/// # Errors
///
/// Returns an error if the message cannot be delivered even without keyboard.
pub async fn send_message_with_optional_keyboard(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = text.into();
    send_with_keyboard_fallback(keyboard, |markup| {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(markup) = markup {
            req = req.reply_markup(markup);
        }
        async move { req.await.map_err(|e| anyhow::anyhow!("Telegram send error: {e}")) }
    })
    .await
}
