//! Reply formatting for the Telegram bot.
//!
//! Everything here is pure string building so it can be tested without a bot.

use poll_points_core::storage::{LeaderboardEntry, WhitelistEntry};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096, but we use 4000 to account for
/// HTML tags and other formatting that may be added.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Fallback buttons are only attached when the whitelist is this short.
pub const MAX_KEYBOARD_BUTTONS: usize = 50;

/// Reply to an empty leaderboard
pub const NO_SCORES_TEXT: &str = "No scores yet.";

/// Reply to a whitelist query nobody qualifies for
pub const NO_WHITELIST_TEXT: &str = "No users meet that threshold yet.";

const WHITELIST_HEADER: &str = "✅ Whitelisted Users:";

/// Welcome message for `/start`
#[must_use]
pub fn format_welcome(first_name: &str, bot_name: &str) -> String {
    format!(
        "👋 Hello, {first_name}! Welcome to {bot_name}.\n\
         Use /createpoll to start a new poll."
    )
}

/// Reply to `/score`
#[must_use]
pub fn format_score(points: i64) -> String {
    format!("You have {points} point(s).")
}

/// Plain-text leaderboard, ranked from 1
#[must_use]
pub fn format_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return NO_SCORES_TEXT.to_string();
    }
    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {}: {}", i + 1, entry.display_name, entry.points))
        .collect();
    format!("🏆 Top Participants:\n\n{}", lines.join("\n"))
}

/// HTML link that mentions a user by ID
#[must_use]
pub fn mention_html(user_id: i64, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={user_id}\">{}</a>",
        html_escape::encode_text(name)
    )
}

/// HTML whitelist split into parts that fit in one Telegram message each.
#[must_use]
pub fn format_whitelist(entries: &[WhitelistEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec![NO_WHITELIST_TEXT.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = WHITELIST_HEADER.to_string();
    for entry in entries {
        let line = mention_html(entry.user_id, &entry.display_name);
        if current.chars().count() + 1 + line.chars().count() > TELEGRAM_MESSAGE_LIMIT {
            parts.push(std::mem::take(&mut current));
            current = line;
        } else {
            current.push('\n');
            current.push_str(&line);
        }
    }
    parts.push(current);
    parts
}

/// Inline keyboard with one profile link per user, used where HTML mentions
/// do not render. `None` for empty or overly long lists.
#[must_use]
pub fn whitelist_keyboard(entries: &[WhitelistEntry]) -> Option<InlineKeyboardMarkup> {
    if entries.is_empty() || entries.len() > MAX_KEYBOARD_BUTTONS {
        return None;
    }
    let rows: Vec<Vec<InlineKeyboardButton>> = entries
        .iter()
        .filter_map(|entry| {
            let url = Url::parse(&format!("tg://user?id={}", entry.user_id)).ok()?;
            Some(vec![InlineKeyboardButton::url(entry.display_name.clone(), url)])
        })
        .collect();
    Some(InlineKeyboardMarkup::new(rows))
}
