//! Telegram implementation of the core `PollPublisher`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use poll_points_core::commands::PollPublisher;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputPollOption, MessageId, ReplyParameters};

/// Sends polls into one chat, as a reply to the triggering message
pub struct TelegramPollPublisher {
    bot: Bot,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
}

impl TelegramPollPublisher {
    /// Publisher bound to a chat, optionally replying to a message
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId, reply_to: Option<MessageId>) -> Self {
        Self {
            bot,
            chat_id,
            reply_to,
        }
    }
}

#[async_trait]
impl PollPublisher for TelegramPollPublisher {
    async fn publish_poll(&self, question: &str, options: &[String]) -> Result<String> {
        let options = options.iter().map(|opt| InputPollOption::new(opt.clone()));

        // Non-anonymous so that answers carry the voter's identity
        let mut req = self
            .bot
            .send_poll(self.chat_id, question, options)
            .is_anonymous(false)
            .allows_multiple_answers(false);
        if let Some(message_id) = self.reply_to {
            req = req.reply_parameters(ReplyParameters::new(message_id));
        }

        let msg = req.await.map_err(|e| anyhow!("Telegram sendPoll error: {e}"))?;

        msg.poll()
            .map(|poll| poll.id.to_string())
            .ok_or_else(|| anyhow!("sendPoll response carried no poll"))
    }
}
