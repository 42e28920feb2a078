//! The bundled `message` handler.
//!
//! Deliberately thin: it answers messages that mention the bot with a
//! canned reply, which exercises the resolve-then-send path end to end.
//! Real command handling belongs to whatever application embeds the
//! facade.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use slackline_core::{domain::UserId, event::EventHandler, Result};
use slackline_rtm::{model::MessageOptions, SlackClient};

pub struct MessageHandler {
    client: Arc<SlackClient>,
}

impl MessageHandler {
    pub fn new(client: Arc<SlackClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    async fn handle(&self, payload: Value) -> Result<()> {
        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(channel) = payload.get("channel").and_then(Value::as_str) else {
            return Ok(());
        };
        debug!(channel, "message received");

        let Some(bot_id) = self.client.bot_id().await else {
            return Ok(());
        };
        let Some(command) = directed_command(text, &bot_id) else {
            return Ok(());
        };

        let response = if command.starts_with("do") {
            "Sure...write some more code then I can do that!"
        } else {
            "Not sure what you mean. Use the *do* command with numbers, delimited by spaces."
        };
        self.client
            .send_message(channel, response, MessageOptions::default())
            .await;

        Ok(())
    }
}

/// Extract the command text from a message that mentions the bot, e.g.
/// `<@U1> do 1 2 3`. Messages without the mention are not addressed to
/// us.
fn directed_command(text: &str, bot_id: &UserId) -> Option<String> {
    let mention = format!("<@{bot_id}>");
    let (_, rest) = text.split_once(&mention)?;
    Some(rest.trim().to_lowercase())
}
