#![deny(missing_docs)]
//! Discord front-end: turns incoming messages into
//! [`sdforge_persona::PersonalityChatCore`] chat turns and replies with
//! the result (§4.8, §6 external interfaces).

use std::sync::Arc;

use sdforge_persona::{ChatTurnOutcome, ChatTurnRequest, PersonalityChatCore};
use sdforge_store::context_key;
use serenity::all::{Channel, ChannelType, Client, Context, EventHandler, GatewayIntents, Message, Ready};
use serenity::async_trait;

/// Bridges Discord `MESSAGE_CREATE` events to a chat core.
struct Handler {
    core: Arc<PersonalityChatCore>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "discord front-end connected");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.content.trim().is_empty() {
            return;
        }

        let key = self.context_key_for(&ctx, &msg).await;
        let outcome = self
            .core
            .chat_turn(ChatTurnRequest {
                user_id: msg.author.id.to_string(),
                context_key: key,
                message: msg.content.clone(),
            })
            .await;

        let reply = match outcome {
            ChatTurnOutcome::Text { reply } => reply,
            ChatTurnOutcome::ImageAssist { reply, .. } => reply,
            ChatTurnOutcome::Refused { reason, retry_after_seconds: Some(seconds) } => {
                format!("{reason} (try again in {seconds}s)")
            }
            ChatTurnOutcome::Refused { reason, retry_after_seconds: None } => reason,
        };

        if let Err(err) = msg.channel_id.say(&ctx.http, reply).await {
            tracing::warn!(error = %err, channel = %msg.channel_id, "failed to send discord reply");
        }
    }
}

impl Handler {
    /// Resolve §4.5's context key from a message, distinguishing threads
    /// from their parent channel with one extra lookup.
    async fn context_key_for(&self, ctx: &Context, msg: &Message) -> String {
        let guild_id = msg.guild_id.map(|id| id.to_string());
        let is_thread = matches!(
            msg.channel_id.to_channel(&ctx.http).await,
            Ok(Channel::Guild(channel))
                if matches!(channel.kind, ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread)
        );

        let channel_id = msg.channel_id.to_string();
        let (channel_id, thread_id) =
            if is_thread { (None, Some(channel_id)) } else { (Some(channel_id), None) };

        context_key(guild_id.as_deref(), channel_id.as_deref(), thread_id.as_deref(), &msg.author.id.to_string())
    }
}

/// Connect to Discord's gateway and serve chat turns through `core`
/// until the process is interrupted or the connection fails.
///
/// # Errors
///
/// Returns the underlying `serenity::Error` if the client fails to
/// build or the gateway connection ends in error.
pub async fn run(token: &str, core: Arc<PersonalityChatCore>) -> Result<(), serenity::Error> {
    let intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(token, intents).event_handler(Handler { core }).await?;
    client.start().await
}
