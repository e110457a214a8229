use serenity::all::{
    ActivityData, ChannelId, CreateMessage, EditMessage, GuildId, Message, Ready,
};
use serenity::{async_trait, prelude::*};
use tracing::{error, info, warn};

use crate::state::BotState;

use commands::{CommandError, Invocation, Reply};

mod commands;

async fn send_reply(ctx: &Context, channel_id: ChannelId, reply: Reply) -> serenity::Result<()> {
    match reply {
        Reply::Text(text) => {
            channel_id.say(&ctx.http, text).await?;
        }
        Reply::Embed(view) => {
            channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(view.build()))
                .await?;
        }
        Reply::Progress { message, outcome } => {
            let mut sent = channel_id.say(&ctx.http, message).await?;
            let text = outcome.await;
            sent.edit(ctx, EditMessage::new().content(text)).await?;
        }
    }
    Ok(())
}

fn report(invocation: &Invocation, content: &str, e: &CommandError) -> String {
    if !e.is_user_error() {
        error!(
            "Command {:?} in channel {} failed: {}",
            content, invocation.channel_id, e
        );
    }
    e.user_message()
}

#[async_trait]
impl EventHandler for BotState {
    async fn ready(&self, _: Context, ready: Ready) {
        info!("Connected to Discord as {}", ready.user.name);
    }

    async fn cache_ready(&self, ctx: Context, _guilds: Vec<GuildId>) {
        if !self.set_if_startup().await {
            return;
        }
        self.set_discord(ctx.clone()).await;

        ctx.set_activity(Some(ActivityData::custom("Watching your schedule")));

        self.start().await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let invocation = Invocation {
            guild_id: msg.guild_id.map(|guild_id| guild_id.get()),
            channel_id: msg.channel_id.get(),
        };
        let Some(result) = commands::dispatch(self, &invocation, &msg.content).await else {
            return;
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => Reply::Text(report(&invocation, &msg.content, &e)),
        };
        if let Err(e) = send_reply(&ctx, msg.channel_id, reply).await {
            warn!("Failed to reply in channel {}: {}", msg.channel_id, e);
        }
    }
}
