//! Discord channel as the notification [`Sink`].

use crate::helpers::{connect_address, country_flag, format_finish_time, player_sentence};
use async_trait::async_trait;
use ddtrack_core::{ChannelId, MessageRef, Notification, ServerPresence, Sink, SinkError};
use poise::serenity_prelude::{
    self as serenity, CreateActionRow, CreateAttachment, CreateButton, CreateEmbed,
    CreateEmbedFooter, CreateMessage, EditMessage, GetMessages,
};
use std::sync::Arc;
use tracing::debug;

const ATTACHMENT_NAME: &str = "notification.png";
const DDNET_LOGO: &str = "https://ddnet.org/static/ddnet-white.png";
const CONNECT_URL: &str = "https://ddnet.org/connect-to/?addr=";

pub struct DiscordSink {
    http: Arc<serenity::Http>,
    bot_user: serenity::UserId,
}

impl DiscordSink {
    pub fn new(http: Arc<serenity::Http>, bot_user: serenity::UserId) -> Self {
        Self { http, bot_user }
    }
}

#[async_trait]
impl Sink for DiscordSink {
    async fn send(
        &self,
        channel: ChannelId,
        notification: &Notification,
    ) -> Result<MessageRef, SinkError> {
        let has_image = !notification.artifact.bytes.is_empty();
        let mut builder = CreateMessage::new()
            .embed(build_embed(&notification.presence, has_image))
            .components(vec![connect_row(&notification.presence)]);
        if has_image {
            builder = builder.add_file(attachment(notification));
        }
        let message = serenity::ChannelId::new(channel)
            .send_message(&self.http, builder)
            .await
            .map_err(sink_error)?;
        Ok(MessageRef {
            channel,
            message: message.id.get(),
        })
    }

    async fn edit(&self, message: MessageRef, notification: &Notification) -> Result<(), SinkError> {
        let has_image = !notification.artifact.bytes.is_empty();
        let mut builder = EditMessage::new()
            .embed(build_embed(&notification.presence, has_image))
            .components(vec![connect_row(&notification.presence)])
            .remove_all_attachments();
        if has_image {
            builder = builder.new_attachment(attachment(notification));
        }
        serenity::ChannelId::new(message.channel)
            .edit_message(&self.http, serenity::MessageId::new(message.message), builder)
            .await
            .map_err(sink_error)?;
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), SinkError> {
        serenity::ChannelId::new(message.channel)
            .delete_message(&self.http, serenity::MessageId::new(message.message))
            .await
            .map_err(sink_error)
    }

    async fn recent_own_messages(
        &self,
        channel: ChannelId,
        limit: u8,
    ) -> Result<Vec<MessageRef>, SinkError> {
        let messages = serenity::ChannelId::new(channel)
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(sink_error)?;
        let own: Vec<MessageRef> = messages
            .iter()
            .filter(|m| m.author.id == self.bot_user)
            .map(|m| MessageRef {
                channel,
                message: m.id.get(),
            })
            .collect();
        debug!(channel, scanned = messages.len(), own = own.len(), "scanned channel history");
        Ok(own)
    }
}

fn attachment(notification: &Notification) -> CreateAttachment {
    CreateAttachment::bytes(notification.artifact.bytes.clone(), ATTACHMENT_NAME)
}

/// Map a serenity error, treating HTTP 404 as a vanished message.
fn sink_error(err: serenity::Error) -> SinkError {
    if let serenity::Error::Http(http_err) = &err {
        if http_err.status_code().map(|s| s.as_u16()) == Some(404) {
            return SinkError::NotFound;
        }
    }
    SinkError::Failed(err.to_string())
}

/// Build the notification embed for a server.
pub fn build_embed(presence: &ServerPresence, has_image: bool) -> CreateEmbed {
    let names: Vec<&str> = presence.player_names().map(|n| n.as_str()).collect();
    let description = format!(
        "{}\n{} **{}**",
        player_sentence(&names),
        country_flag(presence.meta.location.as_deref()),
        presence.meta.map
    );
    let time = presence
        .participants
        .first()
        .and_then(|p| format_finish_time(p.score))
        .map(|t| format!("`{}`", t))
        .unwrap_or_else(|| "Unfinished".to_string());

    let embed = CreateEmbed::new()
        .title(&presence.meta.name)
        .description(description)
        .color(0x57F287)
        .timestamp(serenity::Timestamp::now())
        .thumbnail(DDNET_LOGO)
        .field(
            "Current Players",
            format!("{}/{}", presence.meta.client_count, presence.meta.max_clients),
            true,
        )
        .field("Time", time, true)
        .field(
            "Server IP",
            format!("`{}`", connect_address(&presence.addresses)),
            false,
        )
        .footer(CreateEmbedFooter::new("DDNet Tracker"));
    if has_image {
        embed.image(format!("attachment://{}", ATTACHMENT_NAME))
    } else {
        embed
    }
}

fn connect_row(presence: &ServerPresence) -> CreateActionRow {
    let url = format!("{}{}", CONNECT_URL, connect_address(&presence.addresses));
    CreateActionRow::Buttons(vec![CreateButton::new_link(url).label("Connect")])
}
