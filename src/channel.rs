//! The messaging seam between the report engine and Discord.
//!
//! Every primitive may fail independently. Callers downgrade
//! [`ChannelError::NotFound`] and [`ChannelError::Forbidden`] to "treat as
//! absent" at the narrowest scope.

use crate::render::ReportCard;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("message or channel not found")]
    NotFound,
    #[error("missing permission for message operation")]
    Forbidden,
    #[error("Discord API error: {0}")]
    Api(String),
}

impl ChannelError {
    /// The bound message is gone, or we can no longer see it.
    pub fn is_absent(&self) -> bool {
        matches!(self, ChannelError::NotFound | ChannelError::Forbidden)
    }
}

impl From<::serenity::Error> for ChannelError {
    fn from(err: ::serenity::Error) -> Self {
        if let ::serenity::Error::Http(http) = &err {
            match http.status_code().map(|status| status.as_u16()) {
                Some(404) => return ChannelError::NotFound,
                Some(403) => return ChannelError::Forbidden,
                _ => {}
            }
        }
        ChannelError::Api(err.to_string())
    }
}

/// A live message, as last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle {
    pub id: u64,
}

#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn id(&self) -> u64;
    async fn send(&self, card: &ReportCard) -> Result<MessageHandle, ChannelError>;
    async fn fetch(&self, message_id: u64) -> Result<MessageHandle, ChannelError>;
    async fn edit(&self, handle: &MessageHandle, card: &ReportCard) -> Result<(), ChannelError>;
    async fn delete(&self, handle: &MessageHandle) -> Result<(), ChannelError>;
}

/// Resolves stored channel ids into usable channels.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// `None` when the channel is gone or is not a text channel.
    async fn resolve(&self, channel_id: u64) -> Option<Arc<dyn MessageChannel>>;
}

/// Fetch a message and delete it, treating an already-missing message as done.
///
/// Returns `Ok(true)` when a live message was deleted.
pub async fn fetch_and_delete(
    channel: &dyn MessageChannel,
    message_id: u64,
) -> Result<bool, ChannelError> {
    let handle = match channel.fetch(message_id).await {
        Ok(handle) => handle,
        Err(e) if e.is_absent() => return Ok(false),
        Err(e) => return Err(e),
    };
    match channel.delete(&handle).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_absent() => Ok(false),
        Err(e) => Err(e),
    }
}

/// A guild text channel reached over the REST API.
#[derive(Clone)]
pub struct SerenityChannel {
    http: Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
}

impl SerenityChannel {
    pub fn new(http: Arc<serenity::Http>, channel_id: serenity::ChannelId) -> Self {
        Self { http, channel_id }
    }
}

fn card_embed(card: &ReportCard) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(&card.title)
        .description(&card.description)
        .colour(card.colour)
        .footer(serenity::CreateEmbedFooter::new(&card.footer));
    if let Some(url) = &card.url {
        embed = embed.url(url);
    }
    if let Some(thumbnail) = &card.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

fn card_components(card: &ReportCard) -> Vec<serenity::CreateActionRow> {
    let options = card
        .selector
        .options
        .iter()
        .map(|option| serenity::CreateSelectMenuOption::new(option.label, option.value))
        .collect();
    let menu = serenity::CreateSelectMenu::new(
        card.selector.custom_id.clone(),
        serenity::CreateSelectMenuKind::String { options },
    )
    .placeholder(card.selector.placeholder.clone());
    vec![serenity::CreateActionRow::SelectMenu(menu)]
}

#[async_trait]
impl MessageChannel for SerenityChannel {
    fn id(&self) -> u64 {
        self.channel_id.get()
    }

    async fn send(&self, card: &ReportCard) -> Result<MessageHandle, ChannelError> {
        let builder = serenity::CreateMessage::new()
            .embed(card_embed(card))
            .components(card_components(card));
        let message = self.channel_id.send_message(&self.http, builder).await?;
        debug!(
            "Sent report message {} for {} in channel {}",
            message.id, card.resource_id, self.channel_id
        );
        Ok(MessageHandle {
            id: message.id.get(),
        })
    }

    async fn fetch(&self, message_id: u64) -> Result<MessageHandle, ChannelError> {
        let message = self
            .channel_id
            .message(&self.http, serenity::MessageId::new(message_id))
            .await?;
        Ok(MessageHandle {
            id: message.id.get(),
        })
    }

    async fn edit(&self, handle: &MessageHandle, card: &ReportCard) -> Result<(), ChannelError> {
        let builder = serenity::EditMessage::new()
            .embed(card_embed(card))
            .components(card_components(card));
        self.channel_id
            .edit_message(&self.http, serenity::MessageId::new(handle.id), builder)
            .await?;
        Ok(())
    }

    async fn delete(&self, handle: &MessageHandle) -> Result<(), ChannelError> {
        self.channel_id
            .delete_message(&self.http, serenity::MessageId::new(handle.id))
            .await?;
        Ok(())
    }
}

/// Resolves channel ids through the REST API.
#[derive(Clone)]
pub struct HttpDirectory {
    http: Arc<serenity::Http>,
}

impl HttpDirectory {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelDirectory for HttpDirectory {
    async fn resolve(&self, channel_id: u64) -> Option<Arc<dyn MessageChannel>> {
        if channel_id == 0 {
            return None;
        }
        let id = serenity::ChannelId::new(channel_id);
        match id.to_channel(&self.http).await {
            Ok(serenity::Channel::Guild(channel))
                if matches!(
                    channel.kind,
                    serenity::ChannelType::Text | serenity::ChannelType::News
                ) =>
            {
                Some(Arc::new(SerenityChannel::new(self.http.clone(), id)))
            }
            Ok(_) => {
                debug!("Channel {} is not a guild text channel", channel_id);
                None
            }
            Err(e) => {
                debug!("Channel {} could not be resolved: {}", channel_id, e);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeChannel, Op};
    use super::*;

    #[test]
    fn test_absent_errors() {
        assert!(ChannelError::NotFound.is_absent());
        assert!(ChannelError::Forbidden.is_absent());
        assert!(!ChannelError::Api("boom".to_string()).is_absent());
    }

    #[tokio::test]
    async fn test_fetch_and_delete_tolerates_missing() {
        let channel = FakeChannel::new(1);
        assert_eq!(fetch_and_delete(&channel, 42).await, Ok(false));

        channel.fail_fetch(43, ChannelError::Forbidden);
        assert_eq!(fetch_and_delete(&channel, 43).await, Ok(false));

        channel.fail_fetch(44, ChannelError::Api("500".to_string()));
        assert!(fetch_and_delete(&channel, 44).await.is_err());
        assert_eq!(channel.ops(), vec![Op::Fetch(42), Op::Fetch(43), Op::Fetch(44)]);
    }
}
