use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::managers::scorecard_manager::{
    handle_attachment_message, Attachment, IncomingMessage, UploadOutcome,
};
use crate::{Data, Error};

/// Only messages with attachments can complete a pending scorecard upload.
pub async fn handle_message(message: &serenity::Message, data: &Data) -> Result<(), Error> {
    if message.attachments.is_empty() {
        return Ok(());
    }

    let incoming = IncomingMessage {
        channel_id: message.channel_id.to_string(),
        author_id: message.author.id.to_string(),
        author_is_bot: message.author.bot,
        attachments: message
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.clone(),
                url: a.url.clone(),
                size: u64::from(a.size),
            })
            .collect(),
    };

    match handle_attachment_message(data, incoming).await? {
        UploadOutcome::Ignored => {}
        outcome => debug!(message_id = %message.id, ?outcome, "Attachment handled"),
    }
    Ok(())
}
