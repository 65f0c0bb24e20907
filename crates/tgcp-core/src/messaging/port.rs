use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Dialog, DownloadedMedia, MessageId, MessageRef, RelayMessage},
    Result,
};

/// Fetching side of a chat backend.
///
/// The forwarder only relies on this capability set, so a bot account, a
/// user account or a test double can sit behind it.
#[async_trait]
pub trait ChatReader: Send + Sync {
    /// Establish (or verify) the backend session.
    async fn connect(&self) -> Result<()>;

    async fn list_dialogs(&self) -> Result<Vec<Dialog>>;

    /// Up to `limit` most recent messages, newest first.
    async fn latest_messages(&self, chat_id: ChatId, limit: usize) -> Result<Vec<RelayMessage>>;

    /// Up to `limit` messages with id strictly greater than `after`, oldest first.
    async fn messages_after(
        &self,
        chat_id: ChatId,
        after: MessageId,
        limit: usize,
    ) -> Result<Vec<RelayMessage>>;

    /// Download the message's media into `dir`.
    async fn download_media(&self, message: &RelayMessage, dir: &Path) -> Result<DownloadedMedia>;
}

/// Sending side of a chat backend.
///
/// Text and captions use the markdown subset understood by
/// [`crate::formatting::markdown_to_html`].
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_file(
        &self,
        chat_id: ChatId,
        media: &DownloadedMedia,
        caption: &str,
    ) -> Result<MessageRef>;
}
