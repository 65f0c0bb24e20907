//! Telegram adapter (teloxide).
//!
//! Implements the `tgcp-core` reader and sender ports over the Bot API.
//! The Bot API has no history or dialog listing, so the reader keeps what
//! `getUpdates` delivers in a bounded per-chat buffer and serves from it.

use std::{
    collections::{BTreeMap, VecDeque},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use teloxide::{
    net::Download,
    prelude::*,
    types::{InputFile, ParseMode, UpdateKind},
    RequestError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tgcp_core::{
    domain::{ChatId, Dialog, DownloadedMedia, MediaKind, MediaRef, MessageId, MessageRef, RelayMessage},
    errors::Error,
    formatting::markdown_to_html,
    messaging::port::{ChatReader, ChatSender},
    Result,
};

/// Updates fetched per `getUpdates` call (Bot API maximum).
const UPDATES_PER_CALL: u8 = 100;

#[derive(Debug, Default)]
struct ChatBuffer {
    title: String,
    messages: VecDeque<RelayMessage>,
}

impl ChatBuffer {
    /// Keep ids unique and ascending, dropping the oldest past `capacity`.
    fn insert(&mut self, msg: RelayMessage, capacity: usize) {
        match self.messages.binary_search_by_key(&msg.id, |m| m.id) {
            Ok(i) => self.messages[i] = msg,
            Err(i) => self.messages.insert(i, msg),
        }
        while self.messages.len() > capacity.max(1) {
            self.messages.pop_front();
        }
    }
}

#[derive(Debug, Default)]
struct Ingest {
    offset: i32,
    chats: BTreeMap<i64, ChatBuffer>,
}

impl Ingest {
    fn record(&mut self, update_id: i32, msg: &Message, capacity: usize) {
        self.offset = self.offset.max(update_id + 1);
        let chat = self.chats.entry(msg.chat.id.0).or_default();
        chat.title = chat_title(msg);
        chat.insert(relay_message(msg), capacity);
    }
}

pub struct TelegramClient {
    bot: Bot,
    capacity: usize,
    ingest: Mutex<Ingest>,
}

impl TelegramClient {
    /// `capacity` bounds the buffered messages kept per chat.
    pub fn new(token: impl Into<String>, capacity: usize) -> Self {
        Self::from_bot(Bot::new(token), capacity)
    }

    pub fn from_bot(bot: Bot, capacity: usize) -> Self {
        Self {
            bot,
            capacity,
            ingest: Mutex::new(Ingest::default()),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::RetryAfter(wait) => Error::RateLimited(wait),
            other => Error::Backend(format!("telegram error: {other}")),
        }
    }

    /// Drain pending updates into the chat buffers.
    ///
    /// The lock is held across the request so concurrent callers never
    /// confirm the same offset twice.
    async fn sync(&self) -> Result<()> {
        let mut ingest = self.ingest.lock().await;
        loop {
            let updates = self
                .bot
                .get_updates()
                .offset(ingest.offset)
                .limit(UPDATES_PER_CALL)
                .timeout(0)
                .await
                .map_err(Self::map_err)?;

            let count = updates.len();
            for update in updates {
                match &update.kind {
                    UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => {
                        ingest.record(update.id, msg, self.capacity);
                    }
                    _ => ingest.offset = ingest.offset.max(update.id + 1),
                }
            }

            if count > 0 {
                debug!(count, offset = ingest.offset, "updates ingested");
            }
            if count < usize::from(UPDATES_PER_CALL) {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl ChatReader for TelegramClient {
    async fn connect(&self) -> Result<()> {
        let me = self.bot.get_me().await.map_err(Self::map_err)?;
        info!(
            bot = me.user.username.as_deref().unwrap_or("unknown"),
            "telegram session ready"
        );
        Ok(())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        self.sync().await?;
        let ingest = self.ingest.lock().await;
        Ok(ingest
            .chats
            .iter()
            .map(|(id, chat)| Dialog {
                id: ChatId(*id),
                title: chat.title.clone(),
            })
            .collect())
    }

    async fn latest_messages(&self, chat_id: ChatId, limit: usize) -> Result<Vec<RelayMessage>> {
        self.sync().await?;
        let ingest = self.ingest.lock().await;
        Ok(ingest
            .chats
            .get(&chat_id.0)
            .map(|c| c.messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn messages_after(
        &self,
        chat_id: ChatId,
        after: MessageId,
        limit: usize,
    ) -> Result<Vec<RelayMessage>> {
        self.sync().await?;
        let ingest = self.ingest.lock().await;
        Ok(ingest
            .chats
            .get(&chat_id.0)
            .map(|c| {
                c.messages
                    .iter()
                    .filter(|m| m.id > after)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn download_media(&self, message: &RelayMessage, dir: &Path) -> Result<DownloadedMedia> {
        let media = message
            .media
            .as_ref()
            .ok_or_else(|| Error::Backend(format!("message {} has no media", message.id)))?;

        let file = self
            .bot
            .get_file(media.file_id.clone())
            .await
            .map_err(Self::map_err)?;

        let path = download_path(dir, message, media, &file.path);
        let mut dst = tokio::fs::File::create(&path).await?;
        if let Err(e) = self.bot.download_file(&file.path, &mut dst).await {
            drop(dst);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(Error::Backend(format!("media download failed: {e}")));
        }

        debug!(path = %path.display(), "media downloaded");
        Ok(DownloadedMedia {
            kind: media.kind,
            path,
        })
    }
}

#[async_trait]
impl ChatSender for TelegramClient {
    async fn connect(&self) -> Result<()> {
        <Self as ChatReader>::connect(self).await
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), markdown_to_html(text))
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_file(
        &self,
        chat_id: ChatId,
        media: &DownloadedMedia,
        caption: &str,
    ) -> Result<MessageRef> {
        let chat = Self::tg_chat(chat_id);
        let input = InputFile::file(media.path.clone());
        let caption = markdown_to_html(caption);

        let sent = match media.kind {
            MediaKind::Photo => {
                self.bot
                    .send_photo(chat, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
            MediaKind::Video => {
                self.bot
                    .send_video(chat, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
            MediaKind::Animation => {
                self.bot
                    .send_animation(chat, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
            MediaKind::Audio => {
                self.bot
                    .send_audio(chat, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
            MediaKind::Voice => {
                self.bot
                    .send_voice(chat, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
            MediaKind::Document => {
                self.bot
                    .send_document(chat, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
        };

        let msg = sent.map_err(|e| {
            if !matches!(e, RequestError::RetryAfter(_)) {
                warn!(chat = %chat_id, kind = ?media.kind, "media send rejected");
            }
            Self::map_err(e)
        })?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}

fn chat_title(msg: &Message) -> String {
    let chat = &msg.chat;
    chat.title()
        .or_else(|| chat.username())
        .or_else(|| chat.first_name())
        .unwrap_or_default()
        .to_string()
}

/// Convert a Bot API message into the relay's view of it.
fn relay_message(msg: &Message) -> RelayMessage {
    RelayMessage {
        chat_id: ChatId(msg.chat.id.0),
        id: MessageId(msg.id.0),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media: media_ref(msg),
    }
}

fn media_ref(msg: &Message) -> Option<MediaRef> {
    let plain = |kind: MediaKind, file_id: &str| MediaRef {
        kind,
        file_id: file_id.to_string(),
        file_name: None,
    };

    if let Some(best) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(plain(MediaKind::Photo, &best.file.id));
    }
    if let Some(a) = msg.animation() {
        return Some(MediaRef {
            file_name: a.file_name.clone(),
            ..plain(MediaKind::Animation, &a.file.id)
        });
    }
    if let Some(v) = msg.video() {
        return Some(MediaRef {
            file_name: v.file_name.clone(),
            ..plain(MediaKind::Video, &v.file.id)
        });
    }
    if let Some(a) = msg.audio() {
        return Some(MediaRef {
            file_name: a.file_name.clone(),
            ..plain(MediaKind::Audio, &a.file.id)
        });
    }
    if let Some(v) = msg.voice() {
        return Some(plain(MediaKind::Voice, &v.file.id));
    }
    msg.document().map(|d| MediaRef {
        file_name: d.file_name.clone(),
        ..plain(MediaKind::Document, &d.file.id)
    })
}

/// `{dir}/{chat}_{message}[_{name}].{ext}`; the extension comes from the
/// original file name, then the server path, then the media kind.
fn download_path(dir: &Path, message: &RelayMessage, media: &MediaRef, remote: &str) -> PathBuf {
    let ext = media
        .file_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .or_else(|| Path::new(remote).extension())
        .and_then(|e| e.to_str())
        .unwrap_or_else(|| media.kind.default_extension());

    let stem = format!("{}_{}", message.chat_id.0.unsigned_abs(), message.id.0);
    let name = match media.file_name.as_deref().map(safe_stem) {
        Some(s) if !s.is_empty() => format!("{stem}_{s}.{ext}"),
        _ => format!("{stem}.{ext}"),
    };
    dir.join(name)
}

fn safe_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .take(48)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    fn channel_post(id: i32, extra: serde_json::Value) -> Message {
        let mut base = serde_json::json!({
            "message_id": id,
            "date": 1_700_000_000,
            "chat": { "id": -1001, "type": "channel", "title": "News" },
        });
        if let (Some(b), Some(e)) = (base.as_object_mut(), extra.as_object()) {
            b.extend(e.clone());
        }
        message(base)
    }

    fn text_msg(id: i32) -> RelayMessage {
        RelayMessage {
            chat_id: ChatId(-1001),
            id: MessageId(id),
            text: Some(format!("m{id}")),
            media: None,
        }
    }

    #[test]
    fn retry_after_becomes_rate_limit() {
        let err = TelegramClient::map_err(RequestError::RetryAfter(Duration::from_secs(10)));
        assert!(matches!(err, Error::RateLimited(d) if d == Duration::from_secs(10)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn api_errors_become_backend_errors() {
        let err = TelegramClient::map_err(RequestError::Api(teloxide::ApiError::BotBlocked));
        assert!(matches!(err, Error::Backend(_)));
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn converts_text_post() {
        let msg = channel_post(5, serde_json::json!({ "text": "hello" }));
        let relay = relay_message(&msg);
        assert_eq!(relay.chat_id, ChatId(-1001));
        assert_eq!(relay.id, MessageId(5));
        assert_eq!(relay.text.as_deref(), Some("hello"));
        assert!(relay.media.is_none());
        assert_eq!(chat_title(&msg), "News");
    }

    #[test]
    fn converts_photo_with_caption_using_largest_size() {
        let msg = channel_post(
            6,
            serde_json::json!({
                "caption": "look",
                "photo": [
                    { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90 },
                    { "file_id": "large", "file_unique_id": "l", "width": 800, "height": 800 }
                ]
            }),
        );
        let relay = relay_message(&msg);
        assert_eq!(relay.text.as_deref(), Some("look"));
        let media = relay.media.unwrap();
        assert_eq!(media.kind, MediaKind::Photo);
        assert_eq!(media.file_id, "large");
    }

    #[test]
    fn converts_document_keeping_file_name() {
        let msg = channel_post(
            7,
            serde_json::json!({
                "document": { "file_id": "doc", "file_unique_id": "d", "file_name": "report.pdf" }
            }),
        );
        let media = relay_message(&msg).media.unwrap();
        assert_eq!(media.kind, MediaKind::Document);
        assert_eq!(media.file_name.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn buffer_keeps_ids_sorted_and_bounded() {
        let mut buf = ChatBuffer::default();
        for id in [3, 1, 2, 5, 4] {
            buf.insert(text_msg(id), 3);
        }
        let ids: Vec<i32> = buf.messages.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![3, 4, 5]);

        buf.insert(text_msg(4), 3);
        assert_eq!(buf.messages.len(), 3);
    }

    #[test]
    fn ingest_advances_offset_past_every_update() {
        let mut ingest = Ingest::default();
        let msg = channel_post(1, serde_json::json!({ "text": "a" }));
        ingest.record(41, &msg, 10);
        ingest.record(40, &msg, 10);
        assert_eq!(ingest.offset, 42);
        assert_eq!(ingest.chats[&-1001].messages.len(), 1);
        assert_eq!(ingest.chats[&-1001].title, "News");
    }

    #[test]
    fn download_path_prefers_original_extension() {
        let dir = tempfile::tempdir().unwrap();
        let msg = text_msg(9);
        let media = MediaRef {
            kind: MediaKind::Document,
            file_id: "x".to_string(),
            file_name: Some("My Report.final.PDF".to_string()),
        };
        let path = download_path(dir.path(), &msg, &media, "documents/file_1.bin");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "1001_9_My_Report_final.PDF"
        );

        let photo = MediaRef {
            kind: MediaKind::Photo,
            file_id: "p".to_string(),
            file_name: None,
        };
        let path = download_path(dir.path(), &msg, &photo, "photos/file_2");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "1001_9.jpg");
    }
}
