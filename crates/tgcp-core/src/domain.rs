use std::path::PathBuf;

/// Telegram chat id (numeric, negative for groups and channels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric, increasing per chat).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Audio,
    Voice,
    Document,
}

impl MediaKind {
    /// File extension used when the backend doesn't report a file name.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Animation => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Voice => "ogg",
            MediaKind::Document => "bin",
        }
    }
}

/// Media attachment as seen by the reader. `file_id` is a backend handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
    pub file_name: Option<String>,
}

/// A message fetched from a source chat.
///
/// For media messages `text` holds the caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayMessage {
    pub chat_id: ChatId,
    pub id: MessageId,
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

/// Media downloaded to local storage, ready to be re-sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadedMedia {
    pub kind: MediaKind,
    pub path: PathBuf,
}

/// A chat visible to the reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dialog {
    pub id: ChatId,
    pub title: String,
}
