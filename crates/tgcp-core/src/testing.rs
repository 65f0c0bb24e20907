//! In-memory reader/sender doubles used by the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    domain::{
        ChatId, Dialog, DownloadedMedia, MediaKind, MediaRef, MessageId, MessageRef, RelayMessage,
    },
    errors::Error,
    messaging::port::{ChatReader, ChatSender},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub enum ScriptedError {
    Backend,
    RateLimited(u64),
    Io,
}

impl ScriptedError {
    fn into_error(self) -> Error {
        match self {
            ScriptedError::Backend => Error::Backend("scripted failure".to_string()),
            ScriptedError::RateLimited(secs) => Error::RateLimited(Duration::from_secs(secs)),
            ScriptedError::Io => Error::Io(std::io::Error::other("scripted i/o failure")),
        }
    }
}

#[derive(Default)]
struct ReaderState {
    dialogs: Vec<Dialog>,
    chats: HashMap<ChatId, Vec<RelayMessage>>,
    connect_failures: u32,
    connect_error: Option<ScriptedError>,
    fetch_errors: VecDeque<ScriptedError>,
    fetch_calls: usize,
    download_error: Option<ScriptedError>,
    downloads: usize,
}

#[derive(Default)]
pub struct FakeReader {
    state: Mutex<ReaderState>,
}

impl FakeReader {
    pub fn add_dialog(&self, id: ChatId, title: &str) {
        self.state.lock().unwrap().dialogs.push(Dialog {
            id,
            title: title.to_string(),
        });
    }

    pub fn push(&self, msg: RelayMessage) {
        let mut st = self.state.lock().unwrap();
        st.chats.entry(msg.chat_id).or_default().push(msg);
    }

    pub fn push_text(&self, chat: i64, id: i32, text: &str) {
        self.push(RelayMessage {
            chat_id: ChatId(chat),
            id: MessageId(id),
            text: Some(text.to_string()),
            media: None,
        });
    }

    pub fn push_photo(&self, chat: i64, id: i32, caption: Option<&str>) {
        self.push(RelayMessage {
            chat_id: ChatId(chat),
            id: MessageId(id),
            text: caption.map(str::to_string),
            media: Some(MediaRef {
                kind: MediaKind::Photo,
                file_id: format!("file-{chat}-{id}"),
                file_name: None,
            }),
        });
    }

    pub fn fail_connect(&self, err: ScriptedError, times: u32) {
        let mut st = self.state.lock().unwrap();
        st.connect_error = Some(err);
        st.connect_failures = times;
    }

    pub fn fail_next_fetch(&self, err: ScriptedError) {
        self.state.lock().unwrap().fetch_errors.push_back(err);
    }

    /// Make every following download fail with `err`.
    pub fn fail_downloads(&self, err: ScriptedError) {
        self.state.lock().unwrap().download_error = Some(err);
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn downloads(&self) -> usize {
        self.state.lock().unwrap().downloads
    }
}

#[async_trait]
impl ChatReader for FakeReader {
    async fn connect(&self) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        if st.connect_failures > 0 {
            st.connect_failures -= 1;
            let err = st.connect_error.unwrap_or(ScriptedError::Backend);
            return Err(err.into_error());
        }
        Ok(())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        Ok(self.state.lock().unwrap().dialogs.clone())
    }

    async fn latest_messages(&self, chat_id: ChatId, limit: usize) -> Result<Vec<RelayMessage>> {
        let st = self.state.lock().unwrap();
        let mut msgs = st.chats.get(&chat_id).cloned().unwrap_or_default();
        msgs.sort_by(|a, b| b.id.cmp(&a.id));
        msgs.truncate(limit);
        Ok(msgs)
    }

    async fn messages_after(
        &self,
        chat_id: ChatId,
        after: MessageId,
        limit: usize,
    ) -> Result<Vec<RelayMessage>> {
        let mut st = self.state.lock().unwrap();
        st.fetch_calls += 1;
        if let Some(err) = st.fetch_errors.pop_front() {
            return Err(err.into_error());
        }
        let mut msgs: Vec<RelayMessage> = st
            .chats
            .get(&chat_id)
            .map(|v| v.iter().filter(|m| m.id > after).cloned().collect())
            .unwrap_or_default();
        msgs.sort_by_key(|m| m.id);
        msgs.truncate(limit);
        Ok(msgs)
    }

    async fn download_media(&self, message: &RelayMessage, dir: &Path) -> Result<DownloadedMedia> {
        let media = message
            .media
            .as_ref()
            .ok_or_else(|| Error::Backend("message has no media".to_string()))?;
        {
            let mut st = self.state.lock().unwrap();
            if let Some(err) = st.download_error {
                return Err(err.into_error());
            }
            st.downloads += 1;
        }
        let path = dir.join(format!(
            "{}_{}.{}",
            message.chat_id.0.unsigned_abs(),
            message.id.0,
            media.kind.default_extension()
        ));
        std::fs::write(&path, b"media")?;
        Ok(DownloadedMedia {
            kind: media.kind,
            path,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: ChatId,
    pub body: String,
    pub file: Option<PathBuf>,
    /// Whether the file was present on disk at send time.
    pub file_present: bool,
}

#[derive(Default)]
struct SenderState {
    sent: Vec<Sent>,
    attempts: Vec<(ChatId, Instant)>,
    errors: HashMap<usize, ScriptedError>,
    next_id: i32,
}

#[derive(Default)]
pub struct FakeSender {
    state: Mutex<SenderState>,
}

impl FakeSender {
    /// Fail the `n`-th send attempt (0-based) with `err`.
    pub fn fail_attempt(&self, n: usize, err: ScriptedError) {
        self.state.lock().unwrap().errors.insert(n, err);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn attempts(&self) -> Vec<(ChatId, Instant)> {
        self.state.lock().unwrap().attempts.clone()
    }

    fn record(&self, chat_id: ChatId, body: &str, file: Option<&Path>) -> Result<MessageRef> {
        let mut st = self.state.lock().unwrap();
        let n = st.attempts.len();
        st.attempts.push((chat_id, Instant::now()));
        if let Some(err) = st.errors.remove(&n) {
            return Err(err.into_error());
        }
        st.next_id += 1;
        let message_id = MessageId(st.next_id);
        st.sent.push(Sent {
            chat_id,
            body: body.to_string(),
            file: file.map(Path::to_path_buf),
            file_present: file.is_some_and(Path::exists),
        });
        Ok(MessageRef {
            chat_id,
            message_id,
        })
    }
}

#[async_trait]
impl ChatSender for FakeSender {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.record(chat_id, text, None)
    }

    async fn send_file(
        &self,
        chat_id: ChatId,
        media: &DownloadedMedia,
        caption: &str,
    ) -> Result<MessageRef> {
        self.record(chat_id, caption, Some(&media.path))
    }
}
