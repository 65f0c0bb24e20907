//! The polling / forwarding loop.
//!
//! One session polls every source chat in turn, forwards what passes the
//! filter to every destination, then sleeps. Progress per source chat is a
//! watermark (highest message id seen), kept in memory for the session only.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    thread,
    time::Duration,
};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    chats::{connect_reader, connect_sender, RetryPolicy},
    config::Config,
    domain::{ChatId, MessageId, RelayMessage},
    errors::Error,
    filter::{media_caption, strip_footer, with_signature, MessageFilter},
    messaging::port::{ChatReader, ChatSender},
    profile::Profile,
    Result,
};

/// What to forward, from where, to where.
#[derive(Clone, Debug)]
pub struct ForwardPlan {
    pub sources: Vec<ChatId>,
    pub destinations: Vec<ChatId>,
    pub filter: MessageFilter,
    pub signature: String,
}

impl From<&Profile> for ForwardPlan {
    fn from(p: &Profile) -> Self {
        Self {
            sources: p.sources(),
            destinations: p.destinations(),
            filter: p.filter(),
            signature: p.signature.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ForwarderOptions {
    pub poll_interval: Duration,
    pub page_size: usize,
    pub footer_marker: String,
    pub download_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl From<&Config> for ForwarderOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            page_size: cfg.fetch_page_size.max(1),
            footer_marker: cfg.footer_marker.clone(),
            download_dir: cfg.download_dir.clone(),
            retry: RetryPolicy {
                max_attempts: cfg.max_connect_retries,
                delay: cfg.connect_retry_delay,
            },
        }
    }
}

/// Highest processed message id per source chat. Never moves backwards.
#[derive(Clone, Debug, Default)]
pub struct Watermarks {
    inner: HashMap<ChatId, MessageId>,
}

impl Watermarks {
    pub fn get(&self, chat: ChatId) -> MessageId {
        self.inner.get(&chat).copied().unwrap_or_default()
    }

    /// Raise the watermark to `id` if it is higher. Returns whether it moved.
    pub fn advance(&mut self, chat: ChatId, id: MessageId) -> bool {
        let entry = self.inner.entry(chat).or_default();
        if id > *entry {
            *entry = id;
            true
        } else {
            false
        }
    }
}

/// Counters for one pass (or, accumulated, for a whole session).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub fetched: usize,
    pub forwarded: usize,
    pub skipped: usize,
    pub failed_sends: usize,
    pub failed_downloads: usize,
}

impl PassReport {
    fn absorb(&mut self, other: &PassReport) {
        self.fetched += other.fetched;
        self.forwarded += other.forwarded;
        self.skipped += other.skipped;
        self.failed_sends += other.failed_sends;
        self.failed_downloads += other.failed_downloads;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub passes: usize,
    pub totals: PassReport,
}

pub struct Forwarder {
    reader: Arc<dyn ChatReader>,
    sender: Arc<dyn ChatSender>,
    plan: ForwardPlan,
    opts: ForwarderOptions,
    watermarks: Watermarks,
    prepared: bool,
}

impl Forwarder {
    /// `reader` and `sender` may be the same client.
    pub fn new(
        reader: Arc<dyn ChatReader>,
        sender: Arc<dyn ChatSender>,
        plan: ForwardPlan,
        opts: ForwarderOptions,
    ) -> Self {
        Self {
            reader,
            sender,
            plan,
            opts,
            watermarks: Watermarks::default(),
            prepared: false,
        }
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    /// Connect both roles and start every source chat at its latest message,
    /// so history is not forwarded.
    pub async fn prepare(&mut self) -> Result<()> {
        connect_reader(self.reader.as_ref(), self.opts.retry).await?;
        connect_sender(self.sender.as_ref(), self.opts.retry).await?;

        for &chat in &self.plan.sources {
            let latest = self.reader.latest_messages(chat, 1).await?;
            let start = latest.first().map(|m| m.id).unwrap_or_default();
            self.watermarks.advance(chat, start);
            debug!(chat = %chat, watermark = %start, "source chat initialized");
        }

        std::fs::create_dir_all(&self.opts.download_dir)?;
        self.prepared = true;
        info!(
            sources = self.plan.sources.len(),
            destinations = self.plan.destinations.len(),
            "forwarding session ready"
        );
        Ok(())
    }

    /// Poll until `stop` is cancelled. The token is checked between passes;
    /// a running pass or sleep is never cut short.
    pub async fn run(&mut self, stop: &CancellationToken) -> Result<SessionReport> {
        if !self.prepared {
            self.prepare().await?;
        }

        let mut session = SessionReport::default();
        while !stop.is_cancelled() {
            info!("checking for new messages");
            let mut pass = PassReport::default();

            match self.run_pass(&mut pass).await {
                Ok(()) => {}
                Err(Error::RateLimited(wait)) => {
                    warn!(wait_secs = wait.as_secs(), "rate limited, pausing");
                    sleep(wait).await;
                }
                Err(e @ Error::Backend(_)) => {
                    error!(error = %e, "backend error during pass");
                }
                Err(e) => {
                    error!(error = %e, "unexpected error during pass");
                }
            }

            if pass.forwarded > 0 || pass.failed_sends > 0 || pass.failed_downloads > 0 {
                info!(
                    forwarded = pass.forwarded,
                    skipped = pass.skipped,
                    failed_sends = pass.failed_sends,
                    failed_downloads = pass.failed_downloads,
                    "pass finished"
                );
            }
            session.passes += 1;
            session.totals.absorb(&pass);

            sleep(self.opts.poll_interval).await;
        }

        info!(
            passes = session.passes,
            forwarded = session.totals.forwarded,
            skipped = session.totals.skipped,
            failed_sends = session.totals.failed_sends,
            failed_downloads = session.totals.failed_downloads,
            "forwarding stopped"
        );
        Ok(session)
    }

    /// One sweep over every source chat.
    ///
    /// Errors abort the rest of the pass; watermarks advanced so far stay.
    pub async fn run_pass(&mut self, report: &mut PassReport) -> Result<()> {
        let sources = self.plan.sources.clone();
        for chat in sources {
            self.poll_chat(chat, report).await?;
        }
        Ok(())
    }

    async fn poll_chat(&mut self, chat: ChatId, report: &mut PassReport) -> Result<()> {
        let page_size = self.opts.page_size;
        loop {
            let cursor = self.watermarks.get(chat);
            let mut page = self.reader.messages_after(chat, cursor, page_size).await?;
            let full_page = page.len() >= page_size;

            page.retain(|m| m.id > cursor);
            page.sort_by_key(|m| m.id);
            if page.is_empty() {
                return Ok(());
            }

            for msg in &page {
                self.process(msg, report).await?;
                self.watermarks.advance(chat, msg.id);
            }

            if !full_page {
                return Ok(());
            }
        }
    }

    async fn process(&self, msg: &RelayMessage, report: &mut PassReport) -> Result<()> {
        report.fetched += 1;

        if !self.plan.filter.should_forward(msg.text.as_deref()) {
            report.skipped += 1;
            debug!(chat = %msg.chat_id, id = %msg.id, "filtered out");
            return Ok(());
        }

        let cleaned = msg
            .text
            .as_deref()
            .map(|t| strip_footer(t, &self.opts.footer_marker))
            .filter(|t| !t.is_empty());

        if cleaned.is_none() && msg.media.is_none() {
            report.skipped += 1;
            debug!(chat = %msg.chat_id, id = %msg.id, "nothing left to send");
            return Ok(());
        }

        if let Some(body) = cleaned.as_deref() {
            let body = with_signature(body, &self.plan.signature);
            for &dest in &self.plan.destinations {
                let sent = self.sender.send_text(dest, &body).await;
                self.settle(dest, msg, sent, report)?;
            }
        }

        let media_sent = match msg.media {
            Some(_) => self.forward_media(msg, cleaned.as_deref(), report).await?,
            None => false,
        };
        if cleaned.is_none() && !media_sent {
            return Ok(());
        }

        report.forwarded += 1;
        info!(chat = %msg.chat_id, id = %msg.id, "message forwarded");
        Ok(())
    }

    /// Download once, send to every destination, remove the file.
    ///
    /// A download the backend refuses (e.g. a file over the size limit) is
    /// logged and counted, and `Ok(false)` returned; the message is not retried.
    async fn forward_media(
        &self,
        msg: &RelayMessage,
        cleaned: Option<&str>,
        report: &mut PassReport,
    ) -> Result<bool> {
        let media = match self
            .reader
            .download_media(msg, &self.opts.download_dir)
            .await
        {
            Ok(m) => m,
            Err(e @ Error::RateLimited(_)) => return Err(e),
            Err(e) => {
                report.failed_downloads += 1;
                error!(chat = %msg.chat_id, id = %msg.id, error = %e, "media download failed");
                return Ok(false);
            }
        };
        let caption = media_caption(cleaned, &self.plan.signature);

        let mut outcome = Ok(());
        for &dest in &self.plan.destinations {
            let sent = self.sender.send_file(dest, &media, &caption).await;
            if let Err(e) = self.settle(dest, msg, sent, report) {
                outcome = Err(e);
                break;
            }
        }

        if let Err(e) = std::fs::remove_file(&media.path) {
            debug!(path = %media.path.display(), error = %e, "could not remove downloaded media");
        }
        outcome.map(|()| true)
    }

    /// A failed send to one destination is logged and skipped; only a rate
    /// limit propagates, since it applies to every following call too.
    fn settle<T>(
        &self,
        dest: ChatId,
        msg: &RelayMessage,
        sent: Result<T>,
        report: &mut PassReport,
    ) -> Result<()> {
        match sent {
            Ok(_) => Ok(()),
            Err(e @ Error::RateLimited(_)) => Err(e),
            Err(e) => {
                report.failed_sends += 1;
                error!(dest = %dest, chat = %msg.chat_id, id = %msg.id, error = %e, "send failed");
                Ok(())
            }
        }
    }
}

/// Spawn the thread watching operator input for `exit`.
///
/// `next_line` yields `Ok(None)` at end of input. The thread stops reading
/// once it has cancelled `stop`, so the caller gets stdin back afterwards.
pub fn spawn_stop_listener<F>(mut next_line: F, stop: CancellationToken) -> thread::JoinHandle<()>
where
    F: FnMut() -> std::io::Result<Option<String>> + Send + 'static,
{
    thread::spawn(move || loop {
        if stop.is_cancelled() {
            return;
        }
        match next_line() {
            Ok(Some(line)) if is_exit_command(&line) => {
                info!("exit requested, stopping after the current pass");
                stop.cancel();
                return;
            }
            Ok(Some(_)) => continue,
            Ok(None) => {
                debug!("input closed, stop listener finished");
                return;
            }
            Err(e) => {
                warn!(error = %e, "stop listener could not read input");
                return;
            }
        }
    })
}

pub fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

/// Line source over the process's stdin for [`spawn_stop_listener`].
pub fn stdin_lines() -> impl FnMut() -> std::io::Result<Option<String>> + Send + 'static {
    || {
        let mut buf = String::new();
        match std::io::stdin().read_line(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf)),
        }
    }
}

/// Prepare the forwarder, start the stop listener on `input`, and poll until
/// the operator types `exit`.
///
/// The listener is only started once both connections are up, so a failed
/// start leaves nothing reading the input.
pub async fn run_session<F>(mut forwarder: Forwarder, input: F) -> Result<SessionReport>
where
    F: FnMut() -> std::io::Result<Option<String>> + Send + 'static,
{
    forwarder.prepare().await?;
    let stop = CancellationToken::new();
    let _listener = spawn_stop_listener(input, stop.clone());
    forwarder.run(&stop).await
}
