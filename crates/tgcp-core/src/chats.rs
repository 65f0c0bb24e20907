use std::{fs, io::Write, path::Path, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    domain::Dialog,
    errors::Error,
    messaging::port::{ChatReader, ChatSender},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts failed.
///
/// A rate limit waits the backend-requested time instead of the fixed delay.
pub async fn with_retry<T, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = String::new();
    for attempt in 1..=attempts {
        match op().await {
            Ok(v) => {
                if attempt > 1 {
                    info!(%label, attempt, "connected after retry");
                }
                return Ok(v);
            }
            Err(e) => {
                warn!(%label, attempt, max = attempts, error = %e, "connection attempt failed");
                let wait = e.retry_after().unwrap_or(policy.delay);
                last_err = e.to_string();
                if attempt < attempts {
                    sleep(wait).await;
                }
            }
        }
    }
    Err(Error::Connect {
        attempts,
        reason: last_err,
    })
}

pub async fn connect_reader(reader: &dyn ChatReader, policy: RetryPolicy) -> Result<()> {
    with_retry("reader", policy, || reader.connect()).await
}

pub async fn connect_sender(sender: &dyn ChatSender, policy: RetryPolicy) -> Result<()> {
    with_retry("sender", policy, || sender.connect()).await
}

pub fn format_dialog(d: &Dialog) -> String {
    format!("Chat ID: {}, Title: {}", d.id, d.title)
}

/// List the reader's dialogs and write them to `path`, one line per chat.
pub async fn export_chat_list(
    reader: &dyn ChatReader,
    policy: RetryPolicy,
    path: &Path,
) -> Result<Vec<Dialog>> {
    connect_reader(reader, policy).await?;
    let dialogs = reader.list_dialogs().await?;

    let mut file = fs::File::create(path)?;
    for d in &dialogs {
        writeln!(file, "{}", format_dialog(d))?;
    }
    file.flush()?;

    info!(count = dialogs.len(), path = %path.display(), "chat list exported");
    Ok(dialogs)
}
