use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    credentials::DEFAULT_KDF_ITERATIONS, errors::Error, filter::DEFAULT_FOOTER_MARKER, Result,
};

/// Largest page the Bot API style backends hand out per request.
pub const MAX_FETCH_PAGE_SIZE: usize = 100;
const MIN_KDF_ITERATIONS: u32 = 10_000;

/// Runtime configuration.
///
/// Every field has a default; `TGCP_*` environment variables (or a `.env`
/// file in the working directory) override them.
#[derive(Clone, Debug)]
pub struct Config {
    // Files
    pub profiles_file: PathBuf,
    pub credentials_file: PathBuf,
    pub log_file: PathBuf,
    pub chat_list_file: PathBuf,
    pub download_dir: PathBuf,

    // Forwarding loop
    pub poll_interval: Duration,
    pub fetch_page_size: usize,
    pub footer_marker: String,

    // Connections
    pub max_connect_retries: u32,
    pub connect_retry_delay: Duration,

    // Backend buffering (Bot API reader)
    pub buffer_capacity: usize,

    // Credentials
    pub kdf_iterations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profiles_file: PathBuf::from("telegramconfiguration.json"),
            credentials_file: PathBuf::from("credentials.bin"),
            log_file: PathBuf::from("tgcp.log"),
            chat_list_file: PathBuf::from("chats_of_reader.txt"),
            download_dir: PathBuf::from("downloads"),
            poll_interval: Duration::from_secs(5),
            fetch_page_size: MAX_FETCH_PAGE_SIZE,
            footer_marker: DEFAULT_FOOTER_MARKER.to_string(),
            max_connect_retries: 3,
            connect_retry_delay: Duration::from_secs(5),
            buffer_capacity: 1000,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_lookup(|key| env::var(key).ok());
        ensure_download_dir(&cfg.download_dir)?;
        Ok(cfg)
    }

    /// Build a config from an arbitrary variable source (env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let path = |key: &str, default: PathBuf| {
            lookup(key)
                .and_then(non_empty)
                .map(PathBuf::from)
                .unwrap_or(default)
        };
        let num = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            profiles_file: path("TGCP_PROFILES_FILE", d.profiles_file),
            credentials_file: path("TGCP_CREDENTIALS_FILE", d.credentials_file),
            log_file: path("TGCP_LOG_FILE", d.log_file),
            chat_list_file: path("TGCP_CHAT_LIST_FILE", d.chat_list_file),
            download_dir: path("TGCP_DOWNLOAD_DIR", d.download_dir),
            poll_interval: num("TGCP_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.poll_interval),
            fetch_page_size: num("TGCP_FETCH_PAGE_SIZE")
                .map(|n| (n as usize).clamp(1, MAX_FETCH_PAGE_SIZE))
                .unwrap_or(d.fetch_page_size),
            footer_marker: lookup("TGCP_FOOTER_MARKER")
                .and_then(non_empty)
                .unwrap_or(d.footer_marker),
            max_connect_retries: num("TGCP_MAX_CONNECT_RETRIES")
                .map(|n| n.clamp(1, u32::MAX as u64) as u32)
                .unwrap_or(d.max_connect_retries),
            connect_retry_delay: num("TGCP_CONNECT_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.connect_retry_delay),
            buffer_capacity: num("TGCP_BUFFER_CAPACITY")
                .map(|n| (n as usize).max(1))
                .unwrap_or(d.buffer_capacity),
            kdf_iterations: num("TGCP_KDF_ITERATIONS")
                .map(|n| n.clamp(MIN_KDF_ITERATIONS as u64, u32::MAX as u64) as u32)
                .unwrap_or(d.kdf_iterations),
        }
    }
}

fn ensure_download_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        Error::Config(format!(
            "cannot create download directory {}: {e}",
            dir.display()
        ))
    })
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
