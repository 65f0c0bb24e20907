use std::{fmt, path::Path};

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::{errors::Error, Result};

/// Initialize logging for the relay.
///
/// Console: info and above (override with `RUST_LOG`).
/// File: errors only, appended to `log_file` as
/// `timestamp - component - LEVEL - message`.
///
/// Keep the returned guard alive until exit so buffered lines reach the file.
pub fn init(service_name: &str, log_file: &Path) -> Result<WorkerGuard> {
    let dir = match log_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = log_file.file_name().ok_or_else(|| Error::InvalidPath {
        path: log_file.to_path_buf(),
        reason: "log file path has no file name".to_string(),
    })?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    // Default: info for our crates, warn for everything else.
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,tgcp=info,tgcp_core=info,tgcp_telegram=info,{service_name}=info"
        ))
    });

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(true)
        .with_filter(console_filter);

    let file = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .event_format(LineFormat)
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::External(format!("logging already initialized: {e}")))?;

    Ok(guard)
}

/// `2026-01-01 10:00:00,123 - tgcp_core::forwarder - ERROR - message key=value`
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "{} - {} - {} - ",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            meta.target(),
            meta.level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
