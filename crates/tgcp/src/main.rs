use std::{sync::Arc, time::Duration};

use anyhow::Result;
use console::Term;
use tracing::{error, info};

use tgcp_core::{
    config::Config,
    credentials::CredentialStore,
    messaging::{
        port::{ChatReader, ChatSender},
        throttled::{ThrottleConfig, ThrottledSender},
    },
    profile::ProfileStore,
};
use tgcp_telegram::TelegramClient;

mod menu;
mod prompts;
mod ui;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;
    let _log_guard = tgcp_core::logging::init("tgcp", &cfg.log_file)?;

    let term = Term::stdout();
    ui::intro(&term).await;
    println!("{}", ui::intro_text());

    let store = CredentialStore::new(&cfg.credentials_file, cfg.kdf_iterations);
    let login = match prompts::login(&store) {
        Ok(l) => l,
        Err(e) => {
            println!("{}", ui::main_text("Operation cancelled. Exiting.", None));
            info!(reason = %e, "no credentials, exiting");
            return Ok(());
        }
    };

    let client = Arc::new(TelegramClient::new(
        login.credentials.bot_token.clone(),
        cfg.buffer_capacity,
    ));
    let reader: Arc<dyn ChatReader> = match prompts::reader_token()? {
        Some(token) => Arc::new(TelegramClient::new(token, cfg.buffer_capacity)),
        None => client.clone(),
    };
    let sender: Arc<dyn ChatSender> =
        Arc::new(ThrottledSender::new(client, ThrottleConfig::default()));

    let app = menu::App {
        profiles: ProfileStore::new(&cfg.profiles_file),
        cfg,
        reader,
        sender,
    };
    app.run().await;

    shutdown(&app.cfg, &store, login.saved).await;
    Ok(())
}

/// Ask what to keep, clean up accordingly, and say goodbye.
async fn shutdown(cfg: &Config, store: &CredentialStore, saved: bool) {
    if let Err(e) = cleanup(cfg, store, saved) {
        error!(error = %e, "cleanup on exit failed");
        println!("{}", ui::alert(&format!("Cleanup failed: {e}"), None));
    }
    ui::animated_transition("Shutting down", Duration::from_millis(500)).await;
    println!("{}", ui::success("tgcp is shutting down. See you!", Some("🌙")));
    if let Err(e) = prompts::pause("Press Enter to exit") {
        error!(error = %e, "could not read exit prompt");
    }
}

fn cleanup(cfg: &Config, store: &CredentialStore, saved: bool) -> Result<()> {
    if saved {
        if prompts::yes_no("Keep your encrypted credentials for next time?", true)? {
            println!(
                "{}",
                ui::main_text("Your encrypted credentials stay stored for next time.", Some("🔒"))
            );
        } else {
            println!("{}", ui::alert("Stored credentials will be deleted.", Some("⚠️")));
            if prompts::yes_no("Are you sure?", false)? {
                store.delete()?;
                println!("{}", ui::success("Credentials deleted.", Some("✅")));
            } else {
                println!(
                    "{}",
                    ui::main_text("Operation cancelled. Your credentials are unchanged.", None)
                );
            }
        }
    }

    if cfg.download_dir.is_dir() && prompts::yes_no("Delete downloaded media?", true)? {
        println!("{}", ui::main_text("Cleaning up downloaded media...", Some("🧹")));
        for entry in std::fs::read_dir(&cfg.download_dir)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)?;
            }
        }
    }
    Ok(())
}
