use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Input, Password, Select};
use tracing::warn;

use tgcp_core::{
    credentials::{CredentialStore, Credentials},
    profile::{Profile, ProfileInput, ProfileStore},
};

use crate::ui;

/// Credentials for this run and whether they are stored on disk.
pub struct Login {
    pub credentials: Credentials,
    pub saved: bool,
}

pub fn yes_no(question: &str, default: bool) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(ui::prompt(question))
        .default(default)
        .interact()?)
}

fn text(label: &str) -> Result<String> {
    Ok(Input::<String>::new()
        .with_prompt(ui::prompt(label))
        .allow_empty(true)
        .interact_text()?)
}

fn text_with_default(label: &str, current: &str) -> Result<String> {
    Ok(Input::<String>::new()
        .with_prompt(ui::prompt(label))
        .default(current.to_string())
        .allow_empty(true)
        .interact_text()?)
}

fn secret(label: &str) -> Result<String> {
    Password::new()
        .with_prompt(ui::prompt(label))
        .allow_empty_password(false)
        .interact()
        .with_context(|| format!("failed to read {label}"))
}

pub fn pause(label: &str) -> Result<()> {
    text(label).map(drop)
}

/// Decrypt stored credentials, or fall back to asking for new ones.
pub fn login(store: &CredentialStore) -> Result<Login> {
    if store.exists() {
        let password = secret("Password for your stored credentials")?;
        match store.load(&password) {
            Ok(Some(credentials)) if credentials.is_complete() => {
                println!("{}", ui::success("Credentials decrypted! Welcome back!", Some("🎉")));
                return Ok(Login {
                    credentials,
                    saved: true,
                });
            }
            Ok(_) => println!("{}", ui::alert("Stored credentials are incomplete.", None)),
            Err(e) => {
                warn!(error = %e, "stored credentials could not be decrypted");
                println!("{}", ui::alert(&format!("Could not decrypt credentials: {e}"), None));
            }
        }
    }

    println!("{}", ui::main_text("Let's set up your Telegram bot credentials!", Some("🚀")));
    enter_credentials(store)
}

fn enter_credentials(store: &CredentialStore) -> Result<Login> {
    println!(
        "{}",
        ui::alert("HEADS UP: you are about to enter your Telegram API details.", Some("🚨"))
    );
    println!("{}", ui::alert("Keep them safe. Your bot token is like a key!", None));
    if !yes_no("Do you want to continue?", true)? {
        bail!("credential entry cancelled");
    }

    let credentials = Credentials {
        api_id: secret("API ID")?,
        api_hash: secret("API hash")?,
        bot_token: secret("Bot token")?,
    };

    println!(
        "{}",
        ui::alert("Storing credentials is not always advisable from a security standpoint.", Some("⚠️"))
    );
    let saved = if yes_no("Save your credentials for future use?", false)? {
        let password = Password::new()
            .with_prompt(ui::prompt("Encryption password"))
            .with_confirmation(ui::prompt("Repeat password"), "Passwords do not match")
            .interact()?;
        store.save(&credentials, &password)?;
        println!("{}", ui::success("Credentials saved and encrypted.", Some("🔐")));
        true
    } else {
        println!("{}", ui::main_text("Credentials will not be stored.", None));
        false
    };

    Ok(Login { credentials, saved })
}

/// Token of a second bot used only for reading, if the operator wants one.
pub fn reader_token() -> Result<Option<String>> {
    if yes_no("Use a separate reader account?", false)? {
        Ok(Some(secret("Reader bot token")?))
    } else {
        Ok(None)
    }
}

/// Prompt for a profile until the input validates.
pub fn new_profile() -> Result<Profile> {
    loop {
        let sources = text("Source chat IDs (comma-separated)")?;
        let destinations = text("Destination chat IDs (comma-separated)")?;
        let keywords = text("Keywords to filter on (empty for everything)")?;
        let signature = text("Signature below every message")?;
        let blacklist = text("Blacklisted words (comma-separated, or empty)")?;

        let input = ProfileInput {
            source_chat_ids: &sources,
            destination_channel_ids: &destinations,
            keywords: &keywords,
            signature: &signature,
            blacklist: &blacklist,
        };
        match Profile::from_input(&input) {
            Ok(p) => return Ok(p),
            Err(e) => println!("{}", ui::alert(&e.to_string(), Some("❌"))),
        }
    }
}

pub fn offer_save(store: &ProfileStore, profile: &Profile) -> Result<()> {
    if !yes_no("Save this config as a profile?", false)? {
        return Ok(());
    }
    loop {
        let name = text("Name for this profile")?;
        match store.save(name.trim(), profile) {
            Ok(()) => {
                println!("{}", ui::success(&format!("Profile '{}' saved.", name.trim()), Some("✅")));
                return Ok(());
            }
            Err(e) => println!("{}", ui::alert(&e.to_string(), None)),
        }
    }
}

/// Let the operator pick one of `names`. `None` when there is nothing to pick.
pub fn pick_profile(names: &[String], question: &str) -> Result<Option<String>> {
    if names.is_empty() {
        return Ok(None);
    }
    println!("{}", ui::main_text("Available profiles:", Some("🎭")));
    let idx = Select::new()
        .with_prompt(ui::prompt(question))
        .items(names)
        .default(0)
        .interact()?;
    Ok(names.get(idx).cloned())
}

/// Re-ask every field with the current value as default.
pub fn edit_profile(name: &str, current: &Profile) -> Result<Profile> {
    println!("{}", ui::main_text(&format!("Editing profile: {name}"), None));
    loop {
        let sources = text_with_default("Source chat IDs (comma-separated)", &join(&current.source_chat_ids))?;
        let destinations = text_with_default(
            "Destination chat IDs (comma-separated)",
            &join(&current.destination_channel_ids),
        )?;
        let keywords = text_with_default("Keywords to filter on (optional)", &current.keywords.join(","))?;
        let signature = text_with_default("Signature below every message", &current.signature)?;
        let blacklist = text_with_default("Blacklisted words (optional)", &current.blacklist.join(","))?;

        let input = ProfileInput {
            source_chat_ids: &sources,
            destination_channel_ids: &destinations,
            keywords: &keywords,
            signature: &signature,
            blacklist: &blacklist,
        };
        match Profile::from_input(&input) {
            Ok(p) => return Ok(p),
            Err(e) => println!("{}", ui::alert(&e.to_string(), Some("❌"))),
        }
    }
}

fn join(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}
