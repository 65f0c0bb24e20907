use std::{sync::Arc, time::Duration};

use anyhow::Result;
use dialoguer::Input;
use tokio::time::sleep;
use tracing::error;

use tgcp_core::{
    chats::{export_chat_list, format_dialog, RetryPolicy},
    config::Config,
    forwarder::{run_session, stdin_lines, ForwardPlan, Forwarder, ForwarderOptions},
    messaging::port::{ChatReader, ChatSender},
    profile::ProfileStore,
};

use crate::{prompts, ui};

const HELP: &str = "
    Telegram Copy & Paste relay - Help
    ==================================

    1. List chats
       - Shows every chat the reader account can see and writes the list to a file.
         Note: a bot only sees chats it was added to and received messages in.

    2. Set up message forwarding
       - Choose which source chat(s) are copied to which destination chat(s).
       - Optionally pick keywords, a signature and a blacklist.

    3. Edit profile
       - Change a saved profile (handy when you keep several source/destination sets).

    4. Help
       - This screen.

    5. Exit
       - Leave safely, with the option to remove stored credentials.

    Tips:
    - Make the bot an admin in the groups where it has to read and/or post.
    - Keywords only forward messages containing one of them.
    - The blacklist skips messages containing any of its words.
    - The signature is appended below every message.
";

pub enum Choice {
    ListChats,
    Forward,
    EditProfile,
    Help,
    Exit,
}

impl Choice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Choice::ListChats),
            "2" => Some(Choice::Forward),
            "3" => Some(Choice::EditProfile),
            "4" => Some(Choice::Help),
            "5" => Some(Choice::Exit),
            _ => None,
        }
    }
}

pub struct App {
    pub cfg: Config,
    pub profiles: ProfileStore,
    pub reader: Arc<dyn ChatReader>,
    pub sender: Arc<dyn ChatSender>,
}

impl App {
    /// Show the menu until the operator picks exit.
    pub async fn run(&self) {
        loop {
            let choice = match self.ask_choice() {
                Ok(c) => c,
                Err(e) => {
                    error!(error = %e, "could not read menu choice");
                    return;
                }
            };

            let outcome = match choice {
                Some(Choice::ListChats) => self.list_chats().await,
                Some(Choice::Forward) => self.forward().await,
                Some(Choice::EditProfile) => self.edit_profile(),
                Some(Choice::Help) => help(),
                Some(Choice::Exit) => return,
                None => {
                    println!("{}", ui::alert("Invalid choice. Try again.", Some("❌")));
                    Ok(())
                }
            };

            if let Err(e) = outcome {
                error!(error = %e, "menu action failed");
                println!(
                    "{}",
                    ui::alert(&format!("Unexpected error: {e}. Waiting a moment before retrying..."), None)
                );
                sleep(Duration::from_secs(2)).await;
            }
        }
    }

    fn ask_choice(&self) -> Result<Option<Choice>> {
        println!("\n{}", ui::main_text("What would you like to do?", Some("🕵️")));
        for (item, emoji) in [
            ("1. List chats", "📋"),
            ("2. Set up message forwarding", "⚙️"),
            ("3. Edit profile", "✏️"),
            ("4. Help", "❓"),
            ("5. Exit", "👋"),
        ] {
            println!("{} {emoji}", ui::prompt(item));
        }
        let raw: String = Input::new()
            .with_prompt(ui::prompt("Choose (1-5)"))
            .allow_empty(true)
            .interact_text()?;
        Ok(Choice::parse(&raw))
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.cfg.max_connect_retries,
            delay: self.cfg.connect_retry_delay,
        }
    }

    async fn list_chats(&self) -> Result<()> {
        ui::animated_transition("Fetching chats", Duration::from_millis(500)).await;
        let dialogs =
            export_chat_list(self.reader.as_ref(), self.retry_policy(), &self.cfg.chat_list_file)
                .await?;
        for d in &dialogs {
            println!("{}", ui::main_text(&format_dialog(d), None));
        }
        if dialogs.is_empty() {
            println!(
                "{}",
                ui::alert("No chats seen yet. Add the bot to a chat and post something first.", None)
            );
        }
        println!(
            "{}",
            ui::success(
                &format!("Chat list written to {}!", self.cfg.chat_list_file.display()),
                Some("🎉")
            )
        );
        Ok(())
    }

    async fn forward(&self) -> Result<()> {
        let names = self.profiles.names()?;
        let chosen = if !names.is_empty() && prompts::yes_no("Use a saved profile?", true)? {
            match prompts::pick_profile(&names, "Choose a profile")? {
                Some(name) => self.profiles.get(&name)?,
                None => None,
            }
        } else {
            None
        };

        let profile = match chosen {
            Some(p) => p,
            None => {
                let p = prompts::new_profile()?;
                prompts::offer_save(&self.profiles, &p)?;
                p
            }
        };

        let forwarder = Forwarder::new(
            self.reader.clone(),
            self.sender.clone(),
            ForwardPlan::from(&profile),
            ForwarderOptions::from(&self.cfg),
        );

        ui::animated_transition("Starting message forwarding", Duration::from_millis(500)).await;
        println!(
            "{}",
            ui::main_text(
                "Type 'exit' to stop forwarding and return to the main menu.",
                None
            )
        );

        let report = run_session(forwarder, stdin_lines()).await?;
        println!(
            "{}",
            ui::success(
                &format!(
                    "Forwarding stopped: {} forwarded, {} skipped, {} failed sends, {} failed downloads.",
                    report.totals.forwarded,
                    report.totals.skipped,
                    report.totals.failed_sends,
                    report.totals.failed_downloads
                ),
                Some("✅")
            )
        );
        Ok(())
    }

    fn edit_profile(&self) -> Result<()> {
        let names = self.profiles.names()?;
        let Some(name) = prompts::pick_profile(&names, "Profile to edit")? else {
            println!(
                "{}",
                ui::alert(
                    "No profiles found. Create one under 'Set up message forwarding' first.",
                    None
                )
            );
            return Ok(());
        };
        let Some(current) = self.profiles.get(&name)? else {
            println!("{}", ui::alert(&format!("Profile '{name}' not found."), None));
            return Ok(());
        };

        let updated = prompts::edit_profile(&name, &current)?;
        self.profiles.save(&name, &updated)?;
        println!("{}", ui::success(&format!("Profile '{name}' updated!"), Some("✅")));
        Ok(())
    }
}

fn help() -> Result<()> {
    println!("{}", ui::main_text(HELP, None));
    prompts::pause("Press Enter to return to the main menu")
}
