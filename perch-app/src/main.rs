//! perch: read X/Twitter threads and timelines from your terminal.

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;

use perch_common::observability::{init_logging, LogConfig};
use perch_config::CredentialStore;
use perch_social::twitter::{resolve_tweet_id, TimelineOptions, TwitterApi};

mod cli;
mod completions;
mod format;

use cli::{Cli, Command};
use completions::SetupAction;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig::default())?;

    match cli.command {
        Command::Tweet { target, pretty } => {
            let tweet_id = resolve_tweet_id(&target)?;
            let store = CredentialStore::new()?;
            let api = TwitterApi::new()?;
            let thread = api.fetch_thread(&tweet_id, &store).await?;
            if pretty {
                println!("{}", format::thread_pretty(&thread));
            } else {
                println!("{}", format::to_json(&thread, use_color()));
            }
        }
        Command::Timeline {
            count,
            cursor,
            latest,
            pretty,
        } => {
            let store = CredentialStore::new()?;
            let api = TwitterApi::new()?;
            let opts = TimelineOptions {
                count: Some(count),
                cursor,
                latest,
            };
            let page = api.home_timeline(&opts, &store).await?;
            if pretty {
                println!("{}", format::timeline_pretty(&page));
            } else {
                println!("{}", format::to_json(&page, use_color()));
            }
        }
        Command::Whoami => {
            let store = CredentialStore::new()?;
            match store.load()? {
                Some(auth) => match (auth.username, auth.user_id) {
                    (Some(username), Some(id)) => println!("@{username} (id {id})"),
                    (Some(username), None) => println!("@{username}"),
                    (None, Some(id)) => println!("user id {id}"),
                    (None, None) => println!("logged in (identity unknown)"),
                },
                None => println!("not logged in"),
            }
        }
        Command::Logout => {
            let store = CredentialStore::new()?;
            store.clear()?;
            println!("Logged out; stored credentials removed.");
        }
        Command::Completion { shell } => {
            print!("{}", completions::completion_script(shell));
        }
        Command::Setup { shell } => {
            let outcome = completions::install_completions(shell)?;
            match outcome.action {
                SetupAction::AlreadyInstalled => println!(
                    "Completions for {} already installed at {}",
                    outcome.shell,
                    outcome.completion_path.display()
                ),
                SetupAction::Installed => {
                    println!(
                        "Installed {} completions to {}",
                        outcome.shell,
                        outcome.completion_path.display()
                    );
                    println!(
                        "\nTo activate, run:\n  {}\n\nOr restart your terminal.",
                        outcome.reload_command
                    );
                }
            }
        }
    }

    Ok(())
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}
