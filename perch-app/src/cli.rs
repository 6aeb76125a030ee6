//! Command-line surface.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "perch",
    version,
    about = "Read X/Twitter threads and timelines from your terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// View a tweet and its replies
    Tweet {
        /// Tweet URL or ID
        target: String,
        /// Pretty print output with colors
        #[arg(short, long)]
        pretty: bool,
    },
    /// Show a page of your home timeline (requires credentials)
    Timeline {
        /// Number of tweets to fetch
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
        /// Resume from a pagination cursor printed by a previous page
        #[arg(long)]
        cursor: Option<String>,
        /// Chronological "latest" feed instead of the ranked one
        #[arg(long)]
        latest: bool,
        /// Pretty print output with colors
        #[arg(short, long)]
        pretty: bool,
    },
    /// Show the currently stored identity
    Whoami,
    /// Log out and clear stored credentials
    Logout,
    /// Output a shell completion script
    Completion {
        /// Shell type
        #[arg(value_enum, default_value_t = Shell::Bash)]
        shell: Shell,
    },
    /// Install shell completions (auto-detects your shell)
    Setup {
        /// Override shell detection
        #[arg(short, long, value_enum)]
        shell: Option<Shell>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        };
        f.write_str(name)
    }
}
