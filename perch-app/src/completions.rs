//! Shell-completion generation and installation.
//!
//! Scripts come from `clap_complete`; installation follows each shell's
//! conventions: fish and zsh get a dedicated completions file (zsh also
//! gets an fpath stanza in `.zshrc`, once), bash gets a marker-delimited
//! block in `.bashrc` that later installs replace in place.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{Cli, Shell};

const BASH_BEGIN: &str = "# >>> perch completions >>>";
const BASH_END: &str = "# <<< perch completions <<<";

pub fn completion_script(shell: Shell) -> String {
    let target = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
    };
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(target, &mut cmd, "perch", &mut buf);
    String::from_utf8(buf).expect("completion scripts are UTF-8")
}

pub fn detect_shell() -> Shell {
    let shell = std::env::var("SHELL").unwrap_or_default();
    match shell.rsplit('/').next().unwrap_or("") {
        "fish" => Shell::Fish,
        "zsh" => Shell::Zsh,
        _ => Shell::Bash,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SetupAction {
    Installed,
    AlreadyInstalled,
}

#[derive(Debug)]
pub struct SetupOutcome {
    pub shell: Shell,
    pub completion_path: PathBuf,
    pub action: SetupAction,
    pub reload_command: String,
}

pub fn install_completions(shell: Option<Shell>) -> Result<SetupOutcome> {
    let home = dirs::home_dir().context("could not determine the home directory")?;
    install_completions_in(&home, shell)
}

fn install_completions_in(home: &Path, shell: Option<Shell>) -> Result<SetupOutcome> {
    let shell = shell.unwrap_or_else(detect_shell);
    let script = completion_script(shell);

    match shell {
        Shell::Fish => {
            let dir = home.join(".config").join("fish").join("completions");
            let file = dir.join("perch.fish");
            let action = if file.exists() {
                SetupAction::AlreadyInstalled
            } else {
                SetupAction::Installed
            };
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            // Always write the latest script, even when already installed.
            fs::write(&file, script)
                .with_context(|| format!("failed to write {}", file.display()))?;
            Ok(SetupOutcome {
                shell,
                completion_path: file,
                action,
                reload_command: "source ~/.config/fish/completions/perch.fish".into(),
            })
        }
        Shell::Zsh => {
            let dir = home.join(".zsh").join("completions");
            let file = dir.join("_perch");
            let action = if file.exists() {
                SetupAction::AlreadyInstalled
            } else {
                SetupAction::Installed
            };
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            fs::write(&file, script)
                .with_context(|| format!("failed to write {}", file.display()))?;

            let zshrc = home.join(".zshrc");
            let configured = fs::read_to_string(&zshrc)
                .map(|content| content.contains(".zsh/completions"))
                .unwrap_or(false);
            if !configured {
                let stanza = "\n# perch completions\nfpath=(~/.zsh/completions $fpath)\nautoload -Uz compinit && compinit\n";
                append(&zshrc, stanza)?;
            }
            Ok(SetupOutcome {
                shell,
                completion_path: file,
                action,
                reload_command: "source ~/.zshrc".into(),
            })
        }
        Shell::Bash => {
            let bashrc = home.join(".bashrc");
            let block = format!("{BASH_BEGIN}\n{script}{BASH_END}");
            let existing = fs::read_to_string(&bashrc).unwrap_or_default();

            let action = if existing.contains(BASH_BEGIN) {
                let replaced = replace_marked_block(&existing, &block);
                fs::write(&bashrc, replaced)
                    .with_context(|| format!("failed to write {}", bashrc.display()))?;
                SetupAction::AlreadyInstalled
            } else {
                append(&bashrc, &format!("\n{block}\n"))?;
                SetupAction::Installed
            };
            Ok(SetupOutcome {
                shell,
                completion_path: bashrc,
                action,
                reload_command: "source ~/.bashrc".into(),
            })
        }
    }
}

fn append(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))
}

/// Replace the marker-delimited completion block, leaving everything around
/// it untouched. Falls back to appending when the end marker went missing.
fn replace_marked_block(content: &str, block: &str) -> String {
    let Some(start) = content.find(BASH_BEGIN) else {
        return format!("{content}\n{block}\n");
    };
    let after_start = &content[start..];
    let Some(end_rel) = after_start.find(BASH_END) else {
        return format!("{content}\n{block}\n");
    };
    let end = start + end_rel + BASH_END.len();
    format!("{}{}{}", &content[..start], block, &content[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scripts_mention_the_binary_and_commands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let script = completion_script(shell);
            assert!(script.contains("perch"), "{shell} script misses binary name");
            assert!(script.contains("tweet"), "{shell} script misses commands");
            assert!(script.contains("timeline"), "{shell} script misses commands");
        }
    }

    #[test]
    fn fish_install_writes_completion_file() {
        let home = TempDir::new().unwrap();
        let outcome = install_completions_in(home.path(), Some(Shell::Fish)).unwrap();
        assert_eq!(outcome.action, SetupAction::Installed);
        assert!(outcome.completion_path.ends_with(".config/fish/completions/perch.fish"));
        assert!(outcome.completion_path.exists());

        // A second run rewrites the script but reports it was present.
        let again = install_completions_in(home.path(), Some(Shell::Fish)).unwrap();
        assert_eq!(again.action, SetupAction::AlreadyInstalled);
    }

    #[test]
    fn zsh_install_adds_fpath_stanza_once() {
        let home = TempDir::new().unwrap();
        install_completions_in(home.path(), Some(Shell::Zsh)).unwrap();
        install_completions_in(home.path(), Some(Shell::Zsh)).unwrap();

        let zshrc = fs::read_to_string(home.path().join(".zshrc")).unwrap();
        assert_eq!(zshrc.matches("fpath=(~/.zsh/completions $fpath)").count(), 1);
        assert!(home.path().join(".zsh/completions/_perch").exists());
    }

    #[test]
    fn bash_install_appends_then_replaces_in_place() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(".bashrc"), "export FOO=1\n").unwrap();

        let first = install_completions_in(home.path(), Some(Shell::Bash)).unwrap();
        assert_eq!(first.action, SetupAction::Installed);

        let second = install_completions_in(home.path(), Some(Shell::Bash)).unwrap();
        assert_eq!(second.action, SetupAction::AlreadyInstalled);

        let bashrc = fs::read_to_string(home.path().join(".bashrc")).unwrap();
        assert!(bashrc.contains("export FOO=1"));
        assert_eq!(bashrc.matches(BASH_BEGIN).count(), 1);
        assert_eq!(bashrc.matches(BASH_END).count(), 1);
    }

    #[test]
    fn marked_block_replacement_preserves_surroundings() {
        let content = format!("before\n{BASH_BEGIN}\nold\n{BASH_END}\nafter\n");
        let replaced = replace_marked_block(&content, "NEW");
        assert_eq!(replaced, "before\nNEW\nafter\n");
    }
}
