//! Credential storage for the perch CLI.
//!
//! Credentials are a cookie-equivalent token pair (`auth_token` + the csrf
//! `ct0` value) persisted as JSON under the user config directory. Earlier
//! releases stored them as a `cookies.txt` key=value file; [`CredentialStore::load`]
//! migrates that format once and renames the old file away so migration
//! never repeats. A missing file means "not logged in", not an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const AUTH_FILE: &str = "auth.json";
const LEGACY_COOKIES_FILE: &str = "cookies.txt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine a config directory for this platform")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed credential file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Stored authenticated identity: the session cookie pair plus optional
/// bookkeeping captured at login time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAuth {
    pub auth_token: String,
    pub csrf_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl StoredAuth {
    pub fn new(auth_token: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            csrf_token: csrf_token.into(),
            user_id: None,
            username: None,
            created_at: None,
        }
    }
}

/// File-backed credential store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Store rooted at the per-user config directory
    /// (`$PERCH_CONFIG_DIR`, else `<config dir>/perch`).
    pub fn new() -> Result<Self, StoreError> {
        if let Ok(dir) = std::env::var("PERCH_CONFIG_DIR") {
            return Ok(Self::with_dir(dir));
        }
        let base = dirs::config_dir().ok_or(StoreError::NoConfigDir)?;
        Ok(Self::with_dir(base.join("perch")))
    }

    /// Store rooted at an explicit directory. Tests use this to avoid
    /// touching the real home directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn auth_path(&self) -> PathBuf {
        self.dir.join(AUTH_FILE)
    }

    fn legacy_cookies_path(&self) -> PathBuf {
        self.dir.join(LEGACY_COOKIES_FILE)
    }

    /// Load stored credentials, if any.
    ///
    /// Falls back to migrating the legacy `cookies.txt` format when the JSON
    /// file is absent. Returns `Ok(None)` when neither exists.
    pub fn load(&self) -> Result<Option<StoredAuth>, StoreError> {
        let path = self.auth_path();
        match fs::read_to_string(&path) {
            Ok(content) => {
                let auth = serde_json::from_str(&content)
                    .map_err(|source| StoreError::Malformed { path, source })?;
                Ok(Some(auth))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.migrate_from_cookies_file()
            }
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    /// Persist credentials, creating the config directory when needed.
    pub fn save(&self, auth: &StoredAuth) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.auth_path();
        let json = serde_json::to_string_pretty(auth).expect("StoredAuth serializes");
        fs::write(&path, json).map_err(|source| StoreError::Write { path, source })
    }

    /// Remove stored credentials. Removing nothing is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        let path = self.auth_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write { path, source }),
        }
    }

    fn migrate_from_cookies_file(&self) -> Result<Option<StoredAuth>, StoreError> {
        let legacy = self.legacy_cookies_path();
        let content = match fs::read_to_string(&legacy) {
            Ok(content) => content,
            Err(_) => return Ok(None),
        };

        let mut auth_token = None;
        let mut csrf_token = None;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                match key.trim() {
                    "auth_token" => auth_token = Some(value.trim().to_string()),
                    "ct0" => csrf_token = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        let (Some(auth_token), Some(csrf_token)) = (auth_token, csrf_token) else {
            return Ok(None);
        };

        let auth = StoredAuth {
            auth_token,
            csrf_token,
            user_id: None,
            username: None,
            created_at: Some(chrono::Utc::now().timestamp()),
        };
        self.save(&auth)?;

        // Rename the old file so we never migrate twice.
        let migrated = legacy.with_extension("txt.migrated");
        if let Err(err) = fs::rename(&legacy, &migrated) {
            tracing::warn!(path=%legacy.display(), %err, "could not rename legacy cookie file");
        }

        tracing::info!(path=%self.auth_path().display(), "migrated legacy cookies.txt credentials");
        Ok(Some(auth))
    }
}

/// Instructions shown when a command needs credentials and none are stored.
pub fn login_instructions(store_dir: &Path) -> String {
    let auth = store_dir.join(AUTH_FILE);
    format!(
        "No stored credentials found at {}\n\n\
         To authenticate, create this file with your session cookies:\n\
         {{\n  \"authToken\": \"YOUR_AUTH_TOKEN\",\n  \"csrfToken\": \"YOUR_CT0_TOKEN\"\n}}\n\n\
         To get these values:\n\
         1. Open x.com in your browser\n\
         2. Open DevTools > Application > Cookies\n\
         3. Copy the values for \"auth_token\" and \"ct0\"",
        auth.display()
    )
}

impl CredentialStore {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
