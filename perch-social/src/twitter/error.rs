//! Error taxonomy for the Twitter client.

use perch_config::StoreError;
use perch_http::{HttpError, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error(
        "invalid tweet ID or URL: \"{input}\"\n\
         Expected a tweet ID (e.g., \"1234567890\") or URL (e.g., \"https://x.com/user/status/1234567890\")"
    )]
    InvalidIdentifier { input: String },

    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("API returned errors: {0}")]
    Upstream(String),

    #[error("could not find the requested tweet")]
    TweetNotFound,

    #[error("the tweet entry came back empty; stored credentials have likely expired")]
    AuthLikelyExpired,

    #[error("tweet is unavailable in guest mode")]
    GuestTweetUnavailable,

    #[error("{0}")]
    MissingCredentials(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TwitterError {
    /// Failures that demote an authenticated detail fetch to guest mode:
    /// an auth-class HTTP status, or a focal entry that parsed but came
    /// back structurally empty.
    pub fn triggers_guest_fallback(&self) -> bool {
        match self {
            TwitterError::AuthLikelyExpired => true,
            TwitterError::Transport(err) => matches!(
                err.status(),
                Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
            ),
            _ => false,
        }
    }
}
