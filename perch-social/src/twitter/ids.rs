//! Tweet identifier resolution.

use std::sync::LazyLock;

use regex::Regex;

use crate::twitter::error::TwitterError;

static STATUS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:twitter\.com|x\.com)/\w+/status/(\d+)").expect("status URL pattern compiles")
});

/// Extract the canonical numeric tweet id from a raw id string or a status
/// URL on either supported hostname (`www.` prefixes and trailing query
/// strings are fine).
pub fn resolve_tweet_id(input: &str) -> Result<String, TwitterError> {
    if let Some(caps) = STATUS_URL.captures(input) {
        return Ok(caps[1].to_string());
    }

    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(input.to_string());
    }

    Err(TwitterError::InvalidIdentifier {
        input: input.to_string(),
    })
}
