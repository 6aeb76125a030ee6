//! Guest-session plumbing: the short-lived activation token and the
//! per-request transaction signature header.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;
use tokio::sync::Mutex;

use perch_http::{Auth, HttpClient, RequestOpts};

use crate::twitter::error::TwitterError;

/// Guest tokens are honoured upstream for a while; re-activating on every
/// request both slows things down and draws attention, so cache for an hour.
const GUEST_TOKEN_TTL: Duration = Duration::from_secs(3600);

const GUEST_ACTIVATE_URL: &str = "https://api.x.com/1.1/guest/activate.json";
const HOME_PAGE_URL: &str = "https://x.com/";

#[derive(Debug, Deserialize)]
struct GuestActivateResponse {
    guest_token: String,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// In-process cache for the guest session token (value + expiry).
///
/// One instance is owned by the client; the process is single-invocation,
/// so nothing else ever shares it and the mutex only serialises the
/// read-check-write against reentrancy on the same runtime.
#[derive(Debug)]
pub struct GuestTokenCache {
    slot: Mutex<Option<CachedToken>>,
    ttl: Duration,
}

impl Default for GuestTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestTokenCache {
    pub fn new() -> Self {
        Self::with_ttl(GUEST_TOKEN_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    /// The cached token, unless it has expired.
    pub async fn get(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.value.clone())
    }

    pub async fn store(&self, value: String) {
        *self.slot.lock().await = Some(CachedToken {
            value,
            expires_at: Instant::now() + self.ttl,
        });
    }
}

/// Activate a fresh guest session and return its token.
pub async fn fetch_guest_token(http: &HttpClient, bearer: &str) -> Result<String, TwitterError> {
    let resp: GuestActivateResponse = http
        .post_json(
            GUEST_ACTIVATE_URL,
            &serde_json::json!({}),
            RequestOpts {
                auth: Some(Auth::Bearer(bearer)),
                allow_absolute: true,
                ..Default::default()
            },
        )
        .await?;
    tracing::debug!("guest session activated");
    Ok(resp.guest_token)
}

static SITE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="twitter-site-verification"\s+content="([^"]+)""#)
        .expect("site verification pattern compiles")
});

/// Derives the per-request transaction header guest calls carry.
///
/// Key material comes from the site-verification meta tag on the platform
/// home page; each signature then mixes in the request method and path, the
/// clock, and a nonce, so no two requests share a value.
pub struct TransactionSigner {
    site_key: String,
}

impl TransactionSigner {
    /// Fetch the home page and pull out the signing key material. Pages
    /// without the meta tag still produce a signer (the signature is opaque
    /// to us either way).
    pub async fn prepare(http: &HttpClient) -> Result<Self, TwitterError> {
        let html = http
            .get_text(
                HOME_PAGE_URL,
                RequestOpts {
                    allow_absolute: true,
                    ..Default::default()
                },
            )
            .await?;
        let site_key = SITE_KEY
            .captures(&html)
            .map(|caps| caps[1].to_string())
            .unwrap_or_default();
        tracing::debug!(found_key = !site_key.is_empty(), "transaction signer prepared");
        Ok(Self { site_key })
    }

    #[cfg(test)]
    fn with_key(site_key: &str) -> Self {
        Self {
            site_key: site_key.to_string(),
        }
    }

    pub fn sign(&self, method: &str, path: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.site_key.as_bytes());
        hasher.update(method.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(&chrono::Utc::now().timestamp_millis().to_le_bytes());
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_token_is_reused() {
        let cache = GuestTokenCache::new();
        assert_eq!(cache.get().await, None);
        cache.store("tok".into()).await;
        assert_eq!(cache.get().await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn expired_token_is_discarded() {
        let cache = GuestTokenCache::with_ttl(Duration::ZERO);
        cache.store("tok".into()).await;
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn newer_token_replaces_older() {
        let cache = GuestTokenCache::new();
        cache.store("first".into()).await;
        cache.store("second".into()).await;
        assert_eq!(cache.get().await.as_deref(), Some("second"));
    }

    #[test]
    fn signatures_are_hex_and_unique() {
        let signer = TransactionSigner::with_key("key-material");
        let a = signer.sign("GET", "graphql/abc/TweetResultByRestId");
        let b = signer.sign("GET", "graphql/abc/TweetResultByRestId");
        assert_eq!(a.len(), 32);
        assert!(a.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn site_key_pattern_matches_meta_tag() {
        let html = r#"<html><head><meta name="twitter-site-verification" content="abc123XYZ"/></head></html>"#;
        let caps = SITE_KEY.captures(html).unwrap();
        assert_eq!(&caps[1], "abc123XYZ");
    }
}
