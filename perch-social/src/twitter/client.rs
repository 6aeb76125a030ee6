//! Request shaping for the platform's internal GraphQL endpoints, plus the
//! authenticated→guest fallback for tweet fetches.
//!
//! Operations are addressed by a versioned query id baked into the URL
//! path, with `variables`/`features`/`fieldToggles` JSON-encoded into query
//! parameters (or a JSON body for the latest-timeline POST variant). The
//! response envelope is always `{data?, errors?}` and a non-empty `errors`
//! array is a failure regardless of HTTP status.

use std::borrow::Cow;
use std::future::Future;

use serde_json::{json, Value};

use perch_config::{CredentialStore, StoredAuth};
use perch_http::header::{HeaderMap, HeaderValue};
use perch_http::{Auth, HttpClient, HttpError, RequestOpts};

use crate::twitter::error::TwitterError;
use crate::twitter::extract::{assemble_thread, assemble_timeline, extract_tweet};
use crate::twitter::guest::{fetch_guest_token, GuestTokenCache, TransactionSigner};
use crate::twitter::types::{HomeTimelinePage, Tweet, TweetThread};

const BASE_URL: &str = "https://x.com/i/api/";

// Public bearer token used by the platform's own web client.
const BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const TWEET_DETAIL_QUERY_ID: &str = "97JF30KziU00483E_8elBA";
const TWEET_BY_ID_QUERY_ID: &str = "GazOglcBvgLigl3ywt6b3Q";
const HOME_TIMELINE_QUERY_ID: &str = "HJFjzBgCs16TqxewQOeLNg";
const HOME_LATEST_TIMELINE_QUERY_ID: &str = "DiTkXJgLqBBxCs7zaYsbtA";

const DEFAULT_TIMELINE_COUNT: usize = 20;

/// Feature flags the web client sends with every GraphQL call. The server
/// rejects requests that omit flags it expects, so the whole observed set
/// is carried even though most of them do not affect what we read.
fn feature_flags() -> Value {
    json!({
        "rweb_video_screen_enabled": false,
        "profile_label_improvements_pcf_label_in_post_enabled": true,
        "responsive_web_profile_redirect_enabled": false,
        "rweb_tipjar_consumption_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "premium_content_api_read_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "responsive_web_grok_analyze_button_fetch_trends_enabled": false,
        "responsive_web_grok_analyze_post_followups_enabled": true,
        "responsive_web_jetfuel_frame": true,
        "responsive_web_grok_share_attachment_enabled": true,
        "articles_preview_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "responsive_web_grok_show_grok_translated_post": false,
        "responsive_web_grok_analysis_button_from_backend": true,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_grok_image_annotation_enabled": true,
        "responsive_web_grok_imagine_annotation_enabled": true,
        "responsive_web_grok_community_note_auto_translation_is_enabled": false,
        "responsive_web_enhance_cards_enabled": false,
    })
}

fn field_toggles() -> Value {
    json!({
        "withArticleRichContentState": true,
        "withArticlePlainText": false,
        "withGrokAnalyze": false,
        "withDisallowedReplyControls": false,
    })
}

fn cookie_header(auth: &StoredAuth) -> String {
    format!("auth_token={}; ct0={}", auth.auth_token, auth.csrf_token)
}

fn header_value(value: &str) -> Result<HeaderValue, TwitterError> {
    HeaderValue::from_str(value)
        .map_err(|e| TwitterError::Transport(HttpError::Build(e.to_string())))
}

/// Headers the web client sends on cookie-authenticated API calls.
fn authed_headers(auth: &StoredAuth) -> Result<HeaderMap, TwitterError> {
    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("*/*"));
    headers.insert(
        "accept-language",
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("cookie", header_value(&cookie_header(auth))?);
    headers.insert("x-csrf-token", header_value(&auth.csrf_token)?);
    headers.insert("x-twitter-active-user", HeaderValue::from_static("yes"));
    headers.insert(
        "x-twitter-auth-type",
        HeaderValue::from_static("OAuth2Session"),
    );
    headers.insert(
        "x-twitter-client-language",
        HeaderValue::from_static("en"),
    );
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    Ok(headers)
}

fn guest_headers(guest_token: &str, transaction_id: &str) -> Result<HeaderMap, TwitterError> {
    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("*/*"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("x-guest-token", header_value(guest_token)?);
    headers.insert("x-client-transaction-id", header_value(transaction_id)?);
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    Ok(headers)
}

/// A non-empty `errors` array in the envelope is a failure no matter what
/// the HTTP layer said.
fn check_envelope(payload: &Value) -> Result<(), TwitterError> {
    if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            return Err(TwitterError::Upstream(
                Value::Array(errors.clone()).to_string(),
            ));
        }
    }
    Ok(())
}

/// Options for one home-timeline page request.
#[derive(Debug, Clone, Default)]
pub struct TimelineOptions {
    pub count: Option<usize>,
    pub cursor: Option<String>,
    /// Use the chronological "latest" variant instead of the ranked feed.
    pub latest: bool,
}

pub struct TwitterApi {
    http: HttpClient,
    guest_tokens: GuestTokenCache,
}

impl TwitterApi {
    pub fn new() -> Result<Self, TwitterError> {
        Ok(Self {
            http: HttpClient::new(BASE_URL)?,
            guest_tokens: GuestTokenCache::new(),
        })
    }

    /// Fetch the full thread around `tweet_id`, falling back to a guest
    /// single-tweet fetch when stored credentials turn out to be dead.
    pub async fn fetch_thread(
        &self,
        tweet_id: &str,
        store: &CredentialStore,
    ) -> Result<TweetThread, TwitterError> {
        run_thread_fetch(
            store.load()?,
            || store.clear().map_err(TwitterError::from),
            |auth| async move { self.tweet_detail(tweet_id, &auth).await },
            || self.tweet_by_rest_id(tweet_id),
        )
        .await
    }

    /// Authenticated full-thread detail request.
    pub async fn tweet_detail(
        &self,
        tweet_id: &str,
        auth: &StoredAuth,
    ) -> Result<TweetThread, TwitterError> {
        let variables = json!({
            "focalTweetId": tweet_id,
            "with_rux_injections": false,
            "rankingMode": "Relevance",
            "includePromotedContent": false,
            "withCommunity": true,
            "withQuickPromoteEligibilityTweetFields": true,
            "withBirdwatchNotes": true,
            "withVoice": true,
        });
        let path = format!("graphql/{}/TweetDetail", TWEET_DETAIL_QUERY_ID);

        tracing::debug!(%tweet_id, "fetching tweet detail (authenticated)");
        let payload: Value = self
            .http
            .get_json(
                &path,
                RequestOpts {
                    auth: Some(Auth::Bearer(BEARER_TOKEN)),
                    headers: Some(authed_headers(auth)?),
                    query: Some(vec![
                        ("variables", Cow::Owned(variables.to_string())),
                        ("features", Cow::Owned(feature_flags().to_string())),
                        ("fieldToggles", Cow::Owned(field_toggles().to_string())),
                    ]),
                    ..Default::default()
                },
            )
            .await?;

        check_envelope(&payload)?;
        assemble_thread(&payload, tweet_id)
    }

    /// Guest single-tweet request: no replies, no ancestors. Requires a
    /// session token and a per-request transaction signature; the two
    /// preparations are independent fetches and run concurrently.
    pub async fn tweet_by_rest_id(&self, tweet_id: &str) -> Result<Tweet, TwitterError> {
        let path = format!("graphql/{}/TweetResultByRestId", TWEET_BY_ID_QUERY_ID);

        let (guest_token, signer) =
            tokio::try_join!(self.guest_token(), TransactionSigner::prepare(&self.http))?;
        let transaction_id = signer.sign("GET", &path);

        let variables = json!({
            "tweetId": tweet_id,
            "withCommunity": false,
            "includePromotedContent": false,
            "withVoice": false,
        });

        tracing::debug!(%tweet_id, "fetching single tweet (guest)");
        let payload: Value = self
            .http
            .get_json(
                &path,
                RequestOpts {
                    auth: Some(Auth::Bearer(BEARER_TOKEN)),
                    headers: Some(guest_headers(&guest_token, &transaction_id)?),
                    query: Some(vec![
                        ("variables", Cow::Owned(variables.to_string())),
                        ("features", Cow::Owned(feature_flags().to_string())),
                        ("fieldToggles", Cow::Owned(field_toggles().to_string())),
                    ]),
                    ..Default::default()
                },
            )
            .await?;

        check_envelope(&payload)?;
        extract_tweet(payload.pointer("/data/tweetResult/result"))
            .ok_or(TwitterError::GuestTweetUnavailable)
    }

    /// One page of the home timeline. Requires stored credentials; there is
    /// no guest variant of this feed.
    pub async fn home_timeline(
        &self,
        opts: &TimelineOptions,
        store: &CredentialStore,
    ) -> Result<HomeTimelinePage, TwitterError> {
        let Some(auth) = store.load()? else {
            return Err(TwitterError::MissingCredentials(
                perch_config::login_instructions(store.dir()),
            ));
        };

        let count = opts.count.unwrap_or(DEFAULT_TIMELINE_COUNT);
        let mut variables = json!({
            "count": count,
            "includePromotedContent": true,
            "latestControlAvailable": true,
            "withCommunity": true,
        });
        if let Some(cursor) = &opts.cursor {
            variables["cursor"] = json!(cursor);
        }

        let payload: Value = if opts.latest {
            // The chronological variant posts its parameters as a body.
            let path = format!("graphql/{}/HomeLatestTimeline", HOME_LATEST_TIMELINE_QUERY_ID);
            tracing::debug!(count, latest = true, "fetching home timeline");
            self.http
                .post_json(
                    &path,
                    &json!({
                        "variables": variables,
                        "features": feature_flags(),
                        "queryId": HOME_LATEST_TIMELINE_QUERY_ID,
                    }),
                    RequestOpts {
                        auth: Some(Auth::Bearer(BEARER_TOKEN)),
                        headers: Some(authed_headers(&auth)?),
                        ..Default::default()
                    },
                )
                .await?
        } else {
            let path = format!("graphql/{}/HomeTimeline", HOME_TIMELINE_QUERY_ID);
            tracing::debug!(count, latest = false, "fetching home timeline");
            self.http
                .get_json(
                    &path,
                    RequestOpts {
                        auth: Some(Auth::Bearer(BEARER_TOKEN)),
                        headers: Some(authed_headers(&auth)?),
                        query: Some(vec![
                            ("variables", Cow::Owned(variables.to_string())),
                            ("features", Cow::Owned(feature_flags().to_string())),
                        ]),
                        ..Default::default()
                    },
                )
                .await?
        };

        check_envelope(&payload)?;
        Ok(assemble_timeline(&payload, Some(count)))
    }

    async fn guest_token(&self) -> Result<String, TwitterError> {
        if let Some(token) = self.guest_tokens.get().await {
            return Ok(token);
        }
        let token = fetch_guest_token(&self.http, BEARER_TOKEN).await?;
        self.guest_tokens.store(token.clone()).await;
        Ok(token)
    }
}

/// The authenticated→guest state machine, generic over its two fetch legs
/// so the transitions are testable without a network.
///
/// Authenticated leg failures of the auth class (401/403, or an
/// empty-result thread) clear the stored credentials and demote to guest;
/// anything else is fatal. The guest leg is the last resort: its result is
/// wrapped as a context-free thread and its failures surface unchanged.
async fn run_thread_fetch<C, D, DF, G, GF>(
    stored: Option<StoredAuth>,
    clear: C,
    detail: D,
    guest: G,
) -> Result<TweetThread, TwitterError>
where
    C: FnOnce() -> Result<(), TwitterError>,
    D: FnOnce(StoredAuth) -> DF,
    DF: Future<Output = Result<TweetThread, TwitterError>>,
    G: FnOnce() -> GF,
    GF: Future<Output = Result<Tweet, TwitterError>>,
{
    if let Some(auth) = stored {
        match detail(auth).await {
            Ok(thread) => return Ok(thread),
            Err(err) if err.triggers_guest_fallback() => {
                tracing::warn!(%err, "authenticated fetch failed; clearing credentials and retrying as guest");
                clear()?;
            }
            Err(err) => return Err(err),
        }
    }

    let main_tweet = guest().await?;
    Ok(TweetThread::solitary(main_tweet))
}
