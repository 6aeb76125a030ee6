//! Payload normalization: raw GraphQL JSON into the domain model.
//!
//! The upstream shape is undocumented and drifts, so everything here is
//! deliberately defensive: the payload is treated as an untyped tree and
//! every field is read through optional access with a default. Only two
//! conditions are fatal for a single tweet node (no legacy block, no
//! resolvable author); everything else degrades per-field.

use serde_json::Value;
use std::collections::HashMap;

use crate::twitter::error::TwitterError;
use crate::twitter::types::{HomeTimelinePage, Tweet, TweetAuthor, TweetMetrics, TweetThread};

const TOMBSTONE: &str = "TweetTombstone";
const VISIBILITY_WRAPPER: &str = "TweetWithVisibilityResults";

/// Cursor candidates shorter than this are ignored; real pagination tokens
/// are long opaque strings, while short values at the same locations are
/// unrelated labels.
const MIN_CURSOR_LEN: usize = 10;

fn type_name(node: &Value) -> Option<&str> {
    node.get("__typename").and_then(Value::as_str)
}

fn string_at(node: &Value, pointer: &str) -> String {
    node.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn first_string(candidates: &[Option<&Value>]) -> String {
    candidates
        .iter()
        .copied()
        .flatten()
        .find_map(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn count_at(node: &Value, pointer: &str) -> u64 {
    node.pointer(pointer).and_then(Value::as_u64).unwrap_or(0)
}

/// Normalize one raw "tweet result" node into a [`Tweet`].
///
/// Returns `None` for absent nodes, tombstones, and nodes that lack a
/// legacy block or a resolvable author. Visibility-filter wrappers are
/// unwrapped one level first (the wrapper itself carries no author data).
pub fn extract_tweet(result: Option<&Value>) -> Option<Tweet> {
    let result = result?;
    if type_name(result) == Some(TOMBSTONE) {
        return None;
    }

    let tweet = if type_name(result) == Some(VISIBILITY_WRAPPER) {
        result.get("tweet")?
    } else {
        result
    };

    let legacy = tweet.get("legacy").filter(|l| l.is_object())?;
    let user = tweet.pointer("/core/user_results/result")?;
    let user_core = user.get("core");
    let user_legacy = user.get("legacy");

    let views = match tweet.pointer("/views/count") {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    };

    let in_reply_to_tweet_id = legacy
        .get("in_reply_to_status_id_str")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Tweet {
        id: string_at(tweet, "/rest_id"),
        text: string_at(legacy, "/full_text"),
        created_at: string_at(legacy, "/created_at"),
        author: TweetAuthor {
            id: string_at(user, "/rest_id"),
            name: first_string(&[
                user_core.and_then(|c| c.get("name")),
                user_legacy.and_then(|l| l.get("name")),
            ]),
            username: first_string(&[
                user_core.and_then(|c| c.get("screen_name")),
                user_legacy.and_then(|l| l.get("screen_name")),
            ]),
            profile_image_url: first_string(&[
                user.pointer("/avatar/image_url"),
                user_legacy.and_then(|l| l.get("profile_image_url_https")),
            ]),
        },
        metrics: TweetMetrics {
            likes: count_at(legacy, "/favorite_count"),
            retweets: count_at(legacy, "/retweet_count"),
            replies: count_at(legacy, "/reply_count"),
            quotes: count_at(legacy, "/quote_count"),
            views,
            bookmarks: count_at(legacy, "/bookmark_count"),
        },
        is_reply: in_reply_to_tweet_id.is_some(),
        in_reply_to_tweet_id,
    })
}

/// Flatten every `TimelineAddEntries` instruction into one ordered entry
/// list; other instruction kinds are ignored entirely.
fn flatten_add_entries(instructions: Option<&Value>) -> Vec<&Value> {
    let mut entries = Vec::new();
    for instruction in instructions.and_then(Value::as_array).into_iter().flatten() {
        if instruction.get("type").and_then(Value::as_str) == Some("TimelineAddEntries") {
            if let Some(list) = instruction.get("entries").and_then(Value::as_array) {
                entries.extend(list.iter());
            }
        }
    }
    entries
}

fn entry_id<'a>(entry: &'a Value) -> &'a str {
    entry.get("entryId").and_then(Value::as_str).unwrap_or("")
}

/// Assemble a tweet-detail payload into a [`TweetThread`] centred on
/// `focal_id`.
///
/// Entries before the focal tweet are its ancestors; entries after it and
/// conversation-module items are replies. A focal entry whose raw result
/// object is present but empty distinguishes "you need to log in" from a
/// genuinely missing tweet.
pub fn assemble_thread(payload: &Value, focal_id: &str) -> Result<TweetThread, TwitterError> {
    let instructions = payload.pointer("/data/threaded_conversation_with_injections_v2/instructions");
    let entries = flatten_add_entries(instructions);

    let mut main_tweet: Option<Tweet> = None;
    let mut parent_tweets = Vec::new();
    let mut replies = Vec::new();
    let mut saw_empty_result = false;

    for entry in &entries {
        let id = entry_id(entry);
        if id.starts_with("tweet-") {
            let result = entry.pointer("/content/itemContent/tweet_results/result");
            match extract_tweet(result) {
                Some(tweet) => {
                    if tweet.id == focal_id {
                        // First match wins; a duplicate focal entry later in
                        // the list is dropped entirely.
                        if main_tweet.is_none() {
                            main_tweet = Some(tweet);
                        }
                    } else if main_tweet.is_none() {
                        parent_tweets.push(tweet);
                    } else {
                        replies.push(tweet);
                    }
                }
                None => {
                    if result.and_then(Value::as_object).is_some_and(|m| m.is_empty()) {
                        saw_empty_result = true;
                    }
                }
            }
        } else if id.starts_with("conversationthread-") {
            let items = entry.pointer("/content/items").and_then(Value::as_array);
            for item in items.into_iter().flatten() {
                let result = item.pointer("/item/itemContent/tweet_results/result");
                if let Some(tweet) = extract_tweet(result) {
                    if tweet.id != focal_id {
                        replies.push(tweet);
                    }
                }
            }
        }
    }

    match main_tweet {
        Some(main_tweet) => Ok(TweetThread {
            main_tweet,
            parent_tweets,
            replies,
        }),
        None if saw_empty_result => Err(TwitterError::AuthLikelyExpired),
        None => Err(TwitterError::TweetNotFound),
    }
}

/// Assemble a home-timeline payload into an ordered, deduplicated page.
///
/// Never fails: a malformed payload degrades to an empty page. Collection
/// stops once `requested_count` tweets are gathered, but the cursor search
/// always runs over the full entry list.
pub fn assemble_timeline(payload: &Value, requested_count: Option<usize>) -> HomeTimelinePage {
    let instructions = payload.pointer("/data/home/home_timeline_urt/instructions");
    let entries = flatten_add_entries(instructions);

    let mut collected = Vec::new();
    for entry in &entries {
        if requested_count.is_some_and(|n| collected.len() >= n) {
            break;
        }
        let id = entry_id(entry);
        if id.starts_with("tweet-") || id.starts_with("promoted-tweet") {
            let result = entry.pointer("/content/itemContent/tweet_results/result");
            if let Some(tweet) = extract_tweet(result) {
                collected.push(tweet);
            }
        }
    }

    HomeTimelinePage {
        tweets: dedupe_by_id(collected),
        cursor: find_cursor(&entries),
    }
}

/// Locate the pagination cursor: the first entry (in order) exposing a
/// string longer than [`MIN_CURSOR_LEN`] at one of the three locations the
/// upstream has been observed to use.
fn find_cursor(entries: &[&Value]) -> Option<String> {
    for entry in entries {
        let Some(content) = entry.get("content") else {
            continue;
        };
        let candidates = [
            content.get("value"),
            content.pointer("/itemContent/value"),
            content
                .pointer("/operation/cursor")
                .filter(|c| c.get("cursorType").is_some())
                .and_then(|c| c.get("value")),
        ];
        for candidate in candidates {
            if let Some(token) = candidate.and_then(Value::as_str) {
                if token.len() > MIN_CURSOR_LEN {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

/// Collapse duplicate ids: the last occurrence's data wins, kept at the
/// first occurrence's position. For the expected case (no duplicates) this
/// is the identity.
fn dedupe_by_id(tweets: Vec<Tweet>) -> Vec<Tweet> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Tweet> = Vec::new();
    for tweet in tweets {
        match index.get(&tweet.id) {
            Some(&slot) => out[slot] = tweet,
            None => {
                index.insert(tweet.id.clone(), out.len());
                out.push(tweet);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_tweet(id: &str, text: &str) -> Value {
        json!({
            "rest_id": id,
            "legacy": {
                "full_text": text,
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "favorite_count": 12,
                "retweet_count": 3,
                "reply_count": 4,
                "quote_count": 1,
                "bookmark_count": 2,
            },
            "views": { "count": "567" },
            "core": {
                "user_results": {
                    "result": {
                        "rest_id": "42",
                        "core": { "name": "Alice", "screen_name": "alice" },
                        "legacy": {
                            "name": "Old Alice",
                            "screen_name": "old_alice",
                            "profile_image_url_https": "https://img.example/alice.jpg"
                        }
                    }
                }
            }
        })
    }

    fn tweet_entry(entry_id: &str, result: Value) -> Value {
        json!({
            "entryId": entry_id,
            "content": { "itemContent": { "tweet_results": { "result": result } } }
        })
    }

    fn detail_payload(entries: Vec<Value>) -> Value {
        json!({
            "data": {
                "threaded_conversation_with_injections_v2": {
                    "instructions": [
                        { "type": "TimelineAddEntries", "entries": entries }
                    ]
                }
            }
        })
    }

    fn timeline_payload(entries: Vec<Value>) -> Value {
        json!({
            "data": {
                "home": {
                    "home_timeline_urt": {
                        "instructions": [
                            { "type": "TimelineAddEntries", "entries": entries }
                        ]
                    }
                }
            }
        })
    }

    // ---- extract_tweet ----

    #[test]
    fn extracts_a_full_tweet() {
        let raw = raw_tweet("100", "hello");
        let tweet = extract_tweet(Some(&raw)).unwrap();
        assert_eq!(tweet.id, "100");
        assert_eq!(tweet.text, "hello");
        assert_eq!(tweet.author.id, "42");
        assert_eq!(tweet.author.name, "Alice");
        assert_eq!(tweet.author.username, "alice");
        assert_eq!(
            tweet.author.profile_image_url,
            "https://img.example/alice.jpg"
        );
        assert_eq!(tweet.metrics.likes, 12);
        assert_eq!(tweet.metrics.views, 567);
        assert!(!tweet.is_reply);
    }

    #[test]
    fn absent_node_yields_none() {
        assert!(extract_tweet(None).is_none());
    }

    #[test]
    fn tombstone_yields_none() {
        let raw = json!({ "__typename": "TweetTombstone" });
        assert!(extract_tweet(Some(&raw)).is_none());
    }

    #[test]
    fn visibility_wrapper_is_unwrapped() {
        let raw = json!({
            "__typename": "TweetWithVisibilityResults",
            "tweet": raw_tweet("200", "wrapped"),
        });
        let tweet = extract_tweet(Some(&raw)).unwrap();
        assert_eq!(tweet.id, "200");
        assert_eq!(tweet.text, "wrapped");
    }

    #[test]
    fn missing_legacy_block_yields_none() {
        let mut raw = raw_tweet("100", "hello");
        raw.as_object_mut().unwrap().remove("legacy");
        assert!(extract_tweet(Some(&raw)).is_none());
    }

    #[test]
    fn missing_author_yields_none() {
        let mut raw = raw_tweet("100", "hello");
        raw.as_object_mut().unwrap().remove("core");
        assert!(extract_tweet(Some(&raw)).is_none());
    }

    #[test]
    fn metrics_default_to_zero_when_absent() {
        let raw = json!({
            "rest_id": "1",
            "legacy": { "full_text": "bare" },
            "core": { "user_results": { "result": { "rest_id": "9" } } }
        });
        let tweet = extract_tweet(Some(&raw)).unwrap();
        assert_eq!(tweet.metrics, TweetMetrics::default());
        assert_eq!(tweet.author.name, "");
        assert_eq!(tweet.author.username, "");
        assert_eq!(tweet.author.profile_image_url, "");
    }

    #[test]
    fn garbage_view_count_defaults_to_zero() {
        let mut raw = raw_tweet("1", "x");
        raw["views"]["count"] = json!("not-a-number");
        assert_eq!(extract_tweet(Some(&raw)).unwrap().metrics.views, 0);
    }

    #[test]
    fn author_falls_back_to_legacy_block() {
        let mut raw = raw_tweet("1", "x");
        raw["core"]["user_results"]["result"]
            .as_object_mut()
            .unwrap()
            .remove("core");
        let tweet = extract_tweet(Some(&raw)).unwrap();
        assert_eq!(tweet.author.name, "Old Alice");
        assert_eq!(tweet.author.username, "old_alice");
    }

    #[test]
    fn reply_target_is_carried_verbatim() {
        let mut raw = raw_tweet("1", "x");
        raw["legacy"]["in_reply_to_status_id_str"] = json!("777");
        let tweet = extract_tweet(Some(&raw)).unwrap();
        assert!(tweet.is_reply);
        assert_eq!(tweet.in_reply_to_tweet_id.as_deref(), Some("777"));
    }

    // ---- assemble_thread ----

    #[test]
    fn focal_only_payload_has_no_context() {
        let payload = detail_payload(vec![tweet_entry("tweet-1", raw_tweet("1", "main"))]);
        let thread = assemble_thread(&payload, "1").unwrap();
        assert_eq!(thread.main_tweet.id, "1");
        assert!(thread.parent_tweets.is_empty());
        assert!(thread.replies.is_empty());
    }

    #[test]
    fn entries_split_around_the_focal_tweet() {
        let payload = detail_payload(vec![
            tweet_entry("tweet-1", raw_tweet("1", "grandparent")),
            tweet_entry("tweet-2", raw_tweet("2", "parent")),
            tweet_entry("tweet-3", raw_tweet("3", "main")),
            tweet_entry("tweet-4", raw_tweet("4", "reply")),
        ]);
        let thread = assemble_thread(&payload, "3").unwrap();
        assert_eq!(thread.main_tweet.id, "3");
        let parents: Vec<_> = thread.parent_tweets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(parents, ["1", "2"]);
        let replies: Vec<_> = thread.replies.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(replies, ["4"]);
    }

    #[test]
    fn conversation_modules_feed_replies() {
        let module = json!({
            "entryId": "conversationthread-9",
            "content": {
                "items": [
                    { "item": { "itemContent": { "tweet_results": { "result": raw_tweet("5", "nested reply") } } } },
                    { "item": { "itemContent": { "tweet_results": { "result": raw_tweet("1", "focal repeated") } } } },
                ]
            }
        });
        let payload = detail_payload(vec![
            tweet_entry("tweet-1", raw_tweet("1", "main")),
            module,
        ]);
        let thread = assemble_thread(&payload, "1").unwrap();
        let replies: Vec<_> = thread.replies.iter().map(|t| t.id.as_str()).collect();
        // The focal id never leaks into replies.
        assert_eq!(replies, ["5"]);
    }

    #[test]
    fn empty_instruction_list_is_not_found() {
        let payload = json!({
            "data": { "threaded_conversation_with_injections_v2": { "instructions": [] } }
        });
        assert!(matches!(
            assemble_thread(&payload, "1"),
            Err(TwitterError::TweetNotFound)
        ));
    }

    #[test]
    fn missing_payload_sections_are_not_found() {
        assert!(matches!(
            assemble_thread(&json!({}), "1"),
            Err(TwitterError::TweetNotFound)
        ));
    }

    #[test]
    fn empty_result_object_signals_expired_auth() {
        let payload = detail_payload(vec![tweet_entry("tweet-1", json!({}))]);
        assert!(matches!(
            assemble_thread(&payload, "1"),
            Err(TwitterError::AuthLikelyExpired)
        ));
    }

    #[test]
    fn tombstoned_focal_is_not_found_rather_than_expired() {
        let payload = detail_payload(vec![tweet_entry(
            "tweet-1",
            json!({ "__typename": "TweetTombstone" }),
        )]);
        assert!(matches!(
            assemble_thread(&payload, "1"),
            Err(TwitterError::TweetNotFound)
        ));
    }

    #[test]
    fn non_matching_instruction_types_are_ignored() {
        let payload = json!({
            "data": {
                "threaded_conversation_with_injections_v2": {
                    "instructions": [
                        { "type": "TimelineClearCache" },
                        {
                            "type": "TimelineAddEntries",
                            "entries": [tweet_entry("tweet-1", raw_tweet("1", "main"))]
                        }
                    ]
                }
            }
        });
        assert!(assemble_thread(&payload, "1").is_ok());
    }

    // ---- assemble_timeline ----

    #[test]
    fn collects_organic_and_promoted_entries_in_order() {
        let payload = timeline_payload(vec![
            tweet_entry("tweet-1", raw_tweet("1", "one")),
            tweet_entry("promoted-tweet-2", raw_tweet("2", "ad")),
            tweet_entry("who-to-follow-3", raw_tweet("3", "ignored")),
            tweet_entry("tweet-4", raw_tweet("4", "four")),
        ]);
        let page = assemble_timeline(&payload, None);
        let ids: Vec<_> = page.tweets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "4"]);
    }

    #[test]
    fn requested_count_truncates_but_cursor_survives() {
        let cursor_entry = json!({
            "entryId": "cursor-bottom-9",
            "content": { "value": "DAABCgABF__opaque_cursor_token" }
        });
        let payload = timeline_payload(vec![
            tweet_entry("tweet-1", raw_tweet("1", "one")),
            tweet_entry("tweet-2", raw_tweet("2", "two")),
            tweet_entry("tweet-3", raw_tweet("3", "three")),
            cursor_entry,
        ]);
        let page = assemble_timeline(&payload, Some(1));
        assert_eq!(page.tweets.len(), 1);
        assert_eq!(page.tweets[0].id, "1");
        assert_eq!(page.cursor.as_deref(), Some("DAABCgABF__opaque_cursor_token"));
    }

    #[test]
    fn duplicate_ids_keep_the_later_data() {
        let payload = timeline_payload(vec![
            tweet_entry("tweet-1", raw_tweet("1", "first version")),
            tweet_entry("tweet-2", raw_tweet("2", "other")),
            tweet_entry("tweet-1b", raw_tweet("1", "second version")),
        ]);
        let page = assemble_timeline(&payload, None);
        let with_id: Vec<_> = page.tweets.iter().filter(|t| t.id == "1").collect();
        assert_eq!(with_id.len(), 1);
        assert_eq!(with_id[0].text, "second version");
    }

    #[test]
    fn cursor_found_at_item_content_value() {
        let payload = timeline_payload(vec![json!({
            "entryId": "cursor-bottom-1",
            "content": { "itemContent": { "value": "HBaAwLDqm_another_long_token" } }
        })]);
        let page = assemble_timeline(&payload, None);
        assert_eq!(page.cursor.as_deref(), Some("HBaAwLDqm_another_long_token"));
    }

    #[test]
    fn cursor_found_at_operation_cursor() {
        let payload = timeline_payload(vec![json!({
            "entryId": "sq-cursor-bottom",
            "content": {
                "operation": {
                    "cursor": { "cursorType": "Bottom", "value": "scroll:1234567890123456" }
                }
            }
        })]);
        let page = assemble_timeline(&payload, None);
        assert_eq!(page.cursor.as_deref(), Some("scroll:1234567890123456"));
    }

    #[test]
    fn operation_cursor_without_type_tag_is_ignored() {
        let payload = timeline_payload(vec![json!({
            "entryId": "sq-cursor-bottom",
            "content": {
                "operation": { "cursor": { "value": "scroll:1234567890123456" } }
            }
        })]);
        assert_eq!(assemble_timeline(&payload, None).cursor, None);
    }

    #[test]
    fn short_strings_are_not_cursors() {
        let payload = timeline_payload(vec![json!({
            "entryId": "cursor-bottom-1",
            "content": { "value": "short" }
        })]);
        assert_eq!(assemble_timeline(&payload, None).cursor, None);
    }

    #[test]
    fn first_cursor_in_entry_order_wins() {
        let payload = timeline_payload(vec![
            json!({
                "entryId": "cursor-top-1",
                "content": { "value": "top_cursor_token_xxxx" }
            }),
            json!({
                "entryId": "cursor-bottom-2",
                "content": { "value": "bottom_cursor_token_yyyy" }
            }),
        ]);
        let page = assemble_timeline(&payload, None);
        assert_eq!(page.cursor.as_deref(), Some("top_cursor_token_xxxx"));
    }

    #[test]
    fn malformed_payload_degrades_to_empty_page() {
        let page = assemble_timeline(&json!({ "data": 17 }), Some(5));
        assert!(page.tweets.is_empty());
        assert_eq!(page.cursor, None);
    }
}
