//! Normalized response models.
//!
//! These are the only shapes the rest of the program sees; the upstream
//! payload's nesting never leaks past the extraction layer. Field names
//! serialize as camelCase so `--json` output stays stable for scripts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub author: TweetAuthor,
    pub metrics: TweetMetrics,
    pub is_reply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_tweet_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetAuthor {
    pub id: String,
    pub name: String,
    pub username: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetMetrics {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
    pub views: u64,
    pub bookmarks: u64,
}

/// A focal tweet with its ancestors (oldest first) and replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetThread {
    pub main_tweet: Tweet,
    pub parent_tweets: Vec<Tweet>,
    pub replies: Vec<Tweet>,
}

impl TweetThread {
    /// Wrap a lone tweet as a thread with no surrounding context (the shape
    /// guest mode produces).
    pub fn solitary(main_tweet: Tweet) -> Self {
        Self {
            main_tweet,
            parent_tweets: Vec::new(),
            replies: Vec::new(),
        }
    }
}

/// One page of the home timeline plus the opaque token for the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeTimelinePage {
    pub tweets: Vec<Tweet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}
