//! Terminal rendering of threads and timeline pages.
//!
//! Everything here consumes the normalized model as plain data and produces
//! strings; nothing calls back into the client.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Utc};
use crossterm::style::Stylize;
use regex::Regex;
use serde::Serialize;

use perch_social::twitter::types::{HomeTimelinePage, Tweet, TweetThread};

/// The platform's `created_at` shape, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

fn format_count(num: u64) -> String {
    fn one_decimal(value: f64) -> String {
        let s = format!("{value:.1}");
        s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
    }

    if num >= 1_000_000 {
        format!("{}M", one_decimal(num as f64 / 1_000_000.0))
    } else if num >= 1_000 {
        format!("{}K", one_decimal(num as f64 / 1_000.0))
    } else {
        num.to_string()
    }
}

/// Relative age for fresh tweets, a short date for older ones, and the raw
/// string whenever the timestamp does not parse.
fn format_age(created_at: &str) -> String {
    let Ok(then) = DateTime::<FixedOffset>::parse_from_str(created_at, CREATED_AT_FORMAT) else {
        return created_at.to_string();
    };
    let now = Utc::now();
    let elapsed = now.signed_duration_since(then.with_timezone(&Utc));

    if elapsed.num_minutes() < 1 {
        return "just now".to_string();
    }
    if elapsed.num_minutes() < 60 {
        return format!("{}m ago", elapsed.num_minutes());
    }
    if elapsed.num_hours() < 24 {
        return format!("{}h ago", elapsed.num_hours());
    }
    if elapsed.num_days() < 7 {
        return format!("{}d ago", elapsed.num_days());
    }

    if then.format("%Y").to_string() != now.format("%Y").to_string() {
        then.format("%b %-d, %Y").to_string()
    } else {
        then.format("%b %-d").to_string()
    }
}

fn format_tweet(tweet: &Tweet, indent: &str) -> String {
    let header = format!(
        "{} {} {}",
        tweet.author.name.as_str().bold(),
        format!("@{}", tweet.author.username).dark_grey(),
        format_age(&tweet.created_at).dim(),
    );

    let stats: Vec<String> = [
        (tweet.metrics.replies, "replies", "cyan"),
        (tweet.metrics.retweets, "retweets", "green"),
        (tweet.metrics.likes, "likes", "yellow"),
        (tweet.metrics.views, "views", "grey"),
    ]
    .iter()
    .filter(|(count, _, _)| *count > 0)
    .map(|(count, label, color)| {
        let text = format!("{} {}", format_count(*count), label);
        match *color {
            "cyan" => text.cyan().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.dark_grey().to_string(),
        }
    })
    .collect();

    let text_lines: Vec<String> = tweet
        .text
        .lines()
        .map(|line| format!("{indent}{line}"))
        .collect();

    let mut lines = vec![format!("{indent}{header}")];
    lines.extend(text_lines);
    if !stats.is_empty() {
        lines.push(format!("{indent}{}", stats.join("  ")));
    }
    lines.join("\n")
}

pub fn thread_pretty(thread: &TweetThread) -> String {
    let mut lines = Vec::new();

    if !thread.parent_tweets.is_empty() {
        lines.push("--- Parent tweets ---".dim().to_string());
        for tweet in &thread.parent_tweets {
            lines.push(format_tweet(tweet, ""));
            lines.push("  |".dim().to_string());
        }
        lines.push("  v".dim().to_string());
        lines.push(String::new());
    }

    lines.push(format_tweet(&thread.main_tweet, ""));

    if !thread.replies.is_empty() {
        lines.push(String::new());
        lines.push(
            format!("--- Replies ({}) ---", thread.replies.len())
                .dim()
                .to_string(),
        );
        for reply in &thread.replies {
            lines.push(String::new());
            lines.push(format_tweet(reply, "  "));
        }
    }

    lines.join("\n")
}

pub fn timeline_pretty(page: &HomeTimelinePage) -> String {
    let mut lines = Vec::new();
    for (i, tweet) in page.tweets.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format_tweet(tweet, ""));
    }
    if page.tweets.is_empty() {
        lines.push("(timeline is empty)".dim().to_string());
    }
    if let Some(cursor) = &page.cursor {
        lines.push(String::new());
        lines.push(format!("next cursor: {cursor}").dim().to_string());
    }
    lines.join("\n")
}

static JSON_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)":"#).expect("key pattern compiles"));
static JSON_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#": "([^"]*)""#).expect("string pattern compiles"));
static JSON_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r": (\d+)").expect("number pattern compiles"));
static JSON_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r": (true|false|null)").expect("keyword pattern compiles"));

fn highlight_json(json: &str) -> String {
    // Keys first, so the value patterns still see a bare `: ` prefix.
    let out = JSON_KEY.replace_all(json, |caps: &regex::Captures| {
        format!("{}:", format!("\"{}\"", &caps[1]).cyan())
    });
    let out = JSON_STRING.replace_all(&out, |caps: &regex::Captures| {
        format!(": {}", format!("\"{}\"", &caps[1]).green())
    });
    let out = JSON_NUMBER.replace_all(&out, |caps: &regex::Captures| {
        format!(": {}", caps[1].to_string().yellow())
    });
    let out = JSON_KEYWORD.replace_all(&out, |caps: &regex::Captures| {
        format!(": {}", caps[1].to_string().blue())
    });
    out.into_owned()
}

/// Serialize to pretty JSON, syntax-highlighted when `color` is set (the
/// caller decides based on whether stdout is a TTY).
pub fn to_json<T: Serialize>(value: &T, color: bool) -> String {
    let json = serde_json::to_string_pretty(value).expect("model types serialize");
    if color {
        highlight_json(&json)
    } else {
        json
    }
}
