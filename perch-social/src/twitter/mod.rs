//! X/Twitter internal GraphQL API integration.
//!
//! Submodules provide the request client with its authenticated→guest
//! fallback, JSON extraction and assembly helpers, identifier resolution,
//! guest-session plumbing, and the normalized response models.
pub mod client;
pub mod error;
pub mod extract;
pub mod guest;
pub mod ids;
pub mod types;

pub use client::{TimelineOptions, TwitterApi};
pub use error::TwitterError;
pub use ids::resolve_tweet_id;
