//! Feed Module
//!
//! Assembles the personalized, paginated feed for a subscription content platform.
//!
//! ## Pipeline
//!
//! 1. **Sources** - Own posts, paid and free subscriptions, purchases, and two
//!    discovery pools, fetched concurrently with per-source limits and timeouts
//! 2. **Eligibility** - Drop seen posts, blocked authors and (when opted out) premium content
//! 3. **Ranking** - One of five strategies, selected per viewer
//! 4. **Diversity** - No creator more than N times in a row
//! 5. **Previews** - Locked premium teasers from non-subscribed creators
//!
//! ## Strategies
//!
//! - **Chronological**: newest first
//! - **Trending**: weighted engagement with exponential time decay plus a recency bonus
//! - **Followed-First**: followed creators and discovery interleaved 7:3
//! - **For You**: engagement, interests, favorite creators, content type and recency
//! - **Interests**: interest-matched posts interleaved with the rest (falls back to Trending)
//!
//! ## Determinism
//!
//! Every strategy sorts by its primary key and then by a seeded hash of the post id
//! (see [`tiebreak`]), so the same seed yields the same order across requests and
//! processes no matter how storage returns rows.

pub mod assembler;
pub mod config_cache;
pub mod diversity;
pub mod feed_config;
pub mod filter;
pub mod metrics;
pub mod models;
pub mod preview;
pub mod ranking;
pub mod repository;
pub mod scoring;
pub mod session;
pub mod sources;
pub mod store;
pub mod tiebreak;

pub use assembler::{Collaborators, FeedAssembler};
pub use config_cache::FeedConfigCache;
pub use feed_config::FeedConfig;
pub use models::{FeedRequest, FeedResult, Post, RankingContext, Side};
pub use ranking::{AlgorithmCode, Ranker, RankerRegistry};
pub use repository::{
    AlgorithmStore, ConfigStore, ContentRepository, InteractionHistory, InterestStore,
    SessionStore, SocialGraph, SourceKind, SourceQuery,
};
pub use session::{get_or_create_seed, InMemorySessionStore};
pub use store::PgFeedStore;
pub use tiebreak::tiebreak;
