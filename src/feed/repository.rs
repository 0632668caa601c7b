//! Collaborator traits
//!
//! Everything the feed core reads from the outside world goes through these
//! seams. `store::PgFeedStore` implements all of them against Postgres; tests
//! use an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::feed_config::FeedConfig;
use super::models::{
    AlgorithmProfile, CategoryId, Interaction, Post, PostId, Side, Subscription, UserId,
};
use crate::error::Result;

/// The candidate pools a feed is assembled from, in merge priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// The viewer's own posts, drafts included
    Own,
    PaidSubscriptions,
    FreeSubscriptions,
    Purchased,
    DiscoveryPublic,
    /// Premium posts from non-subscribed creators, shown as locked previews
    DiscoveryPremium,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Own,
        SourceKind::PaidSubscriptions,
        SourceKind::FreeSubscriptions,
        SourceKind::Purchased,
        SourceKind::DiscoveryPublic,
        SourceKind::DiscoveryPremium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Own => "own",
            SourceKind::PaidSubscriptions => "paid_subscriptions",
            SourceKind::FreeSubscriptions => "free_subscriptions",
            SourceKind::Purchased => "purchased",
            SourceKind::DiscoveryPublic => "discovery_public",
            SourceKind::DiscoveryPremium => "discovery_premium",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One bounded source query.
///
/// Repositories must only return active, non-censored posts; drafts only when
/// `include_drafts` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub kind: SourceKind,
    /// Restrict to these authors
    pub author_ids: Option<HashSet<UserId>>,
    /// Exclude these authors
    pub exclude_author_ids: HashSet<UserId>,
    /// Restrict to these post ids
    pub post_ids: Option<HashSet<PostId>>,
    pub side: Option<Side>,
    /// Public-visibility posts only
    pub public_visibility_only: bool,
    pub include_drafts: bool,
    pub published_after: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl SourceQuery {
    pub fn new(kind: SourceKind, limit: usize) -> Self {
        Self {
            kind,
            author_ids: None,
            exclude_author_ids: HashSet::new(),
            post_ids: None,
            side: None,
            public_visibility_only: false,
            include_drafts: false,
            published_after: None,
            limit,
        }
    }

    /// Whether a post satisfies this query's filters (ignoring `limit`)
    pub fn matches(&self, post: &Post) -> bool {
        if !post.is_active || post.is_censored {
            return false;
        }
        if post.is_draft && !self.include_drafts {
            return false;
        }
        if let Some(authors) = &self.author_ids {
            if !authors.contains(&post.author_id) {
                return false;
            }
        }
        if self.exclude_author_ids.contains(&post.author_id) {
            return false;
        }
        if let Some(ids) = &self.post_ids {
            if !ids.contains(&post.id) {
                return false;
            }
        }
        if let Some(side) = self.side {
            if post.side != side {
                return false;
            }
        }
        if self.public_visibility_only && post.visibility != super::models::Visibility::Public {
            return false;
        }
        if let Some(after) = self.published_after {
            if post.published_at < after {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn query_posts(&self, query: &SourceQuery) -> Result<Vec<Post>>;
}

#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn active_subscriptions(&self, viewer_id: UserId) -> Result<Vec<Subscription>>;
    async fn blocked_user_ids(&self, viewer_id: UserId) -> Result<Vec<UserId>>;
    /// Viewer opted out of premium/restricted content
    async fn hides_premium(&self, viewer_id: UserId) -> Result<bool>;
}

#[async_trait]
pub trait InteractionHistory: Send + Sync {
    async fn recent_likes(&self, viewer_id: UserId, limit: usize) -> Result<Vec<Interaction>>;
    async fn recent_comments(&self, viewer_id: UserId, limit: usize) -> Result<Vec<Interaction>>;
    async fn purchased_post_ids(&self, viewer_id: UserId) -> Result<Vec<PostId>>;
    async fn reaction_counts(&self, post_ids: &[PostId]) -> Result<HashMap<PostId, u64>>;
    async fn author_boost_multipliers(&self, author_ids: &[UserId]) -> Result<HashMap<UserId, f64>>;
}

#[async_trait]
pub trait InterestStore: Send + Sync {
    async fn weighted_interests(&self, viewer_id: UserId) -> Result<HashMap<CategoryId, f64>>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn feed_config(&self) -> Result<FeedConfig>;
}

#[async_trait]
pub trait AlgorithmStore: Send + Sync {
    /// The viewer's chosen algorithm, if any
    async fn user_algorithm(&self, viewer_id: UserId) -> Result<Option<AlgorithmProfile>>;
    /// The platform default, if one is flagged
    async fn default_algorithm(&self) -> Result<Option<AlgorithmProfile>>;
    async fn increment_usage(&self, algorithm_id: i64) -> Result<()>;
}

/// Session-scoped seed persistence, owned by the caller's session layer
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_seed(&self, session_id: &str) -> Result<Option<i64>>;
    async fn store_seed(&self, session_id: &str, seed: i64) -> Result<()>;
}
