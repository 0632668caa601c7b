//! In-memory platform used by the integration tests
//!
//! Implements every collaborator trait over plain collections, with switches to
//! make individual lookups fail or stall.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fanfeed::feed::models::{
    AlgorithmProfile, CategoryId, Interaction, Post, PostId, Side, Subscription, UserId,
    Visibility,
};
use fanfeed::feed::repository::{
    AlgorithmStore, ConfigStore, ContentRepository, InteractionHistory, InterestStore,
    SocialGraph, SourceQuery,
};
use fanfeed::{
    Collaborators, Error, FeedAssembler, FeedConfig, FeedConfigCache, FeedServiceConfig, Result,
};

pub const VIEWER: UserId = 1;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

pub fn post(id: PostId, author_id: UserId, age_hours: i64) -> Post {
    Post {
        id,
        author_id,
        published_at: now() - chrono::Duration::hours(age_hours),
        side: Side::Public,
        is_draft: false,
        is_active: true,
        is_censored: false,
        visibility: Visibility::Public,
        likes: 0,
        comments: 0,
        views: 0,
        shares: 0,
        category_id: None,
        music_track_id: None,
        media_type: None,
    }
}

pub fn premium(id: PostId, author_id: UserId, age_hours: i64) -> Post {
    Post {
        side: Side::Premium,
        ..post(id, author_id, age_hours)
    }
}

pub fn profile(id: i64, code: &str, is_active: bool) -> AlgorithmProfile {
    AlgorithmProfile {
        id,
        code: code.to_string(),
        display_name: code.to_string(),
        is_default: false,
        is_active,
        usage_count: 0,
    }
}

pub fn ids(posts: &[Post]) -> Vec<PostId> {
    posts.iter().map(|p| p.id).collect()
}

#[derive(Default)]
pub struct FakePlatform {
    pub posts: Vec<Post>,
    pub subscriptions: HashMap<UserId, Vec<Subscription>>,
    /// (blocker, blocked)
    pub blocks: Vec<(UserId, UserId)>,
    pub hides_premium: HashSet<UserId>,
    pub likes: HashMap<UserId, Vec<Interaction>>,
    pub comments: HashMap<UserId, Vec<Interaction>>,
    pub purchases: HashMap<UserId, Vec<PostId>>,
    pub reactions: HashMap<PostId, u64>,
    pub boosts: HashMap<UserId, f64>,
    pub interests: HashMap<UserId, HashMap<CategoryId, f64>>,
    pub config: FeedConfig,
    pub user_algorithms: HashMap<UserId, AlgorithmProfile>,
    pub default_algorithm: Option<AlgorithmProfile>,
    /// Names of lookups (source kinds or trait methods) that return an error
    pub failing: HashSet<&'static str>,
    /// Names of lookups that never answer in time
    pub stalled: HashSet<&'static str>,
    /// Shuffle query results with this seed, like unordered storage would
    pub shuffle_seed: Option<u64>,
    pub usage: HashMap<i64, AtomicI64>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, viewer: UserId, creator_id: UserId, side: Side) {
        self.subscriptions
            .entry(viewer)
            .or_default()
            .push(Subscription { creator_id, side });
    }

    pub fn track_usage(&mut self, algorithm_id: i64) {
        self.usage.insert(algorithm_id, AtomicI64::new(0));
    }

    pub fn usage_of(&self, algorithm_id: i64) -> i64 {
        self.usage
            .get(&algorithm_id)
            .map(|n| n.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    async fn gate(&self, name: &'static str) -> Result<()> {
        if self.stalled.contains(name) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing.contains(name) {
            return Err(Error::source_unavailable(name, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for FakePlatform {
    async fn query_posts(&self, query: &SourceQuery) -> Result<Vec<Post>> {
        self.gate(query.kind.as_str()).await?;
        let mut hits: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        hits.truncate(query.limit);
        if let Some(seed) = self.shuffle_seed {
            hits.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        Ok(hits)
    }
}

#[async_trait]
impl SocialGraph for FakePlatform {
    async fn active_subscriptions(&self, viewer_id: UserId) -> Result<Vec<Subscription>> {
        self.gate("subscriptions").await?;
        Ok(self.subscriptions.get(&viewer_id).cloned().unwrap_or_default())
    }

    async fn blocked_user_ids(&self, viewer_id: UserId) -> Result<Vec<UserId>> {
        self.gate("blocked").await?;
        Ok(self
            .blocks
            .iter()
            .filter_map(|&(blocker, blocked)| {
                if blocker == viewer_id {
                    Some(blocked)
                } else if blocked == viewer_id {
                    Some(blocker)
                } else {
                    None
                }
            })
            .collect())
    }

    async fn hides_premium(&self, viewer_id: UserId) -> Result<bool> {
        self.gate("hides_premium").await?;
        Ok(self.hides_premium.contains(&viewer_id))
    }
}

#[async_trait]
impl InteractionHistory for FakePlatform {
    async fn recent_likes(&self, viewer_id: UserId, limit: usize) -> Result<Vec<Interaction>> {
        self.gate("likes").await?;
        let mut likes = self.likes.get(&viewer_id).cloned().unwrap_or_default();
        likes.truncate(limit);
        Ok(likes)
    }

    async fn recent_comments(&self, viewer_id: UserId, limit: usize) -> Result<Vec<Interaction>> {
        self.gate("comments").await?;
        let mut comments = self.comments.get(&viewer_id).cloned().unwrap_or_default();
        comments.truncate(limit);
        Ok(comments)
    }

    async fn purchased_post_ids(&self, viewer_id: UserId) -> Result<Vec<PostId>> {
        self.gate("purchases").await?;
        Ok(self.purchases.get(&viewer_id).cloned().unwrap_or_default())
    }

    async fn reaction_counts(&self, post_ids: &[PostId]) -> Result<HashMap<PostId, u64>> {
        self.gate("reactions").await?;
        Ok(post_ids
            .iter()
            .filter_map(|id| self.reactions.get(id).map(|n| (*id, *n)))
            .collect())
    }

    async fn author_boost_multipliers(&self, author_ids: &[UserId]) -> Result<HashMap<UserId, f64>> {
        self.gate("boosts").await?;
        Ok(author_ids
            .iter()
            .filter_map(|id| self.boosts.get(id).map(|m| (*id, *m)))
            .collect())
    }
}

#[async_trait]
impl InterestStore for FakePlatform {
    async fn weighted_interests(&self, viewer_id: UserId) -> Result<HashMap<CategoryId, f64>> {
        self.gate("interests").await?;
        Ok(self.interests.get(&viewer_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ConfigStore for FakePlatform {
    async fn feed_config(&self) -> Result<FeedConfig> {
        self.gate("config").await?;
        Ok(self.config.clone())
    }
}

#[async_trait]
impl AlgorithmStore for FakePlatform {
    async fn user_algorithm(&self, viewer_id: UserId) -> Result<Option<AlgorithmProfile>> {
        self.gate("algorithms").await?;
        Ok(self.user_algorithms.get(&viewer_id).cloned())
    }

    async fn default_algorithm(&self) -> Result<Option<AlgorithmProfile>> {
        self.gate("algorithms").await?;
        Ok(self.default_algorithm.clone())
    }

    async fn increment_usage(&self, algorithm_id: i64) -> Result<()> {
        if let Some(counter) = self.usage.get(&algorithm_id) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub fn settings() -> FeedServiceConfig {
    FeedServiceConfig {
        source_timeout: Duration::from_millis(100),
        ..FeedServiceConfig::default()
    }
}

pub fn assembler(platform: FakePlatform) -> (FeedAssembler, Arc<FakePlatform>) {
    let platform = Arc::new(platform);
    let cache = Arc::new(FeedConfigCache::new(
        platform.clone(),
        Duration::from_secs(300),
    ));
    let assembler = FeedAssembler::new(Collaborators::shared(platform.clone()), cache, settings());
    (assembler, platform)
}
