//! Feed data model
//!
//! Read-only projections assembled per request. Nothing here is mutated by the
//! ranking core; posts are snapshots handed over by the content repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type PostId = i64;
pub type UserId = i64;
pub type CategoryId = i64;

/// Two-tier content visibility. `Premium` requires a subscription, purchase or ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Public,
    Premium,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Public => "public",
            Side::Premium => "premium",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" | "a" => Ok(Side::Public),
            "premium" | "b" => Ok(Side::Premium),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

/// Media kind of a post, used for the preferred-content-type boost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Text,
    Image,
    Video,
    Audio,
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MediaType::Text),
            "image" | "photo" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" | "music" => Ok(MediaType::Audio),
            other => Err(format!("unknown media type '{}'", other)),
        }
    }
}

/// A piece of content as seen by the ranking core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub published_at: DateTime<Utc>,
    pub side: Side,
    pub is_draft: bool,
    pub is_active: bool,
    pub is_censored: bool,
    pub visibility: Visibility,
    pub likes: u64,
    pub comments: u64,
    pub views: u64,
    pub shares: u64,
    pub category_id: Option<CategoryId>,
    pub music_track_id: Option<i64>,
    pub media_type: Option<MediaType>,
}

impl Post {
    pub fn is_premium(&self) -> bool {
        self.side == Side::Premium
    }
}

/// Per-request bundle of everything a ranking strategy may consult
#[derive(Debug, Clone)]
pub struct RankingContext {
    pub viewer_id: UserId,
    /// Tie-break seed, reused for the whole session
    pub seed: i64,
    /// Viewer opted out of premium/restricted content
    pub public_only: bool,
    pub followed_public: HashSet<UserId>,
    pub followed_premium: HashSet<UserId>,
    pub blocked: HashSet<UserId>,
    pub purchased: HashSet<PostId>,
    /// category -> affinity weight in 0..=1
    pub interests: HashMap<CategoryId, f64>,
    /// author -> active boost multiplier (>1.0 while promoted)
    pub boosts: HashMap<UserId, f64>,
    pub reaction_counts: HashMap<PostId, u64>,
    /// author -> number of recent likes/comments by the viewer
    pub author_interactions: HashMap<UserId, u32>,
    pub preferred_media_type: Option<MediaType>,
    /// Reference instant for every age computation in this request
    pub now: DateTime<Utc>,
}

impl RankingContext {
    /// Empty context for a viewer; collaborators fill the rest in
    pub fn new(viewer_id: UserId, seed: i64, now: DateTime<Utc>) -> Self {
        Self {
            viewer_id,
            seed,
            public_only: false,
            followed_public: HashSet::new(),
            followed_premium: HashSet::new(),
            blocked: HashSet::new(),
            purchased: HashSet::new(),
            interests: HashMap::new(),
            boosts: HashMap::new(),
            reaction_counts: HashMap::new(),
            author_interactions: HashMap::new(),
            preferred_media_type: None,
            now,
        }
    }

    pub fn follows(&self, author_id: UserId) -> bool {
        self.followed_public.contains(&author_id) || self.followed_premium.contains(&author_id)
    }

    pub fn subscribed_premium(&self, author_id: UserId) -> bool {
        self.followed_premium.contains(&author_id)
    }

    pub fn boost_for(&self, author_id: UserId) -> f64 {
        self.boosts.get(&author_id).copied().unwrap_or(1.0)
    }

    pub fn reactions_for(&self, post_id: PostId) -> u64 {
        self.reaction_counts.get(&post_id).copied().unwrap_or(0)
    }

    pub fn interest_weight(&self, post: &Post) -> Option<f64> {
        post.category_id
            .and_then(|category| self.interests.get(&category).copied())
    }
}

/// A named ranking strategy as stored by the algorithm preference store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmProfile {
    pub id: i64,
    pub code: String,
    pub display_name: String,
    pub is_default: bool,
    pub is_active: bool,
    pub usage_count: i64,
}

/// Subscription edge from the viewer to a creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub creator_id: UserId,
    pub side: Side,
}

/// A like or comment the viewer recently left, reduced to what ranking needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub post_id: PostId,
    pub author_id: UserId,
    pub media_type: Option<MediaType>,
}

/// Input to `FeedAssembler::get_feed`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedRequest {
    pub viewer_id: UserId,
    pub page_size: usize,
    #[serde(default)]
    pub seen_ids: HashSet<PostId>,
    /// Session seed; a per-day seed is derived when absent
    pub seed: Option<i64>,
}

/// One page of the assembled feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedResult {
    pub posts: Vec<Post>,
    pub has_more: bool,
    /// Ids in `posts` that are locked previews and must render as paywalled
    pub locked_ids: HashSet<PostId>,
    pub seed: i64,
    pub algorithm: String,
}

impl FeedResult {
    pub fn empty(seed: i64, algorithm: impl Into<String>) -> Self {
        Self {
            posts: Vec::new(),
            has_more: false,
            locked_ids: HashSet::new(),
            seed,
            algorithm: algorithm.into(),
        }
    }

    pub fn is_locked(&self, post_id: PostId) -> bool {
        self.locked_ids.contains(&post_id)
    }
}
