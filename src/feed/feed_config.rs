//! Tunable ranking configuration
//!
//! `FeedConfig` is the versioned bag of limits and weights the ranking strategies
//! read. Every field has a hard-coded default, so a missing or partial stored
//! configuration never blocks a feed. Weights expressed as percentages (0-100)
//! are converted with [`pct`] at the point of use.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ranking and assembly knobs, overlaid from the config store on top of defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub version: i64,

    // Per-source row limits
    pub own_limit: usize,
    pub paid_subscription_limit: usize,
    pub free_subscription_limit: usize,
    pub purchased_limit: usize,
    pub discovery_fetch_limit: usize,
    pub preview_fetch_limit: usize,
    /// Only consider posts newer than this many days in subscription/discovery sources (0 = no window)
    pub recency_window_days: u32,

    // Discovery and preview
    pub discovery_count: usize,
    pub preview_pool_size: usize,
    pub preview_count: usize,
    pub preview_interval: usize,

    // Diversity
    pub diversity_max_consecutive: usize,

    // Trending
    pub trending_like_weight: f64,
    pub trending_comment_weight: f64,
    pub trending_reaction_weight: f64,
    pub trending_view_weight: f64,
    pub trending_share_weight: f64,
    pub trending_decay_base: f64,
    pub trending_decay_period_hours: f64,

    // Followed-first: followed slots out of `followed_cycle`
    pub followed_ratio: usize,
    pub followed_cycle: usize,

    // Personalized ("for you") weights, percentages
    pub foryou_engagement_pct: f64,
    pub foryou_interest_pct: f64,
    pub foryou_creator_pct: f64,
    pub foryou_content_type_pct: f64,
    pub foryou_recency_pct: f64,

    // Interest-based
    pub interest_category_pct: f64,

    // Discovery score weights, percentages (also used for interest-matched posts)
    pub discovery_interest_pct: f64,
    pub discovery_engagement_pct: f64,
    pub discovery_recency_pct: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            version: 0,

            own_limit: 20,
            paid_subscription_limit: 100,
            free_subscription_limit: 100,
            purchased_limit: 50,
            discovery_fetch_limit: 100,
            preview_fetch_limit: 50,
            recency_window_days: 30,

            discovery_count: 10,
            preview_pool_size: 3,
            preview_count: 1,
            preview_interval: 5,

            diversity_max_consecutive: 2,

            trending_like_weight: 1.0,
            trending_comment_weight: 3.0,
            trending_reaction_weight: 1.5,
            trending_view_weight: 0.1,
            trending_share_weight: 3.0,
            trending_decay_base: 0.95,
            trending_decay_period_hours: 6.0,

            followed_ratio: 7,
            followed_cycle: 10,

            foryou_engagement_pct: 30.0,
            foryou_interest_pct: 25.0,
            foryou_creator_pct: 20.0,
            foryou_content_type_pct: 10.0,
            foryou_recency_pct: 15.0,

            interest_category_pct: 80.0,

            discovery_interest_pct: 50.0,
            discovery_engagement_pct: 30.0,
            discovery_recency_pct: 20.0,
        }
    }
}

/// Percentage (0-100) to fraction
pub fn pct(value: f64) -> f64 {
    value / 100.0
}

impl FeedConfig {
    /// Overlay stored `(key, value)` pairs on the defaults.
    ///
    /// Unknown keys are ignored, percentages are clamped to 0-100 and counts to >= 0.
    pub fn from_entries<I, K>(version: i64, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut config = Self {
            version,
            ..Self::default()
        };
        for (key, value) in entries {
            if !config.apply(key.as_ref(), value) {
                debug!("Ignoring unknown feed config key '{}'", key.as_ref());
            }
        }
        config
    }

    /// Apply one entry; returns false for unknown keys or non-finite values
    pub fn apply(&mut self, key: &str, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let count = value.max(0.0).round() as usize;
        let percent = value.clamp(0.0, 100.0);
        let weight = value.max(0.0);

        match key {
            "own_limit" => self.own_limit = count,
            "paid_subscription_limit" => self.paid_subscription_limit = count,
            "free_subscription_limit" => self.free_subscription_limit = count,
            "purchased_limit" => self.purchased_limit = count,
            "discovery_fetch_limit" => self.discovery_fetch_limit = count,
            "preview_fetch_limit" => self.preview_fetch_limit = count,
            "recency_window_days" => self.recency_window_days = count as u32,
            "discovery_count" => self.discovery_count = count,
            "preview_pool_size" => self.preview_pool_size = count,
            "preview_count" => self.preview_count = count,
            "preview_interval" => self.preview_interval = count.max(1),
            "diversity_max_consecutive" => self.diversity_max_consecutive = count.max(1),
            "trending_like_weight" => self.trending_like_weight = weight,
            "trending_comment_weight" => self.trending_comment_weight = weight,
            "trending_reaction_weight" => self.trending_reaction_weight = weight,
            "trending_view_weight" => self.trending_view_weight = weight,
            "trending_share_weight" => self.trending_share_weight = weight,
            "trending_decay_base" => self.trending_decay_base = value.clamp(0.01, 1.0),
            "trending_decay_period_hours" => self.trending_decay_period_hours = value.max(0.1),
            "followed_ratio" => self.followed_ratio = count,
            "followed_cycle" => self.followed_cycle = count.max(1),
            "foryou_engagement_pct" => self.foryou_engagement_pct = percent,
            "foryou_interest_pct" => self.foryou_interest_pct = percent,
            "foryou_creator_pct" => self.foryou_creator_pct = percent,
            "foryou_content_type_pct" => self.foryou_content_type_pct = percent,
            "foryou_recency_pct" => self.foryou_recency_pct = percent,
            "interest_category_pct" => self.interest_category_pct = percent,
            "discovery_interest_pct" => self.discovery_interest_pct = percent,
            "discovery_engagement_pct" => self.discovery_engagement_pct = percent,
            "discovery_recency_pct" => self.discovery_recency_pct = percent,
            _ => return false,
        }
        true
    }

    /// Followed-first slots per cycle, never more than the cycle itself
    pub fn followed_slots(&self) -> (usize, usize) {
        let cycle = self.followed_cycle.max(1);
        (self.followed_ratio.min(cycle), cycle)
    }

    /// Interest-matched slots out of 10, derived from the category weight percentage
    pub fn interest_slots(&self) -> (usize, usize) {
        let slots = (self.interest_category_pct / 10.0).round() as usize;
        (slots.min(10), 10)
    }
}
