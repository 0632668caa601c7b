//! Ranking strategies
//!
//! Each strategy implements [`Ranker`] and produces a total order over the
//! candidates: primary key first, then the seeded tie-break. Strategies are
//! looked up by code through [`RankerRegistry`]; an unknown code resolves to
//! chronological order with a warning instead of being silently swallowed.

mod chronological;
mod followed_first;
mod interest_based;
mod personalized;
mod trending;

pub use chronological::Chronological;
pub use followed_first::FollowedFirst;
pub use interest_based::InterestBased;
pub use personalized::Personalized;
pub use trending::Trending;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::warn;

use super::feed_config::FeedConfig;
use super::models::{Post, RankingContext};

/// Built-in strategy codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmCode {
    Chronological,
    Trending,
    FollowedFirst,
    ForYou,
    Interests,
}

impl AlgorithmCode {
    pub const ALL: [AlgorithmCode; 5] = [
        AlgorithmCode::Chronological,
        AlgorithmCode::Trending,
        AlgorithmCode::FollowedFirst,
        AlgorithmCode::ForYou,
        AlgorithmCode::Interests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmCode::Chronological => "chronological",
            AlgorithmCode::Trending => "trending",
            AlgorithmCode::FollowedFirst => "followed_first",
            AlgorithmCode::ForYou => "for_you",
            AlgorithmCode::Interests => "interests",
        }
    }
}

impl std::fmt::Display for AlgorithmCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlgorithmCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chronological" | "recent" => Ok(AlgorithmCode::Chronological),
            "trending" => Ok(AlgorithmCode::Trending),
            "followed_first" | "following" => Ok(AlgorithmCode::FollowedFirst),
            "for_you" | "personalized" => Ok(AlgorithmCode::ForYou),
            "interests" | "interest_based" => Ok(AlgorithmCode::Interests),
            other => Err(format!("unknown algorithm code '{}'", other)),
        }
    }
}

/// A ranking strategy
pub trait Ranker: Send + Sync {
    fn code(&self) -> AlgorithmCode;

    /// Order `candidates`; must be deterministic for identical inputs and seed
    fn rank(&self, candidates: Vec<Post>, ctx: &RankingContext, config: &FeedConfig) -> Vec<Post>;
}

/// Code -> strategy lookup with an explicit chronological fallback
#[derive(Clone)]
pub struct RankerRegistry {
    rankers: HashMap<AlgorithmCode, Arc<dyn Ranker>>,
    fallback: Arc<dyn Ranker>,
}

impl Default for RankerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            rankers: HashMap::new(),
            fallback: Arc::new(Chronological),
        };
        registry.register(Arc::new(Chronological));
        registry.register(Arc::new(Trending));
        registry.register(Arc::new(FollowedFirst));
        registry.register(Arc::new(Personalized));
        registry.register(Arc::new(InterestBased));
        registry
    }
}

impl RankerRegistry {
    /// Register (or replace) the strategy for its code
    pub fn register(&mut self, ranker: Arc<dyn Ranker>) {
        self.rankers.insert(ranker.code(), ranker);
    }

    pub fn get(&self, code: AlgorithmCode) -> Arc<dyn Ranker> {
        self.rankers
            .get(&code)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Resolve a stored code; unknown codes fall back to chronological
    pub fn resolve(&self, code: &str) -> Arc<dyn Ranker> {
        match code.parse::<AlgorithmCode>() {
            Ok(parsed) => self.get(parsed),
            Err(e) => {
                warn!("{}, falling back to {}", e, self.fallback.code());
                self.fallback.clone()
            }
        }
    }
}

/// Merge two already-ordered pools: in every cycle of `cycle` slots the first
/// `primary_slots` come from `primary`, the rest from `secondary`. When the
/// preferred pool is empty the other one fills the slot.
pub(crate) fn interleave_by_ratio(
    primary: Vec<Post>,
    secondary: Vec<Post>,
    primary_slots: usize,
    cycle: usize,
) -> Vec<Post> {
    let cycle = cycle.max(1);
    let mut primary: VecDeque<Post> = primary.into();
    let mut secondary: VecDeque<Post> = secondary.into();
    let mut out = Vec::with_capacity(primary.len() + secondary.len());

    while !primary.is_empty() || !secondary.is_empty() {
        let prefer_primary = out.len() % cycle < primary_slots;
        let next = if prefer_primary {
            primary.pop_front().or_else(|| secondary.pop_front())
        } else {
            secondary.pop_front().or_else(|| primary.pop_front())
        };
        match next {
            Some(post) => out.push(post),
            None => break,
        }
    }
    out
}
