use rayon::prelude::*;

use super::{AlgorithmCode, Ranker};
use crate::feed::feed_config::FeedConfig;
use crate::feed::models::{Post, RankingContext};
use crate::feed::scoring::personalized_score;
use crate::feed::tiebreak::rank_by_score;

/// Below this many candidates scoring stays on the calling thread
const PARALLEL_THRESHOLD: usize = 256;

/// "For you": weighted blend of engagement, interests, favorite creators,
/// preferred media type and recency, times the author's boost
#[derive(Debug, Clone, Copy, Default)]
pub struct Personalized;

impl Ranker for Personalized {
    fn code(&self) -> AlgorithmCode {
        AlgorithmCode::ForYou
    }

    fn rank(&self, candidates: Vec<Post>, ctx: &RankingContext, config: &FeedConfig) -> Vec<Post> {
        if candidates.is_empty() {
            return candidates;
        }

        // Rayon keeps input order on collect, so the result does not depend on scheduling
        let scored: Vec<(f64, Post)> = if candidates.len() >= PARALLEL_THRESHOLD {
            candidates
                .into_par_iter()
                .map(|post| (personalized_score(&post, ctx, config), post))
                .collect()
        } else {
            candidates
                .into_iter()
                .map(|post| (personalized_score(&post, ctx, config), post))
                .collect()
        };

        rank_by_score(scored, ctx.seed)
    }
}
