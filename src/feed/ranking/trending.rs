use super::{AlgorithmCode, Ranker};
use crate::feed::feed_config::FeedConfig;
use crate::feed::models::{Post, RankingContext};
use crate::feed::scoring::trending_score;
use crate::feed::tiebreak::rank_by_score;

/// Time-decayed weighted engagement with a freshness bonus
#[derive(Debug, Clone, Copy, Default)]
pub struct Trending;

impl Ranker for Trending {
    fn code(&self) -> AlgorithmCode {
        AlgorithmCode::Trending
    }

    fn rank(&self, candidates: Vec<Post>, ctx: &RankingContext, config: &FeedConfig) -> Vec<Post> {
        if candidates.is_empty() {
            return candidates;
        }
        let scored = candidates
            .into_iter()
            .map(|post| (trending_score(&post, ctx, config), post))
            .collect();
        rank_by_score(scored, ctx.seed)
    }
}
