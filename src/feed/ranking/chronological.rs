use super::{AlgorithmCode, Ranker};
use crate::feed::feed_config::FeedConfig;
use crate::feed::models::{Post, RankingContext};
use crate::feed::tiebreak::compare_tiebreak;

/// Newest first
#[derive(Debug, Clone, Copy, Default)]
pub struct Chronological;

impl Ranker for Chronological {
    fn code(&self) -> AlgorithmCode {
        AlgorithmCode::Chronological
    }

    fn rank(&self, mut candidates: Vec<Post>, ctx: &RankingContext, _config: &FeedConfig) -> Vec<Post> {
        if candidates.is_empty() {
            return candidates;
        }
        candidates.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| compare_tiebreak(a, b, ctx.seed))
        });
        candidates
    }
}
