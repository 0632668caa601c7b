use super::{interleave_by_ratio, AlgorithmCode, Ranker, Trending};
use crate::feed::feed_config::FeedConfig;
use crate::feed::models::{Post, RankingContext};
use crate::feed::scoring::{discovery_score, popularity};
use crate::feed::tiebreak::rank_by_score;

/// Posts in the viewer's weighted categories, mixed with a share of everything else
///
/// Viewers without recorded interests get the trending order unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterestBased;

impl Ranker for InterestBased {
    fn code(&self) -> AlgorithmCode {
        AlgorithmCode::Interests
    }

    fn rank(&self, candidates: Vec<Post>, ctx: &RankingContext, config: &FeedConfig) -> Vec<Post> {
        if candidates.is_empty() {
            return candidates;
        }
        if ctx.interests.is_empty() {
            return Trending.rank(candidates, ctx, config);
        }

        let (matching, rest): (Vec<Post>, Vec<Post>) = candidates
            .into_iter()
            .partition(|p| ctx.interest_weight(p).is_some());

        let matching = rank_by_score(
            matching
                .into_iter()
                .map(|post| (discovery_score(&post, ctx, config), post))
                .collect(),
            ctx.seed,
        );
        let rest = rank_by_score(
            rest.into_iter()
                .map(|post| (popularity(&post), post))
                .collect(),
            ctx.seed,
        );

        let (slots, cycle) = config.interest_slots();
        interleave_by_ratio(matching, rest, slots, cycle)
    }
}
