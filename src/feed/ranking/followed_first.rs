use super::{interleave_by_ratio, AlgorithmCode, Chronological, Ranker};
use crate::feed::feed_config::FeedConfig;
use crate::feed::models::{Post, RankingContext};
use crate::feed::scoring::popularity;
use crate::feed::tiebreak::rank_by_score;

/// Followed creators first, with a fixed share of discovery slots
///
/// Followed posts (including the viewer's own) keep chronological order;
/// everything else is ordered by `likes + 2 * comments`. The two pools are
/// merged at `followed_ratio` out of `followed_cycle` slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowedFirst;

impl Ranker for FollowedFirst {
    fn code(&self) -> AlgorithmCode {
        AlgorithmCode::FollowedFirst
    }

    fn rank(&self, candidates: Vec<Post>, ctx: &RankingContext, config: &FeedConfig) -> Vec<Post> {
        if candidates.is_empty() {
            return candidates;
        }

        let (followed, discovery): (Vec<Post>, Vec<Post>) = candidates
            .into_iter()
            .partition(|p| p.author_id == ctx.viewer_id || ctx.follows(p.author_id));

        let followed = Chronological.rank(followed, ctx, config);
        let discovery = rank_by_score(
            discovery
                .into_iter()
                .map(|post| (popularity(&post), post))
                .collect(),
            ctx.seed,
        );

        let (slots, cycle) = config.followed_slots();
        interleave_by_ratio(followed, discovery, slots, cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::fixtures::{context, post};
    use crate::feed::ranking::test_support::ids;

    fn pools() -> (RankingContext, Vec<Post>) {
        let mut ctx = context(1, 11);
        ctx.followed_public.insert(2);
        ctx.followed_premium.insert(3);
        let mut posts = Vec::new();
        for i in 0..10 {
            posts.push(post(100 + i, 2 + (i % 2), i));
        }
        for i in 0..10 {
            let mut p = post(200 + i, 50 + i, i);
            p.likes = i as u64;
            posts.push(p);
        }
        (ctx, posts)
    }

    #[test]
    fn test_first_ten_slots_hold_seven_followed() {
        let (ctx, posts) = pools();
        let ranked = FollowedFirst.rank(posts, &ctx, &FeedConfig::default());
        let followed_in_first_ten = ranked[..10]
            .iter()
            .filter(|p| ctx.follows(p.author_id))
            .count();
        assert_eq!(followed_in_first_ten, 7);
        assert_eq!(ranked.len(), 20);
    }

    #[test]
    fn test_partitions_keep_their_internal_order() {
        let (ctx, posts) = pools();
        let ranked = FollowedFirst.rank(posts, &ctx, &FeedConfig::default());
        let followed: Vec<_> = ranked.iter().filter(|p| p.id < 200).map(|p| p.id).collect();
        let discovery: Vec<_> = ranked.iter().filter(|p| p.id >= 200).map(|p| p.id).collect();
        assert_eq!(followed, (100..110).collect::<Vec<_>>());
        assert_eq!(discovery, (200..210).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_only_discovery_when_nothing_followed() {
        let ctx = context(1, 11);
        let mut a = post(1, 5, 1);
        a.comments = 4;
        let mut b = post(2, 6, 1);
        b.likes = 5;
        let ranked = FollowedFirst.rank(vec![b, a], &ctx, &FeedConfig::default());
        assert_eq!(ids(&ranked), vec![1, 2]);
    }
}
