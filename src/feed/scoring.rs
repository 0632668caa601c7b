//! Scoring primitives
//!
//! Pure functions over one post plus pre-fetched aggregates. No I/O; every
//! strategy in `ranking` composes these.

use chrono::{DateTime, Utc};

use super::feed_config::{pct, FeedConfig};
use super::models::{Post, RankingContext};

/// Own posts get a flat bonus in the personalized feed
pub const OWN_POST_BONUS: f64 = 20.0;
/// Premium-side posts get a flat bonus in the personalized feed
pub const PREMIUM_BONUS: f64 = 15.0;
/// Preferred media type boost before weighting
pub const CONTENT_TYPE_BOOST: f64 = 30.0;
/// Per-interaction favorite-creator boost and its cap
pub const CREATOR_BOOST_PER_INTERACTION: f64 = 5.0;
pub const CREATOR_BOOST_CAP: f64 = 50.0;
/// Interest weights are stored as 0-1 and scaled to points before weighting
pub const INTEREST_SCALE: f64 = 100.0;
pub const INTEREST_FACTOR: f64 = 0.6;

/// Fractional hours since publication, never negative
pub fn age_hours(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - published_at).num_seconds().max(0);
    seconds as f64 / 3600.0
}

/// Raw engagement count: likes + comments + shares + reactions
pub fn total_engagement(post: &Post, reactions: u64) -> f64 {
    post.likes
        .saturating_add(post.comments)
        .saturating_add(post.shares)
        .saturating_add(reactions) as f64
}

/// `ln(1 + engagement) * 10`
pub fn log_engagement(engagement: f64) -> f64 {
    (1.0 + engagement.max(0.0)).ln() * 10.0
}

/// Simple popularity used for discovery partitions: `likes + 2 * comments`
pub fn popularity(post: &Post) -> f64 {
    post.likes as f64 + 2.0 * post.comments as f64
}

/// 50 / 25 / 10 for younger than 6h / 24h / 72h
pub fn recency_tier(age_hours: f64) -> f64 {
    if age_hours < 6.0 {
        50.0
    } else if age_hours < 24.0 {
        25.0
    } else if age_hours < 72.0 {
        10.0
    } else {
        0.0
    }
}

/// Trending bonus: 50 under 6h, 25 under 24h, nothing after
pub fn trending_recency_bonus(age_hours: f64) -> f64 {
    if age_hours < 6.0 {
        50.0
    } else if age_hours < 24.0 {
        25.0
    } else {
        0.0
    }
}

/// `base ^ (age / period)`
pub fn decay(age_hours: f64, base: f64, period_hours: f64) -> f64 {
    base.powf(age_hours / period_hours.max(f64::EPSILON))
}

/// Weighted engagement used by the trending strategy
pub fn trending_engagement(post: &Post, reactions: u64, config: &FeedConfig) -> f64 {
    post.likes as f64 * config.trending_like_weight
        + post.comments as f64 * config.trending_comment_weight
        + reactions as f64 * config.trending_reaction_weight
        + post.views as f64 * config.trending_view_weight
        + post.shares as f64 * config.trending_share_weight
}

/// Full trending score, including the author's boost multiplier
pub fn trending_score(post: &Post, ctx: &RankingContext, config: &FeedConfig) -> f64 {
    let age = age_hours(post.published_at, ctx.now);
    let engagement = trending_engagement(post, ctx.reactions_for(post.id), config);
    let decayed = engagement
        * decay(
            age,
            config.trending_decay_base,
            config.trending_decay_period_hours,
        );
    (decayed + trending_recency_bonus(age)) * ctx.boost_for(post.author_id)
}

/// `min(interactions * 5, 50)`
pub fn favorite_creator_boost(interactions: u32) -> f64 {
    (interactions as f64 * CREATOR_BOOST_PER_INTERACTION).min(CREATOR_BOOST_CAP)
}

/// Interest boost for a matched category, zero when the post has no matching category
pub fn interest_boost(weight: Option<f64>) -> f64 {
    weight
        .map(|w| w.clamp(0.0, 1.0) * INTEREST_SCALE * INTEREST_FACTOR)
        .unwrap_or(0.0)
}

/// Flat boost when the post's media type matches the viewer's most-interacted type
pub fn content_type_boost(post: &Post, ctx: &RankingContext) -> f64 {
    match (post.media_type, ctx.preferred_media_type) {
        (Some(have), Some(want)) if have == want => CONTENT_TYPE_BOOST,
        _ => 0.0,
    }
}

/// Personalized ("for you") score
pub fn personalized_score(post: &Post, ctx: &RankingContext, config: &FeedConfig) -> f64 {
    let age = age_hours(post.published_at, ctx.now);
    let engagement = log_engagement(total_engagement(post, ctx.reactions_for(post.id)));
    let creator = favorite_creator_boost(
        ctx.author_interactions
            .get(&post.author_id)
            .copied()
            .unwrap_or(0),
    );
    let interest = interest_boost(ctx.interest_weight(post));
    let content_type = content_type_boost(post, ctx);
    let recency = recency_tier(age);

    let mut score = engagement * pct(config.foryou_engagement_pct)
        + interest * pct(config.foryou_interest_pct)
        + creator * pct(config.foryou_creator_pct)
        + content_type * pct(config.foryou_content_type_pct)
        + recency * pct(config.foryou_recency_pct);

    if post.author_id == ctx.viewer_id {
        score += OWN_POST_BONUS;
    }
    if post.is_premium() {
        score += PREMIUM_BONUS;
    }

    score * ctx.boost_for(post.author_id)
}

/// Discovery score: interest match + log engagement + recency tiers, weighted by
/// the discovery percentages. Also scores interest-matched posts in the
/// interest-based strategy.
pub fn discovery_score(post: &Post, ctx: &RankingContext, config: &FeedConfig) -> f64 {
    let age = age_hours(post.published_at, ctx.now);
    let interest = ctx
        .interest_weight(post)
        .map(|w| w.clamp(0.0, 1.0) * INTEREST_SCALE)
        .unwrap_or(0.0);
    let engagement = log_engagement(total_engagement(post, ctx.reactions_for(post.id)));

    interest * pct(config.discovery_interest_pct)
        + engagement * pct(config.discovery_engagement_pct)
        + recency_tier(age) * pct(config.discovery_recency_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::fixtures::{context, post};
    use crate::feed::models::{MediaType, Side};

    #[test]
    fn test_decay_matches_documented_points() {
        assert!((decay(1.0, 0.95, 6.0) - 0.95f64.powf(1.0 / 6.0)).abs() < 1e-12);
        assert!((decay(48.0, 0.95, 6.0) - 0.95f64.powi(8)).abs() < 1e-12);
        assert!((decay(0.0, 0.95, 6.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_engagement_saturates_on_extreme_counters() {
        let mut p = post(1, 2, 1);
        p.likes = u64::MAX;
        p.comments = 5;
        p.shares = 1;
        assert_eq!(total_engagement(&p, 3), u64::MAX as f64);

        p.likes = 10;
        assert_eq!(total_engagement(&p, 3), 19.0);
    }

    #[test]
    fn test_recency_tiers() {
        assert_eq!(recency_tier(1.0), 50.0);
        assert_eq!(recency_tier(6.0), 25.0);
        assert_eq!(recency_tier(30.0), 10.0);
        assert_eq!(recency_tier(72.0), 0.0);
        assert_eq!(trending_recency_bonus(30.0), 0.0);
        assert_eq!(trending_recency_bonus(23.9), 25.0);
    }

    #[test]
    fn test_trending_prefers_newer_with_equal_engagement() {
        let ctx = context(1, 3);
        let config = FeedConfig::default();
        let mut fresh = post(1, 2, 1);
        let mut stale = post(2, 2, 48);
        for p in [&mut fresh, &mut stale] {
            p.likes = 10;
            p.comments = 2;
        }
        let a = trending_score(&fresh, &ctx, &config);
        let b = trending_score(&stale, &ctx, &config);
        assert!(a > b);
        // 16 * 0.95^(1/6) + 50 vs 16 * 0.95^8
        assert!((a - (16.0 * 0.95f64.powf(1.0 / 6.0) + 50.0)).abs() < 1e-9);
        assert!((b - 16.0 * 0.95f64.powi(8)).abs() < 1e-9);
    }

    #[test]
    fn test_trending_applies_boost_multiplier() {
        let mut ctx = context(1, 3);
        let config = FeedConfig::default();
        let mut p = post(1, 2, 100);
        p.shares = 10;
        let base = trending_score(&p, &ctx, &config);
        ctx.boosts.insert(2, 2.0);
        assert!((trending_score(&p, &ctx, &config) - base * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_favorite_creator_boost_is_capped() {
        assert_eq!(favorite_creator_boost(0), 0.0);
        assert_eq!(favorite_creator_boost(3), 15.0);
        assert_eq!(favorite_creator_boost(40), 50.0);
    }

    #[test]
    fn test_personalized_flat_bonuses_are_unweighted() {
        let ctx = context(7, 1);
        let config = FeedConfig::default();
        let other = post(1, 2, 200);
        let mut own = post(2, 7, 200);
        let base = personalized_score(&other, &ctx, &config);
        assert_eq!(base, 0.0);
        assert_eq!(personalized_score(&own, &ctx, &config), OWN_POST_BONUS);
        own.side = Side::Premium;
        assert_eq!(
            personalized_score(&own, &ctx, &config),
            OWN_POST_BONUS + PREMIUM_BONUS
        );
    }

    #[test]
    fn test_personalized_missing_optional_fields_score_as_no_match() {
        let mut ctx = context(7, 1);
        ctx.preferred_media_type = Some(MediaType::Video);
        ctx.interests.insert(3, 1.0);
        let config = FeedConfig::default();
        let bare = post(1, 2, 200);
        assert_eq!(personalized_score(&bare, &ctx, &config), 0.0);

        let mut matched = bare.clone();
        matched.media_type = Some(MediaType::Video);
        matched.category_id = Some(3);
        let expected = CONTENT_TYPE_BOOST * 0.10 + 60.0 * 0.25;
        assert!((personalized_score(&matched, &ctx, &config) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_discovery_score_weights() {
        let mut ctx = context(1, 1);
        ctx.interests.insert(4, 0.5);
        let config = FeedConfig::default();
        let mut p = post(1, 2, 2);
        p.category_id = Some(4);
        let expected = 50.0 * 0.5 + 0.0 + 50.0 * 0.2;
        assert!((discovery_score(&p, &ctx, &config) - expected).abs() < 1e-9);
    }
}
