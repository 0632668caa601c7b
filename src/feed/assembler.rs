//! Feed assembly
//!
//! Orchestrates one feed request end to end:
//!
//! 1. Resolve configuration, seed and ranking strategy
//! 2. Load the viewer's context (subscriptions, blocks, interests, history)
//! 3. Fetch every source concurrently and enrich candidates with reactions/boosts
//! 4. Filter, merge first-seen-wins in priority order, cap discovery
//! 5. Rank, interleave for creator diversity, inject locked previews
//! 6. Slice the page
//!
//! Collaborator failures never reach the caller; every lookup degrades to an
//! empty/default value and the request continues with what it has.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::config_cache::FeedConfigCache;
use super::diversity;
use super::feed_config::FeedConfig;
use super::filter::EligibilityFilter;
use super::metrics::{FeedMetrics, PerformanceTimer, QualityAnalyzer};
use super::models::{
    FeedRequest, FeedResult, Interaction, MediaType, Post, PostId, RankingContext, Side, UserId,
};
use super::preview;
use super::ranking::{AlgorithmCode, Ranker, RankerRegistry};
use super::repository::{
    AlgorithmStore, ContentRepository, InteractionHistory, InterestStore, SocialGraph, SourceKind,
};
use super::scoring;
use super::sources::{SourceAggregator, SourceBatch};
use super::tiebreak::{day_seed, rank_by_score};
use crate::config::FeedServiceConfig;
use crate::error::{Error, Result};

/// Merge priority for the main candidate list
const MAIN_SOURCES: [SourceKind; 4] = [
    SourceKind::Own,
    SourceKind::PaidSubscriptions,
    SourceKind::FreeSubscriptions,
    SourceKind::Purchased,
];

/// Everything the assembler reads from outside
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentRepository>,
    pub social: Arc<dyn SocialGraph>,
    pub interactions: Arc<dyn InteractionHistory>,
    pub interests: Arc<dyn InterestStore>,
    pub algorithms: Arc<dyn AlgorithmStore>,
}

impl Collaborators {
    /// One backing store serving every role
    pub fn shared<T>(store: Arc<T>) -> Self
    where
        T: ContentRepository
            + SocialGraph
            + InteractionHistory
            + InterestStore
            + AlgorithmStore
            + 'static,
    {
        Self {
            content: store.clone(),
            social: store.clone(),
            interactions: store.clone(),
            interests: store.clone(),
            algorithms: store,
        }
    }
}

/// Strategy picked for a request plus the stored profile it came from
struct ResolvedAlgorithm {
    ranker: Arc<dyn Ranker>,
    profile_id: Option<i64>,
}

#[derive(Clone)]
pub struct FeedAssembler {
    collaborators: Collaborators,
    config_cache: Arc<FeedConfigCache>,
    registry: RankerRegistry,
    aggregator: SourceAggregator,
    settings: FeedServiceConfig,
}

impl FeedAssembler {
    pub fn new(
        collaborators: Collaborators,
        config_cache: Arc<FeedConfigCache>,
        settings: FeedServiceConfig,
    ) -> Self {
        let aggregator = SourceAggregator::new(collaborators.content.clone(), settings.source_timeout);
        Self {
            collaborators,
            config_cache,
            registry: RankerRegistry::default(),
            aggregator,
            settings,
        }
    }

    /// Replace the built-in strategy set
    pub fn with_registry(mut self, registry: RankerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config_cache(&self) -> &Arc<FeedConfigCache> {
        &self.config_cache
    }

    /// Assemble one page of the viewer's feed. Always returns a valid, possibly
    /// empty, result.
    #[instrument(skip(self, request), fields(viewer = request.viewer_id))]
    pub async fn get_feed(&self, request: FeedRequest) -> FeedResult {
        self.get_feed_at(request, Utc::now()).await
    }

    /// [`get_feed`](Self::get_feed) with an explicit reference instant
    pub async fn get_feed_at(&self, request: FeedRequest, now: DateTime<Utc>) -> FeedResult {
        let timer = PerformanceTimer::new("get_feed");
        let mut stats = FeedMetrics::for_viewer(request.viewer_id);

        let page_size = self.settings.clamp_page_size(request.page_size);
        let seed = request
            .seed
            .unwrap_or_else(|| day_seed(request.viewer_id, now));

        let (config, algorithm) = tokio::join!(
            self.config_cache.get(),
            self.resolve_algorithm(request.viewer_id)
        );
        let code = algorithm.ranker.code();
        stats.algorithm = code.to_string();

        let stage = PerformanceTimer::new("load_context");
        let mut ctx = self.load_context(request.viewer_id, seed, now).await;
        stats.context_fetch_ms = stage.elapsed_ms();
        drop(stage);

        let stage = PerformanceTimer::new("fetch_sources");
        let mut batch = self.aggregator.fetch_all(&ctx, &config).await;
        self.enrich_candidates(&mut ctx, &batch).await;
        stats.source_fetch_ms = stage.elapsed_ms();
        drop(stage);

        for kind in SourceKind::ALL {
            stats
                .candidates_per_source
                .insert(kind.to_string(), batch.len(kind));
        }
        stats.failed_sources = batch.failed.iter().map(|k| k.to_string()).collect();

        let stage = PerformanceTimer::new("rank");
        let filter = EligibilityFilter::new(&ctx, &request.seen_ids);
        let fetched = batch.total();

        let mut candidates = merge_sources(&mut batch, &filter);
        let mut taken: HashSet<PostId> = candidates.iter().map(|p| p.id).collect();

        let discovery = select_discovery(
            batch.take(SourceKind::DiscoveryPublic),
            &filter,
            &taken,
            &ctx,
            &config,
            config.discovery_count,
        );
        taken.extend(discovery.iter().map(|p| p.id));
        candidates.extend(discovery);

        let previews = select_previews(
            batch.take(SourceKind::DiscoveryPremium),
            &filter,
            &taken,
            &ctx,
            &config,
        );

        stats.candidates_ranked = candidates.len();
        stats.rejected = fetched.saturating_sub(candidates.len() + previews.len());

        if candidates.is_empty() && previews.is_empty() {
            debug!("No eligible candidates for viewer {}", request.viewer_id);
            self.record_request(&algorithm, code, 0);
            stats.total_duration_ms = timer.elapsed_ms();
            self.log_summary(&stats, &config);
            return FeedResult::empty(seed, code.as_str());
        }

        let ranked = self
            .rank_blocking(algorithm.ranker.clone(), candidates, &ctx, &config)
            .await;
        let diversified = diversity::interleave(ranked, config.diversity_max_consecutive);
        let injected = preview::inject(
            diversified,
            previews,
            config.preview_count,
            config.preview_interval,
        );
        stats.ranking_ms = stage.elapsed_ms();
        drop(stage);

        let has_more = injected.posts.len() > page_size;
        let posts: Vec<Post> = injected.posts.into_iter().take(page_size).collect();
        let locked_ids: HashSet<PostId> = posts
            .iter()
            .map(|p| p.id)
            .filter(|id| injected.locked_ids.contains(id))
            .collect();

        self.record_request(&algorithm, code, posts.len());

        stats.record_page(&posts, locked_ids.len());
        stats.total_duration_ms = timer.elapsed_ms();
        timer.log_if_slow(200);
        self.log_summary(&stats, &config);

        FeedResult {
            posts,
            has_more,
            locked_ids,
            seed,
            algorithm: code.to_string(),
        }
    }

    /// User preference if active, then the platform default if active, then chronological
    async fn resolve_algorithm(&self, viewer_id: UserId) -> ResolvedAlgorithm {
        let store = &self.collaborators.algorithms;

        let mut profile = match store.user_algorithm(viewer_id).await {
            Ok(Some(p)) if p.is_active => Some(p),
            Ok(Some(p)) => {
                debug!("Algorithm '{}' is inactive, using platform default", p.code);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load algorithm preference for {}: {}", viewer_id, e);
                None
            }
        };

        if profile.is_none() {
            profile = match store.default_algorithm().await {
                Ok(Some(p)) if p.is_active => Some(p),
                Ok(_) => None,
                Err(e) => {
                    warn!("Failed to load default algorithm: {}", e);
                    None
                }
            };
        }

        match profile {
            Some(p) => ResolvedAlgorithm {
                ranker: self.registry.resolve(&p.code),
                profile_id: Some(p.id),
            },
            None => ResolvedAlgorithm {
                ranker: self.registry.get(AlgorithmCode::Chronological),
                profile_id: None,
            },
        }
    }

    /// Scoring is CPU-bound, so it runs on the blocking pool
    async fn rank_blocking(
        &self,
        ranker: Arc<dyn Ranker>,
        candidates: Vec<Post>,
        ctx: &RankingContext,
        config: &FeedConfig,
    ) -> Vec<Post> {
        if candidates.is_empty() {
            return candidates;
        }
        let ctx = ctx.clone();
        let config = config.clone();
        match tokio::task::spawn_blocking(move || ranker.rank(candidates, &ctx, &config)).await {
            Ok(ranked) => ranked,
            Err(e) => {
                tracing::error!("Ranking task failed: {}", Error::internal(e));
                Vec::new()
            }
        }
    }

    fn record_request(&self, algorithm: &ResolvedAlgorithm, code: AlgorithmCode, served: usize) {
        if let Some(id) = algorithm.profile_id {
            self.record_usage(id);
        }
        metrics::counter!("feed_requests_total", "algorithm" => code.as_str()).increment(1);
        metrics::counter!("feed_items_served_total").increment(served as u64);
    }

    /// Fire-and-forget; lost increments are acceptable
    fn record_usage(&self, algorithm_id: i64) {
        let store = self.collaborators.algorithms.clone();
        tokio::spawn(async move {
            if let Err(e) = store.increment_usage(algorithm_id).await {
                debug!("Failed to increment usage for algorithm {}: {}", algorithm_id, e);
            }
        });
    }

    async fn load_context(&self, viewer_id: UserId, seed: i64, now: DateTime<Utc>) -> RankingContext {
        let social = &self.collaborators.social;
        let history = &self.collaborators.interactions;
        let limit = self.settings.interaction_history_limit;

        let (subscriptions, blocked, hides_premium, likes, comments, purchased, interests) = tokio::join!(
            social.active_subscriptions(viewer_id),
            social.blocked_user_ids(viewer_id),
            social.hides_premium(viewer_id),
            history.recent_likes(viewer_id, limit),
            history.recent_comments(viewer_id, limit),
            history.purchased_post_ids(viewer_id),
            self.collaborators.interests.weighted_interests(viewer_id),
        );

        let mut ctx = RankingContext::new(viewer_id, seed, now);

        for sub in degrade("subscriptions", subscriptions) {
            match sub.side {
                Side::Premium => ctx.followed_premium.insert(sub.creator_id),
                Side::Public => ctx.followed_public.insert(sub.creator_id),
            };
        }
        ctx.blocked = degrade("blocked_users", blocked).into_iter().collect();
        // Unknown preference is treated as opted out
        ctx.public_only = match hides_premium {
            Ok(hides) => hides,
            Err(e) => {
                warn!("Failed to load content preference for {}: {}", viewer_id, e);
                true
            }
        };
        ctx.purchased = degrade("purchases", purchased).into_iter().collect();
        ctx.interests = degrade("interests", interests);

        let mut history = degrade("recent_likes", likes);
        history.extend(degrade("recent_comments", comments));
        ctx.author_interactions = interactions_per_author(&history);
        ctx.preferred_media_type = preferred_media_type(&history);

        ctx
    }

    /// Reaction counts and boost multipliers, fetched for the candidates only
    async fn enrich_candidates(&self, ctx: &mut RankingContext, batch: &SourceBatch) {
        let mut post_ids: Vec<PostId> = batch.all_posts().map(|p| p.id).collect();
        post_ids.sort_unstable();
        post_ids.dedup();
        let mut author_ids: Vec<UserId> = batch.all_posts().map(|p| p.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        if post_ids.is_empty() {
            return;
        }

        let history = &self.collaborators.interactions;
        let (reactions, boosts) = tokio::join!(
            history.reaction_counts(&post_ids),
            history.author_boost_multipliers(&author_ids),
        );
        ctx.reaction_counts = degrade("reaction_counts", reactions);
        ctx.boosts = degrade("boost_multipliers", boosts);
    }

    fn log_summary(&self, metrics: &FeedMetrics, config: &FeedConfig) {
        debug!(
            request_id = %metrics.request_id,
            algorithm = %metrics.algorithm,
            candidates = metrics.candidates_ranked,
            rejected = metrics.rejected,
            served = metrics.posts_returned,
            locked = metrics.locked_returned,
            creators = metrics.unique_creators,
            total_ms = metrics.total_duration_ms,
            "Feed assembled"
        );
        for issue in QualityAnalyzer::detect_issues(metrics, config.diversity_max_consecutive) {
            debug!(request_id = %metrics.request_id, "Feed quality: {}", issue);
        }
    }
}

/// Log and swallow a failed lookup
fn degrade<T: Default>(what: &'static str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            if e.is_error_level() {
                tracing::error!("Lookup '{}' failed, continuing without it: {}", what, e);
            } else {
                warn!("Lookup '{}' failed, continuing without it: {}", what, e);
            }
            metrics::counter!("feed_source_failures_total", "source" => what).increment(1);
            T::default()
        }
    }
}

/// Filter the main sources and merge them in priority order; the first source
/// a post appears in wins
pub(crate) fn merge_sources(batch: &mut SourceBatch, filter: &EligibilityFilter<'_>) -> Vec<Post> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for kind in MAIN_SOURCES {
        for post in filter.apply(batch.take(kind)) {
            if seen.insert(post.id) {
                merged.push(post);
            }
        }
    }
    merged
}

/// Score a discovery pool and keep the best `cap`. Without recorded interests
/// the pool is ordered by raw engagement.
pub(crate) fn select_discovery(
    pool: Vec<Post>,
    filter: &EligibilityFilter<'_>,
    taken: &HashSet<PostId>,
    ctx: &RankingContext,
    config: &FeedConfig,
    cap: usize,
) -> Vec<Post> {
    let mut unique = HashSet::new();
    let scored: Vec<(f64, Post)> = filter
        .apply(pool)
        .into_iter()
        .filter(|p| !taken.contains(&p.id) && unique.insert(p.id))
        .map(|p| {
            let score = if ctx.interests.is_empty() {
                scoring::total_engagement(&p, ctx.reactions_for(p.id))
            } else {
                scoring::discovery_score(&p, ctx, config)
            };
            (score, p)
        })
        .collect();

    let mut ranked = rank_by_score(scored, ctx.seed);
    ranked.truncate(cap);
    ranked
}

/// Locked preview candidates: premium posts the viewer cannot already open
pub(crate) fn select_previews(
    pool: Vec<Post>,
    filter: &EligibilityFilter<'_>,
    taken: &HashSet<PostId>,
    ctx: &RankingContext,
    config: &FeedConfig,
) -> Vec<Post> {
    if ctx.public_only {
        return Vec::new();
    }
    let locked: Vec<Post> = pool
        .into_iter()
        .filter(|p| {
            p.is_premium()
                && p.author_id != ctx.viewer_id
                && !ctx.subscribed_premium(p.author_id)
                && !ctx.purchased.contains(&p.id)
        })
        .collect();
    select_discovery(locked, filter, taken, ctx, config, config.preview_pool_size)
}

fn interactions_per_author(history: &[Interaction]) -> HashMap<UserId, u32> {
    let mut counts = HashMap::new();
    for interaction in history {
        *counts.entry(interaction.author_id).or_insert(0) += 1;
    }
    counts
}

/// Most-interacted media type; ties go to the earlier type in declaration order
fn preferred_media_type(history: &[Interaction]) -> Option<MediaType> {
    const ORDER: [MediaType; 4] = [
        MediaType::Text,
        MediaType::Image,
        MediaType::Video,
        MediaType::Audio,
    ];
    let mut best: Option<(MediaType, usize)> = None;
    for media in ORDER {
        let count = history.iter().filter(|i| i.media_type == Some(media)).count();
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((media, count));
        }
    }
    best.map(|(media, _)| media)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::fixtures::{context, post};

    fn interaction(post_id: PostId, author_id: UserId, media: Option<MediaType>) -> Interaction {
        Interaction {
            post_id,
            author_id,
            media_type: media,
        }
    }

    #[test]
    fn test_preferred_media_type() {
        let history = vec![
            interaction(1, 2, Some(MediaType::Video)),
            interaction(2, 2, Some(MediaType::Image)),
            interaction(3, 3, Some(MediaType::Video)),
            interaction(4, 3, None),
        ];
        assert_eq!(preferred_media_type(&history), Some(MediaType::Video));
        assert_eq!(preferred_media_type(&[]), None);

        let tied = vec![
            interaction(1, 2, Some(MediaType::Audio)),
            interaction(2, 2, Some(MediaType::Image)),
        ];
        assert_eq!(preferred_media_type(&tied), Some(MediaType::Image));
    }

    #[test]
    fn test_interactions_per_author() {
        let history = vec![interaction(1, 2, None), interaction(2, 2, None), interaction(3, 5, None)];
        let counts = interactions_per_author(&history);
        assert_eq!(counts[&2], 2);
        assert_eq!(counts[&5], 1);
    }

    #[test]
    fn test_merge_is_first_seen_wins_in_priority_order() {
        let ctx = context(1, 1);
        let seen = HashSet::new();
        let filter = EligibilityFilter::new(&ctx, &seen);

        let mut batch = SourceBatch::default();
        batch.insert(SourceKind::Purchased, vec![post(7, 4, 1), post(8, 4, 1)]);
        batch.insert(SourceKind::Own, vec![post(1, 1, 1)]);
        batch.insert(SourceKind::PaidSubscriptions, vec![post(7, 4, 1), post(5, 4, 1)]);

        let merged = merge_sources(&mut batch, &filter);
        let ids: Vec<_> = merged.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 7, 5, 8]);
    }

    #[test]
    fn test_discovery_without_interests_sorts_by_engagement_and_caps() {
        let ctx = context(1, 9);
        let seen = HashSet::new();
        let filter = EligibilityFilter::new(&ctx, &seen);
        let pool: Vec<Post> = (1..=5)
            .map(|id| {
                let mut p = post(id, 10 + id, 2);
                p.likes = id as u64 * 10;
                p
            })
            .collect();
        let taken: HashSet<PostId> = [5].into_iter().collect();

        let picked = select_discovery(pool, &filter, &taken, &ctx, &FeedConfig::default(), 2);
        let ids: Vec<_> = picked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[test]
    fn test_previews_skip_subscribed_purchased_and_public() {
        let mut ctx = context(1, 9);
        ctx.followed_premium.insert(20);
        ctx.purchased.insert(3);
        let seen = HashSet::new();
        let filter = EligibilityFilter::new(&ctx, &seen);

        let premium = |id: PostId, author: UserId| {
            let mut p = post(id, author, 1);
            p.side = Side::Premium;
            p
        };
        let pool = vec![premium(1, 20), premium(2, 30), premium(3, 31), post(4, 32, 1)];

        let mut config = FeedConfig::default();
        config.preview_pool_size = 10;
        let picked = select_previews(pool, &filter, &HashSet::new(), &ctx, &config);
        let ids: Vec<_> = picked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2]);

        ctx.public_only = true;
        let filter = EligibilityFilter::new(&ctx, &seen);
        assert!(select_previews(vec![premium(2, 30)], &filter, &HashSet::new(), &ctx, &config).is_empty());
    }
}
