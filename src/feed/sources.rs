//! Source aggregation
//!
//! Builds one bounded query per candidate pool and runs them concurrently.
//! Sources are independent: a failure or timeout in one is logged, counted
//! and treated as an empty pool; the others still contribute.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::Error;

use super::feed_config::FeedConfig;
use super::models::{Post, RankingContext, Side};
use super::repository::{ContentRepository, SourceKind, SourceQuery};

/// Raw candidates per source for one request
#[derive(Debug, Default)]
pub struct SourceBatch {
    pools: HashMap<SourceKind, Vec<Post>>,
    pub failed: Vec<SourceKind>,
}

impl SourceBatch {
    pub fn take(&mut self, kind: SourceKind) -> Vec<Post> {
        self.pools.remove(&kind).unwrap_or_default()
    }

    pub fn len(&self, kind: SourceKind) -> usize {
        self.pools.get(&kind).map(Vec::len).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn insert(&mut self, kind: SourceKind, posts: Vec<Post>) {
        self.pools.insert(kind, posts);
    }

    /// Every post in every pool, for batch lookups of reactions and boosts
    pub fn all_posts(&self) -> impl Iterator<Item = &Post> {
        self.pools.values().flatten()
    }
}

#[derive(Clone)]
pub struct SourceAggregator {
    content: Arc<dyn ContentRepository>,
    timeout: Duration,
}

impl SourceAggregator {
    pub fn new(content: Arc<dyn ContentRepository>, timeout: Duration) -> Self {
        Self { content, timeout }
    }

    /// Queries for every pool that can possibly return something for this viewer
    pub fn build_queries(ctx: &RankingContext, config: &FeedConfig) -> Vec<SourceQuery> {
        let window = (config.recency_window_days > 0)
            .then(|| ctx.now - chrono::Duration::days(config.recency_window_days as i64));
        let viewer: HashSet<_> = [ctx.viewer_id].into_iter().collect();
        let mut queries = Vec::with_capacity(SourceKind::ALL.len());

        let mut own = SourceQuery::new(SourceKind::Own, config.own_limit);
        own.author_ids = Some(viewer.clone());
        own.include_drafts = true;
        queries.push(own);

        if !ctx.followed_premium.is_empty() {
            let mut paid = SourceQuery::new(SourceKind::PaidSubscriptions, config.paid_subscription_limit);
            paid.author_ids = Some(ctx.followed_premium.clone());
            paid.published_after = window;
            queries.push(paid);
        }

        let free_only: HashSet<_> = ctx
            .followed_public
            .difference(&ctx.followed_premium)
            .copied()
            .collect();
        if !free_only.is_empty() {
            let mut free = SourceQuery::new(SourceKind::FreeSubscriptions, config.free_subscription_limit);
            free.author_ids = Some(free_only);
            free.side = Some(Side::Public);
            free.published_after = window;
            queries.push(free);
        }

        if !ctx.purchased.is_empty() {
            let mut purchased = SourceQuery::new(SourceKind::Purchased, config.purchased_limit);
            purchased.post_ids = Some(ctx.purchased.clone());
            queries.push(purchased);
        }

        let mut excluded: HashSet<_> = ctx.blocked.union(&viewer).copied().collect();
        excluded.extend(ctx.followed_public.iter().copied());
        excluded.extend(ctx.followed_premium.iter().copied());

        let mut discovery = SourceQuery::new(SourceKind::DiscoveryPublic, config.discovery_fetch_limit);
        discovery.exclude_author_ids = excluded;
        discovery.side = Some(Side::Public);
        discovery.public_visibility_only = true;
        discovery.published_after = window;
        queries.push(discovery);

        if !ctx.public_only {
            let mut preview = SourceQuery::new(SourceKind::DiscoveryPremium, config.preview_fetch_limit);
            preview.exclude_author_ids = ctx
                .blocked
                .union(&ctx.followed_premium)
                .chain(viewer.iter())
                .copied()
                .collect();
            preview.side = Some(Side::Premium);
            preview.public_visibility_only = true;
            preview.published_after = window;
            queries.push(preview);
        }

        queries.retain(|q| q.limit > 0);
        queries
    }

    /// Run all queries concurrently; never fails as a whole
    pub async fn fetch_all(&self, ctx: &RankingContext, config: &FeedConfig) -> SourceBatch {
        let queries = Self::build_queries(ctx, config);
        let mut pending: Vec<SourceKind> = queries.iter().map(|q| q.kind).collect();
        let mut set = JoinSet::new();

        for query in queries {
            let content = self.content.clone();
            let timeout = self.timeout;
            set.spawn(async move {
                let result = match tokio::time::timeout(timeout, content.query_posts(&query)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::timeout(timeout)),
                };
                (query.kind, query.limit, result)
            });
        }

        let mut batch = SourceBatch::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((kind, limit, Ok(mut posts))) => {
                    pending.retain(|k| *k != kind);
                    posts.truncate(limit);
                    debug!("Source {} returned {} posts", kind, posts.len());
                    batch.insert(kind, posts);
                }
                Ok((kind, _, Err(e))) => {
                    pending.retain(|k| *k != kind);
                    warn!("Source {} failed, continuing without it: {}", kind, e);
                    record_failure(&mut batch, kind);
                }
                Err(e) => error!("Source task aborted: {}", Error::internal(e)),
            }
        }

        // Tasks that panicked never reported their kind
        for kind in pending {
            record_failure(&mut batch, kind);
        }

        batch
    }
}

fn record_failure(batch: &mut SourceBatch, kind: SourceKind) {
    metrics::counter!("feed_source_failures_total", "source" => kind.as_str()).increment(1);
    batch.failed.push(kind);
}
