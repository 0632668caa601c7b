//! Postgres-backed collaborators
//!
//! `PgFeedStore` implements every read the feed core needs against the schema in
//! `migrations/`. All queries are bounded by a `LIMIT` or by the id list they are
//! given.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::feed_config::FeedConfig;
use super::models::{
    AlgorithmProfile, CategoryId, Interaction, MediaType, Post, PostId, Side, Subscription, UserId,
    Visibility,
};
use super::repository::{
    AlgorithmStore, ConfigStore, ContentRepository, InteractionHistory, InterestStore,
    SocialGraph, SourceKind, SourceQuery,
};
use crate::database::Database;
use crate::error::Result;

/// Upper bound for per-viewer lookups (subscriptions, blocks, purchases, interests)
const VIEWER_LOOKUP_LIMIT: i64 = 5_000;
const CONFIG_ROW_LIMIT: i64 = 500;

const POST_COLUMNS: &str = "id, author_id, published_at, side, is_draft, is_active, is_censored, \
     visibility, likes, comments, views, shares, category_id, music_track_id, media_type";

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    author_id: i64,
    published_at: chrono::DateTime<chrono::Utc>,
    side: String,
    is_draft: bool,
    is_active: bool,
    is_censored: bool,
    visibility: String,
    likes: i64,
    comments: i64,
    views: i64,
    shares: i64,
    category_id: Option<i64>,
    music_track_id: Option<i64>,
    media_type: Option<String>,
}

impl PostRow {
    /// Rows with an unknown side are skipped rather than guessed
    fn into_post(self) -> Option<Post> {
        let side = match self.side.parse::<Side>() {
            Ok(side) => side,
            Err(e) => {
                warn!("Skipping post {}: {}", self.id, e);
                return None;
            }
        };
        let visibility = if self.visibility.eq_ignore_ascii_case("public") {
            Visibility::Public
        } else {
            Visibility::Private
        };
        Some(Post {
            id: self.id,
            author_id: self.author_id,
            published_at: self.published_at,
            side,
            is_draft: self.is_draft,
            is_active: self.is_active,
            is_censored: self.is_censored,
            visibility,
            likes: self.likes.max(0) as u64,
            comments: self.comments.max(0) as u64,
            views: self.views.max(0) as u64,
            shares: self.shares.max(0) as u64,
            category_id: self.category_id,
            music_track_id: self.music_track_id,
            media_type: self.media_type.and_then(|m| m.parse::<MediaType>().ok()),
        })
    }
}

#[derive(Debug, FromRow)]
struct AlgorithmRow {
    id: i64,
    code: String,
    display_name: String,
    is_default: bool,
    is_active: bool,
    usage_count: i64,
}

impl From<AlgorithmRow> for AlgorithmProfile {
    fn from(row: AlgorithmRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            display_name: row.display_name,
            is_default: row.is_default,
            is_active: row.is_active,
            usage_count: row.usage_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct InteractionRow {
    post_id: i64,
    author_id: i64,
    media_type: Option<String>,
}

impl From<InteractionRow> for Interaction {
    fn from(row: InteractionRow) -> Self {
        Self {
            post_id: row.post_id,
            author_id: row.author_id,
            media_type: row.media_type.and_then(|m| m.parse().ok()),
        }
    }
}

/// Render a source query as SQL; every optional filter becomes a bound parameter
fn build_post_query(query: &SourceQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM posts WHERE is_active AND NOT is_censored",
        POST_COLUMNS
    ));

    if !query.include_drafts {
        qb.push(" AND NOT is_draft");
    }
    if let Some(authors) = &query.author_ids {
        qb.push(" AND author_id = ANY(");
        qb.push_bind(authors.iter().copied().collect::<Vec<UserId>>());
        qb.push(")");
    }
    if !query.exclude_author_ids.is_empty() {
        qb.push(" AND author_id <> ALL(");
        qb.push_bind(query.exclude_author_ids.iter().copied().collect::<Vec<UserId>>());
        qb.push(")");
    }
    if let Some(ids) = &query.post_ids {
        qb.push(" AND id = ANY(");
        qb.push_bind(ids.iter().copied().collect::<Vec<PostId>>());
        qb.push(")");
    }
    if let Some(side) = query.side {
        qb.push(" AND side = ");
        qb.push_bind(side.as_str());
    }
    if query.public_visibility_only {
        qb.push(" AND visibility = 'public'");
    }
    if let Some(after) = query.published_after {
        qb.push(" AND published_at >= ");
        qb.push_bind(after);
    }

    match query.kind {
        // Discovery pools are rescored downstream; fetch the most engaged first
        SourceKind::DiscoveryPublic | SourceKind::DiscoveryPremium => {
            qb.push(" ORDER BY likes + comments * 2 DESC, published_at DESC, id DESC");
        }
        _ => {
            qb.push(" ORDER BY published_at DESC, id DESC");
        }
    }
    qb.push(" LIMIT ");
    qb.push_bind(query.limit as i64);
    qb
}

#[derive(Clone)]
pub struct PgFeedStore {
    pool: PgPool,
}

impl PgFeedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }
}

#[async_trait]
impl ContentRepository for PgFeedStore {
    async fn query_posts(&self, query: &SourceQuery) -> Result<Vec<Post>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }
        let rows: Vec<PostRow> = build_post_query(query)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        debug!("Source {} fetched {} rows", query.kind, rows.len());
        Ok(rows.into_iter().filter_map(PostRow::into_post).collect())
    }
}

#[async_trait]
impl SocialGraph for PgFeedStore {
    async fn active_subscriptions(&self, viewer_id: UserId) -> Result<Vec<Subscription>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT creator_id, side FROM subscriptions
            WHERE subscriber_id = $1 AND is_active
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT $2
            "#,
        )
        .bind(viewer_id)
        .bind(VIEWER_LOOKUP_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(creator_id, side)| {
                side.parse()
                    .ok()
                    .map(|side| Subscription { creator_id, side })
            })
            .collect())
    }

    /// Blocks apply both ways
    async fn blocked_user_ids(&self, viewer_id: UserId) -> Result<Vec<UserId>> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT blocked_id FROM user_blocks WHERE blocker_id = $1
            UNION
            SELECT blocker_id FROM user_blocks WHERE blocked_id = $1
            LIMIT $2
            "#,
        )
        .bind(viewer_id)
        .bind(VIEWER_LOOKUP_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn hides_premium(&self, viewer_id: UserId) -> Result<bool> {
        let hides: Option<bool> =
            sqlx::query_scalar("SELECT hide_premium FROM user_preferences WHERE user_id = $1")
                .bind(viewer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hides.unwrap_or(false))
    }
}

#[async_trait]
impl InteractionHistory for PgFeedStore {
    async fn recent_likes(&self, viewer_id: UserId, limit: usize) -> Result<Vec<Interaction>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            r#"
            SELECT l.post_id, p.author_id, p.media_type
            FROM post_likes l
            JOIN posts p ON p.id = l.post_id
            WHERE l.user_id = $1
            ORDER BY l.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(viewer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Interaction::from).collect())
    }

    async fn recent_comments(&self, viewer_id: UserId, limit: usize) -> Result<Vec<Interaction>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            r#"
            SELECT c.post_id, p.author_id, p.media_type
            FROM post_comments c
            JOIN posts p ON p.id = c.post_id
            WHERE c.user_id = $1
            ORDER BY c.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(viewer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Interaction::from).collect())
    }

    async fn purchased_post_ids(&self, viewer_id: UserId) -> Result<Vec<PostId>> {
        let ids = sqlx::query_scalar(
            "SELECT post_id FROM purchases WHERE buyer_id = $1 ORDER BY purchased_at DESC LIMIT $2",
        )
        .bind(viewer_id)
        .bind(VIEWER_LOOKUP_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn reaction_counts(&self, post_ids: &[PostId]) -> Result<HashMap<PostId, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT post_id, COUNT(*) FROM post_reactions WHERE post_id = ANY($1) GROUP BY post_id",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, count)| (id, count.max(0) as u64))
            .collect())
    }

    async fn author_boost_multipliers(&self, author_ids: &[UserId]) -> Result<HashMap<UserId, f64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, f64)> = sqlx::query_as(
            r#"
            SELECT creator_id, MAX(multiplier)
            FROM creator_boosts
            WHERE creator_id = ANY($1) AND starts_at <= NOW() AND ends_at > NOW()
            GROUP BY creator_id
            "#,
        )
        .bind(author_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl InterestStore for PgFeedStore {
    async fn weighted_interests(&self, viewer_id: UserId) -> Result<HashMap<CategoryId, f64>> {
        let rows: Vec<(i64, f64)> = sqlx::query_as(
            "SELECT category_id, weight FROM user_interests WHERE user_id = $1 ORDER BY weight DESC LIMIT $2",
        )
        .bind(viewer_id)
        .bind(VIEWER_LOOKUP_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl ConfigStore for PgFeedStore {
    async fn feed_config(&self) -> Result<FeedConfig> {
        let rows: Vec<(String, f64, i64)> =
            sqlx::query_as("SELECT key, value, version FROM feed_config LIMIT $1")
                .bind(CONFIG_ROW_LIMIT)
                .fetch_all(&self.pool)
                .await?;
        let version = rows.iter().map(|(_, _, v)| *v).max().unwrap_or(0);
        Ok(FeedConfig::from_entries(
            version,
            rows.into_iter().map(|(key, value, _)| (key, value)),
        ))
    }
}

#[async_trait]
impl AlgorithmStore for PgFeedStore {
    async fn user_algorithm(&self, viewer_id: UserId) -> Result<Option<AlgorithmProfile>> {
        let row: Option<AlgorithmRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.code, a.display_name, a.is_default, a.is_active, a.usage_count
            FROM user_algorithm_preferences p
            JOIN feed_algorithms a ON a.id = p.algorithm_id
            WHERE p.user_id = $1
            "#,
        )
        .bind(viewer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AlgorithmProfile::from))
    }

    async fn default_algorithm(&self) -> Result<Option<AlgorithmProfile>> {
        let row: Option<AlgorithmRow> = sqlx::query_as(
            r#"
            SELECT id, code, display_name, is_default, is_active, usage_count
            FROM feed_algorithms
            WHERE is_default
            ORDER BY id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AlgorithmProfile::from))
    }

    async fn increment_usage(&self, algorithm_id: i64) -> Result<()> {
        sqlx::query("UPDATE feed_algorithms SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(algorithm_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
