//! Feed Metrics and Performance Monitoring
//!
//! Per-request bookkeeping for feed assembly: how long each stage took, how many
//! candidates each source produced, and how diverse the served page is.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::models::{Post, UserId};

/// Metrics for a single feed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMetrics {
    pub viewer_id: UserId,
    pub request_id: String,
    pub timestamp: i64,
    pub algorithm: String,

    // Performance metrics
    pub total_duration_ms: u64,
    pub context_fetch_ms: u64,
    pub source_fetch_ms: u64,
    pub ranking_ms: u64,

    // Candidate metrics
    pub candidates_per_source: HashMap<String, usize>,
    pub failed_sources: Vec<String>,
    pub rejected: usize,
    pub candidates_ranked: usize,
    pub posts_returned: usize,
    pub locked_returned: usize,

    // Diversity metrics
    pub unique_creators: usize,
    pub longest_creator_run: usize,
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self {
            viewer_id: 0,
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            algorithm: String::new(),
            total_duration_ms: 0,
            context_fetch_ms: 0,
            source_fetch_ms: 0,
            ranking_ms: 0,
            candidates_per_source: HashMap::new(),
            failed_sources: Vec::new(),
            rejected: 0,
            candidates_ranked: 0,
            posts_returned: 0,
            locked_returned: 0,
            unique_creators: 0,
            longest_creator_run: 0,
        }
    }
}

impl FeedMetrics {
    pub fn for_viewer(viewer_id: UserId) -> Self {
        Self {
            viewer_id,
            ..Default::default()
        }
    }

    /// Fill the served-page fields from the final page
    pub fn record_page(&mut self, page: &[Post], locked: usize) {
        self.posts_returned = page.len();
        self.locked_returned = locked;
        self.unique_creators = page
            .iter()
            .map(|p| p.author_id)
            .collect::<HashSet<_>>()
            .len();
        self.longest_creator_run = super::diversity::longest_creator_run(page);
    }
}

/// Performance timer for tracking operation duration
pub struct PerformanceTimer {
    start: Instant,
    label: String,
}

impl PerformanceTimer {
    pub fn new(label: &str) -> Self {
        Self {
            start: Instant::now(),
            label: label.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn log_if_slow(&self, threshold_ms: u64) {
        let elapsed = self.elapsed_ms();
        if elapsed > threshold_ms {
            tracing::warn!(
                "Slow operation: {} took {}ms (threshold: {}ms)",
                self.label,
                elapsed,
                threshold_ms
            );
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        tracing::debug!("{} completed in {}ms", self.label, elapsed);
    }
}

/// Feed quality analyzer
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    /// Share of distinct creators on the page (0-1, higher is better)
    pub fn diversity_score(unique_creators: usize, total_posts: usize) -> f32 {
        if total_posts == 0 {
            return 0.0;
        }
        unique_creators as f32 / total_posts as f32
    }

    /// Detect potential issues with a served page
    pub fn detect_issues(metrics: &FeedMetrics, max_consecutive: usize) -> Vec<String> {
        let mut issues = Vec::new();

        if !metrics.failed_sources.is_empty() {
            issues.push(format!(
                "Degraded sources: {}",
                metrics.failed_sources.join(", ")
            ));
        }

        if metrics.total_duration_ms > 200 {
            issues.push(format!("Slow response: {}ms", metrics.total_duration_ms));
        }

        // Runs past the cap only happen when a single creator is left
        if metrics.longest_creator_run > max_consecutive {
            issues.push(format!(
                "Creator run of {} exceeds cap {}",
                metrics.longest_creator_run, max_consecutive
            ));
        }

        let diversity = Self::diversity_score(metrics.unique_creators, metrics.posts_returned);
        if metrics.posts_returned >= 10 && diversity < 0.2 {
            issues.push(format!("Low diversity: {:.2}", diversity));
        }

        if metrics.posts_returned > 0 && metrics.locked_returned * 2 > metrics.posts_returned {
            issues.push(format!(
                "Locked previews dominate page: {}/{}",
                metrics.locked_returned, metrics.posts_returned
            ));
        }

        issues
    }
}
