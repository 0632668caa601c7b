//! Eligibility filtering
//!
//! Applied to every source before merging and again to the preview pool.

use std::collections::HashSet;

use super::models::{Post, PostId, RankingContext};

/// Why a post was dropped, for the per-request debug summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadySeen,
    BlockedAuthor,
    RestrictedContent,
}

pub struct EligibilityFilter<'a> {
    ctx: &'a RankingContext,
    seen: &'a HashSet<PostId>,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(ctx: &'a RankingContext, seen: &'a HashSet<PostId>) -> Self {
        Self { ctx, seen }
    }

    pub fn check(&self, post: &Post) -> Result<(), Rejection> {
        if self.seen.contains(&post.id) {
            return Err(Rejection::AlreadySeen);
        }
        if self.ctx.blocked.contains(&post.author_id) {
            return Err(Rejection::BlockedAuthor);
        }
        if self.ctx.public_only && post.is_premium() {
            return Err(Rejection::RestrictedContent);
        }
        Ok(())
    }

    pub fn admits(&self, post: &Post) -> bool {
        self.check(post).is_ok()
    }

    /// Keep admitted posts in their original order
    pub fn apply(&self, posts: Vec<Post>) -> Vec<Post> {
        posts.into_iter().filter(|p| self.admits(p)).collect()
    }
}
