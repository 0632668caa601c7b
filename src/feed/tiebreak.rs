//! Deterministic tie-breaking
//!
//! `tiebreak(post_id, seed)` is a pure function used as the secondary sort key
//! after each strategy's primary key. Equal-score posts therefore resolve the
//! same way for a given seed no matter what order storage returned them in.
//!
//! Formula (portable, 64-bit wrapping arithmetic):
//! ```text
//! x = post_id XOR (seed * 0x9E3779B97F4A7C15)
//! x = fmix64(x)                      // MurmurHash3 finalizer
//! tiebreak = (x >> 32) as i32
//! ```

use chrono::{DateTime, Datelike, Utc};
use std::cmp::Ordering;

use super::models::{Post, PostId, UserId};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// MurmurHash3 64-bit finalizer
fn fmix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

/// Stable, well-distributed 32-bit key for `(post_id, seed)`
pub fn tiebreak(post_id: PostId, seed: i64) -> i32 {
    let mixed = (post_id as u64) ^ (seed as u64).wrapping_mul(GOLDEN_GAMMA);
    (fmix64(mixed) >> 32) as u32 as i32
}

/// Seed used when the caller has no session seed: stable for one viewer for one UTC day
pub fn day_seed(viewer_id: UserId, now: DateTime<Utc>) -> i64 {
    let day = now.year() as i64 * 10_000 + now.month() as i64 * 100 + now.day() as i64;
    let mixed = fmix64((viewer_id as u64).wrapping_mul(GOLDEN_GAMMA) ^ day as u64);
    // Positive 31-bit range, same as session seeds
    (mixed >> 33) as i64
}

/// Secondary ordering: tie-break key ascending, then post id ascending.
///
/// The trailing id comparison makes the order total even when two ids hash to
/// the same 32-bit key.
pub fn compare_tiebreak(a: &Post, b: &Post, seed: i64) -> Ordering {
    tiebreak(a.id, seed)
        .cmp(&tiebreak(b.id, seed))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort `(score, post)` pairs by score descending with deterministic ties
pub fn sort_scored_desc(scored: &mut [(f64, Post)], seed: i64) {
    scored.sort_by(|(sa, a), (sb, b)| {
        sb.total_cmp(sa)
            .then_with(|| compare_tiebreak(a, b, seed))
    });
}

/// Sort by score descending and drop the scores
pub fn rank_by_score(mut scored: Vec<(f64, Post)>, seed: i64) -> Vec<Post> {
    sort_scored_desc(&mut scored, seed);
    scored.into_iter().map(|(_, post)| post).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::fixtures::{now, post};
    use std::collections::HashSet;

    #[test]
    fn test_tiebreak_is_reproducible() {
        assert_eq!(tiebreak(42, 7), tiebreak(42, 7));
        assert_eq!(tiebreak(-3, i64::MAX), tiebreak(-3, i64::MAX));
    }

    #[test]
    fn test_tiebreak_known_values_are_stable() {
        // Reference vectors; any other producer of feed order must reproduce these exactly
        let vectors: [(PostId, i64, i32); 7] = [
            (0, 0, 0),
            (1, 0, -1_269_383_940),
            (1, 1, 632_780_282),
            (42, 7, -1_898_685_256),
            (-3, i64::MAX, -261_702_797),
            (123_456, 2024, 1_442_238_003),
            (7, 123_456_789, 2_053_199_619),
        ];
        for (post_id, seed, expected) in vectors {
            assert_eq!(tiebreak(post_id, seed), expected, "tiebreak({}, {})", post_id, seed);
        }
    }

    #[test]
    fn test_tiebreak_depends_on_seed() {
        let ids: Vec<PostId> = (1..=50).collect();
        let a: Vec<i32> = ids.iter().map(|id| tiebreak(*id, 1)).collect();
        let b: Vec<i32> = ids.iter().map(|id| tiebreak(*id, 2)).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tiebreak_is_well_distributed() {
        let values: HashSet<i32> = (0..10_000).map(|id| tiebreak(id, 99)).collect();
        assert!(values.len() > 9_990);
        let negatives = (0..10_000).filter(|id| tiebreak(*id, 99) < 0).count();
        assert!(negatives > 4_000 && negatives < 6_000);
    }

    #[test]
    fn test_equal_scores_resolve_independent_of_input_order() {
        let posts: Vec<Post> = (1..=20).map(|id| post(id, id % 3, 1)).collect();
        let forward: Vec<(f64, Post)> = posts.iter().cloned().map(|p| (10.0, p)).collect();
        let backward: Vec<(f64, Post)> = posts.iter().rev().cloned().map(|p| (10.0, p)).collect();

        let a: Vec<PostId> = rank_by_score(forward, 5).iter().map(|p| p.id).collect();
        let b: Vec<PostId> = rank_by_score(backward, 5).iter().map(|p| p.id).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_day_seed_changes_with_day_not_time() {
        let morning = now() - chrono::Duration::hours(3);
        assert_eq!(day_seed(9, now()), day_seed(9, morning));
        assert_ne!(day_seed(9, now()), day_seed(9, now() + chrono::Duration::days(1)));
        assert!(day_seed(9, now()) >= 0);
    }
}
