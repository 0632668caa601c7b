//! Creator diversity interleaving
//!
//! Post-ranking pass that keeps any creator from occupying more than
//! `max_consecutive` slots in a row. Posts are bucketed into per-creator FIFO
//! queues (preserving rank order within a creator) and drained round-robin in
//! first-appearance order.
//!
//! When only one creator still has posts the cap is relaxed and the rest of
//! that queue is emitted back to back: dropping content would be worse than
//! a long run at the tail of the feed.

use std::collections::{HashMap, VecDeque};

use super::models::{Post, UserId};

pub fn interleave(ranked: Vec<Post>, max_consecutive: usize) -> Vec<Post> {
    let max_consecutive = max_consecutive.max(1);
    if ranked.len() <= 1 {
        return ranked;
    }

    let total = ranked.len();
    let mut order: Vec<UserId> = Vec::new();
    let mut queues: HashMap<UserId, VecDeque<Post>> = HashMap::new();
    for post in ranked {
        let queue = queues.entry(post.author_id).or_insert_with(|| {
            order.push(post.author_id);
            VecDeque::new()
        });
        queue.push_back(post);
    }

    let mut out: Vec<Post> = Vec::with_capacity(total);
    let mut last_author: Option<UserId> = None;
    let mut run = 0usize;

    while out.len() < total {
        let mut progressed = false;

        for author in &order {
            let Some(queue) = queues.get_mut(author) else {
                continue;
            };
            // Take from this creator until its queue empties or it hits the cap
            while !queue.is_empty() {
                let same = last_author == Some(*author);
                if same && run >= max_consecutive {
                    break;
                }
                if let Some(post) = queue.pop_front() {
                    run = if same { run + 1 } else { 1 };
                    last_author = Some(*author);
                    out.push(post);
                    progressed = true;
                }
                if run >= max_consecutive {
                    break;
                }
            }
        }

        if !progressed {
            // Only the capped creator has posts left
            for author in &order {
                if let Some(queue) = queues.get_mut(author) {
                    out.extend(queue.drain(..));
                }
            }
        }
    }

    out
}

/// Longest run of consecutive posts by one creator
pub fn longest_creator_run(posts: &[Post]) -> usize {
    let mut longest = 0;
    let mut run = 0;
    let mut last: Option<UserId> = None;
    for post in posts {
        if last == Some(post.author_id) {
            run += 1;
        } else {
            run = 1;
            last = Some(post.author_id);
        }
        longest = longest.max(run);
    }
    longest
}
