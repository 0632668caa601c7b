//! Locked preview injection
//!
//! Splices teaser posts from non-subscribed creators into the diversified
//! stream: after every `interval` main posts, up to `count` previews are
//! dequeued in order. Previews left over when the main stream runs out are
//! appended at the end.

use std::collections::{HashSet, VecDeque};

use super::models::{Post, PostId};

/// Output of [`inject`]: the merged stream plus which ids are locked previews
#[derive(Debug, Clone, Default)]
pub struct Injected {
    pub posts: Vec<Post>,
    pub locked_ids: HashSet<PostId>,
}

pub fn inject(main: Vec<Post>, preview: Vec<Post>, count: usize, interval: usize) -> Injected {
    let locked_ids: HashSet<PostId> = preview.iter().map(|p| p.id).collect();
    if preview.is_empty() {
        return Injected {
            posts: main,
            locked_ids,
        };
    }

    let interval = interval.max(1);
    let mut queue: VecDeque<Post> = preview.into();
    let mut posts = Vec::with_capacity(main.len() + queue.len());

    for (emitted, post) in main.into_iter().enumerate() {
        posts.push(post);
        if (emitted + 1) % interval == 0 {
            for _ in 0..count {
                match queue.pop_front() {
                    Some(p) => posts.push(p),
                    None => break,
                }
            }
        }
    }
    posts.extend(queue);

    Injected { posts, locked_ids }
}
