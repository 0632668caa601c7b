//! FanFeed library crate
//!
//! Feed assembly and ranking for a subscription content platform. The presentation
//! layer calls [`FeedAssembler::get_feed`] with a seed obtained from
//! [`get_or_create_seed`]; everything else is injected through the collaborator
//! traits in [`feed::repository`].

pub mod config;
pub mod database;
pub mod error;
pub mod feed;

// Re-export commonly used types
pub use config::{Config, FeedServiceConfig};
pub use database::Database;
pub use error::{Error, Result};
pub use feed::{
    get_or_create_seed, Collaborators, FeedAssembler, FeedConfig, FeedConfigCache, FeedRequest,
    FeedResult, PgFeedStore,
};
