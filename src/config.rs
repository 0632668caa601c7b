//! Configuration management for the FanFeed engine
//!
//! Process-level configuration (database pool, feed service timings) loaded from
//! environment variables with sensible defaults. The tunable ranking weights live
//! in [`crate::feed::FeedConfig`] and come from the config store at runtime.
//!
//! # Example
//! ```no_run
//! use fanfeed::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("Default page size: {}", config.feed.default_page_size);
//! ```

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Feed assembly configuration
    pub feed: FeedServiceConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections to keep open
    pub min_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout for connections
    pub idle_timeout: Duration,
    /// Maximum lifetime for connections
    pub max_lifetime: Duration,
    pub statement_cache_size: usize,
}

/// Feed service configuration
#[derive(Debug, Clone)]
pub struct FeedServiceConfig {
    /// How long a fetched `FeedConfig` is served before refetching
    pub config_cache_ttl: Duration,
    /// Upper bound for a single source query
    pub source_timeout: Duration,
    /// Page size used when the request asks for zero
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Period of the background config refresher
    pub config_refresh_interval: Duration,
    /// How many recent likes/comments feed the viewer's affinity signals
    pub interaction_history_limit: usize,
}

impl Default for FeedServiceConfig {
    fn default() -> Self {
        Self {
            config_cache_ttl: Duration::from_secs(300),
            source_timeout: Duration::from_secs(2),
            default_page_size: 20,
            max_page_size: 100,
            config_refresh_interval: Duration::from_secs(60),
            interaction_history_limit: 100,
        }
    }
}

impl FeedServiceConfig {
    /// Requested size clamped to `[1, max_page_size]`; zero means default
    pub fn clamp_page_size(&self, requested: usize) -> usize {
        let size = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        size.clamp(1, self.max_page_size.max(1))
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Secrets may be mounted as a directory of files (FFOLDER): file name is
        // the variable name, contents the value.
        if let Ok(folder) = std::env::var("FFOLDER") {
            load_env_folder(&folder);
        } else {
            dotenvy::dotenv().ok();
        }

        let config = Self {
            database: DatabaseConfig::from_env()?,
            feed: FeedServiceConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(Error::InvalidConfig {
                key: "DATABASE_URL",
                message: "database URL cannot be empty".into(),
            });
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be >= min_connections".into(),
            });
        }

        if self.feed.max_page_size == 0 {
            return Err(Error::InvalidConfig {
                key: "FEED_MAX_PAGE_SIZE",
                message: "max page size must be positive".into(),
            });
        }

        if self.feed.default_page_size > self.feed.max_page_size {
            return Err(Error::InvalidConfig {
                key: "FEED_DEFAULT_PAGE_SIZE",
                message: format!(
                    "default page size {} exceeds max {}",
                    self.feed.default_page_size, self.feed.max_page_size
                )
                .into(),
            });
        }

        if self.feed.source_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                key: "FEED_SOURCE_TIMEOUT_MS",
                message: "source timeout must be positive".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary (without sensitive data)
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Database:");
        info!("    URL: {}", mask_url(&self.database.url));
        info!(
            "    Pool Size: {}-{}",
            self.database.min_connections, self.database.max_connections
        );
        info!("  Feed:");
        info!(
            "    Page Size: {} (max {})",
            self.feed.default_page_size, self.feed.max_page_size
        );
        info!("    Source Timeout: {:?}", self.feed.source_timeout);
        info!(
            "    Config Cache TTL: {:?} (refresh every {:?})",
            self.feed.config_cache_ttl, self.feed.config_refresh_interval
        );
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
            format!("postgres://{}@localhost/fanfeed_dev", user)
        });

        Ok(Self {
            url,
            max_connections: get_env_or("DB_MAX_CONNECTIONS", "20").parse().unwrap_or(20),
            min_connections: get_env_or("DB_MIN_CONNECTIONS", "2").parse().unwrap_or(2),
            connect_timeout: Duration::from_secs(
                get_env_or("DB_CONNECT_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            idle_timeout: Duration::from_secs(
                get_env_or("DB_IDLE_TIMEOUT_SECS", "600")
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                get_env_or("DB_MAX_LIFETIME_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            statement_cache_size: get_env_or("DB_STATEMENT_CACHE_SIZE", "100")
                .parse()
                .unwrap_or(100),
        })
    }
}

impl FeedServiceConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            config_cache_ttl: Duration::from_secs(get_env_parsed_or(
                "FEED_CONFIG_CACHE_TTL_SECS",
                defaults.config_cache_ttl.as_secs(),
            )?),
            source_timeout: Duration::from_millis(get_env_parsed_or(
                "FEED_SOURCE_TIMEOUT_MS",
                defaults.source_timeout.as_millis() as u64,
            )?),
            default_page_size: get_env_parsed_or(
                "FEED_DEFAULT_PAGE_SIZE",
                defaults.default_page_size,
            )?,
            max_page_size: get_env_parsed_or("FEED_MAX_PAGE_SIZE", defaults.max_page_size)?,
            config_refresh_interval: Duration::from_secs(get_env_parsed_or(
                "FEED_CONFIG_REFRESH_SECS",
                defaults.config_refresh_interval.as_secs(),
            )?),
            interaction_history_limit: get_env_parsed_or(
                "FEED_INTERACTION_HISTORY_LIMIT",
                defaults.interaction_history_limit,
            )?,
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn load_env_folder(folder: &str) {
    let path = std::path::Path::new(folder);
    if !path.is_dir() {
        log::warn!("FFOLDER {} is not a directory, ignoring", folder);
        return;
    }

    match std::fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let file_path = entry.path();
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                if !file_path.is_file() {
                    continue;
                }
                if let Ok(contents) = std::fs::read_to_string(&file_path) {
                    // Values already present in the environment win
                    if std::env::var(&name).is_err() {
                        std::env::set_var(&name, contents.trim());
                    }
                }
            }
            log::info!("Loaded configuration from FFOLDER={}", folder);
        }
        Err(err) => log::warn!("Failed to read FFOLDER {}: {}", folder, err),
    }
}

/// Get required environment variable
fn get_env(key: &'static str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnvVar { var: key })
}

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable; a present but malformed value is an error
fn get_env_parsed_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| Error::InvalidConfig {
            key,
            message: format!("Invalid value '{}': {}", value, e).into(),
        }),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive parts of URL
fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            // Skip the scheme separator in "postgres://user@host"
            if url[colon_pos..].starts_with("://") {
                return url.to_string();
            }
            return format!("{}****{}", &url[..=colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://feed:secret@db/fanfeed".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout: Duration::from_secs(5),
                idle_timeout: Duration::from_secs(60),
                max_lifetime: Duration::from_secs(300),
                statement_cache_size: 10,
            },
            feed: FeedServiceConfig::default(),
        }
    }

    #[test]
    fn test_mask_url_hides_password() {
        assert_eq!(
            mask_url("postgres://feed:secret@db/fanfeed"),
            "postgres://feed:****@db/fanfeed"
        );
        assert_eq!(mask_url("postgres://feed@db/fanfeed"), "postgres://feed@db/fanfeed");
        assert_eq!(mask_url("postgres://localhost/x"), "postgres://localhost/x");
    }

    #[test]
    fn test_page_size_clamping() {
        let feed = FeedServiceConfig::default();
        assert_eq!(feed.clamp_page_size(0), 20);
        assert_eq!(feed.clamp_page_size(7), 7);
        assert_eq!(feed.clamp_page_size(5000), 100);
    }

    #[test]
    fn test_validate_rejects_inverted_pool() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());
        cfg.database.min_connections = 50;
        assert!(matches!(
            cfg.validate(),
            Err(Error::InvalidConfig { key: "DB_MAX_CONNECTIONS", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_default_page_above_max() {
        let mut cfg = config();
        cfg.feed.default_page_size = 500;
        assert!(matches!(
            cfg.validate(),
            Err(Error::InvalidConfig { key: "FEED_DEFAULT_PAGE_SIZE", .. })
        ));
    }

    #[test]
    fn test_malformed_numeric_env_is_an_error() {
        std::env::set_var("FEED_TEST_ONLY_NUMBER", "twelve");
        let parsed: Result<usize> = get_env_parsed_or("FEED_TEST_ONLY_NUMBER", 3);
        assert!(parsed.is_err());
        std::env::remove_var("FEED_TEST_ONLY_NUMBER");
        assert_eq!(get_env_parsed_or::<usize>("FEED_TEST_ONLY_NUMBER", 3).unwrap(), 3);
    }
}
