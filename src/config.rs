//! Configuration for Greenroom
//!
//! CLI arguments and environment variable handling using clap.

use std::time::Duration;

use clap::Parser;
use uuid::Uuid;

use crate::coordinator::CoordinatorConfig;
use crate::personas::{DEFAULT_ANCHOR_ID, PERSONAS};

/// Greenroom - demo-environment lifecycle manager
#[derive(Parser, Debug, Clone)]
#[command(name = "greenroom")]
#[command(about = "Purge, reconcile, and reseed demo state across messaging and feed services")]
pub struct Args {
    /// Unique identifier for this run
    #[arg(long, env = "RUN_ID", default_value_t = Uuid::new_v4())]
    pub run_id: Uuid,

    /// Session identity the seeded environment is built around
    #[arg(long, env = "SESSION_USER", default_value = "demo-session")]
    pub session_user: String,

    /// Id of the anchor identity cleanup must never remove
    #[arg(long, env = "ANCHOR_ID", default_value = DEFAULT_ANCHOR_ID)]
    pub anchor_id: String,

    /// Number of baseline personas to provision (capped at the catalog size)
    #[arg(long, env = "PERSONA_COUNT", default_value = "5")]
    pub persona_count: usize,

    /// Number of personas invited into the shared lounge channel
    #[arg(long, env = "GROUP_SIZE", default_value = "3")]
    pub group_size: usize,

    /// Pause between cleanup and reseed, in milliseconds
    #[arg(long, env = "SETTLE_DELAY_MS", default_value = "2000")]
    pub settle_delay_ms: u64,

    /// Feed items removed per cleanup round
    #[arg(long, env = "ITEM_BATCH_SIZE", default_value = "10")]
    pub item_batch_size: usize,

    /// Cleanup retry cap per identity stream
    #[arg(long, env = "MAX_ITEM_RETRIES", default_value = "3")]
    pub max_item_retries: usize,

    /// Messaging service API key (required outside dev mode)
    #[arg(long, env = "MESSAGING_API_KEY")]
    pub messaging_api_key: Option<String>,

    /// Messaging service API secret (required outside dev mode)
    #[arg(long, env = "MESSAGING_API_SECRET")]
    pub messaging_api_secret: Option<String>,

    /// Feed service API key (required outside dev mode)
    #[arg(long, env = "FEED_API_KEY")]
    pub feed_api_key: Option<String>,

    /// Feed service API secret (required outside dev mode)
    #[arg(long, env = "FEED_API_SECRET")]
    pub feed_api_secret: Option<String>,

    /// Enable development mode (in-memory backends, no credentials needed)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Run a full reset (cleanup + reseed) instead of a plain seed
    #[arg(long, default_value = "false")]
    pub reset: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Settling delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Coordinator knobs derived from the arguments.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            anchor_id: self.anchor_id.clone(),
            persona_count: self.persona_count.min(PERSONAS.len()),
            group_size: self.group_size,
            settle_delay: self.settle_delay(),
            item_batch_size: self.item_batch_size,
            max_item_retries: self.max_item_retries,
        }
    }

    /// Validate configuration. Credential gaps are fatal before any
    /// external call is made.
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.messaging_api_key.is_none() || self.messaging_api_secret.is_none() {
                return Err(
                    "MESSAGING_API_KEY and MESSAGING_API_SECRET are required outside dev mode"
                        .to_string(),
                );
            }
            if self.feed_api_key.is_none() || self.feed_api_secret.is_none() {
                return Err(
                    "FEED_API_KEY and FEED_API_SECRET are required outside dev mode".to_string(),
                );
            }
        }

        if self.persona_count == 0 {
            return Err("PERSONA_COUNT must be at least 1".to_string());
        }
        if self.group_size > self.persona_count {
            return Err("GROUP_SIZE must not exceed PERSONA_COUNT".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["greenroom", "--dev-mode"])
    }

    #[test]
    fn test_dev_mode_needs_no_credentials() {
        assert!(base_args().validate().is_ok());
    }

    #[test]
    fn test_production_requires_credentials() {
        let args = Args::parse_from(["greenroom"]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("MESSAGING_API_KEY"));
    }

    #[test]
    fn test_group_size_bounded_by_persona_count() {
        let mut args = base_args();
        args.group_size = 9;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_coordinator_config_caps_persona_count() {
        let mut args = base_args();
        args.persona_count = 50;
        let config = args.coordinator_config();
        assert_eq!(config.persona_count, PERSONAS.len());
        assert_eq!(config.settle_delay, Duration::from_millis(2000));
    }
}
