//! Greenroom - demo-environment lifecycle manager
//!
//! Reconciles two independent, eventually-consistent record-keeping
//! services (a messaging/channel service and an activity-feed service) to a
//! known seeded baseline, and can tear everything down and reseed from
//! scratch on demand.
//!
//! ## Components
//!
//! - **Provisioning**: demo identities, including one immutable anchor
//! - **Channels**: baseline group and direct-message resources
//! - **Feed**: illustrative content and the follow graph
//! - **Scan**: union-of-queries discovery of existing state
//! - **Cleanup**: tiered-fallback teardown that preserves the anchor
//! - **Coordinator**: single-flight reset cycle, `seed_demo`/`reset_demo`

pub mod channels;
pub mod cleanup;
pub mod config;
pub mod coordinator;
pub mod feed;
pub mod ids;
pub mod personas;
pub mod provision;
pub mod scan;
pub mod services;
pub mod types;

pub use config::Args;
pub use coordinator::{CoordinatorConfig, ResetCoordinator};
pub use types::{GreenroomError, Result, SeedingResult};
