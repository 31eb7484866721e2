//! Reset coordination
//!
//! Serializes a full cleanup-and-reseed cycle behind one instance-owned
//! single-slot lock. Concurrent callers are rejected with a conflict error,
//! never queued; the lock has no timeout and no cross-process visibility,
//! and a crash holds it until restart (accepted limitation).
//!
//! Exposes the produced interface consumed by the thin request layer:
//! [`ResetCoordinator::seed_demo`] and [`ResetCoordinator::reset_demo`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::channels::ChannelSeeder;
use crate::cleanup::CleanupOrchestrator;
use crate::feed::FeedSeeder;
use crate::ids::RunClock;
use crate::personas::{DEFAULT_ANCHOR_ID, LOUNGE_CHANNEL_ID, PERSONAS};
use crate::provision::{IdentityProvisioner, WorkingUser};
use crate::services::{FeedService, MessagingService};
use crate::types::{success_count, GreenroomError, Result, SeedingResult};

/// Knobs for a coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Id of the anchor identity cleanup must never remove.
    pub anchor_id: String,
    /// Baseline personas provisioned per pass.
    pub persona_count: usize,
    /// Personas invited into the shared lounge channel.
    pub group_size: usize,
    /// Pause between cleanup and reseed, covering the external services'
    /// eventual-consistency window.
    pub settle_delay: Duration,
    /// Feed items removed per cleanup round.
    pub item_batch_size: usize,
    /// Cleanup retry cap per identity stream.
    pub max_item_retries: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            anchor_id: DEFAULT_ANCHOR_ID.to_string(),
            persona_count: PERSONAS.len(),
            group_size: 3,
            settle_delay: Duration::from_secs(2),
            item_batch_size: 10,
            max_item_retries: 3,
        }
    }
}

/// Runs seed and reset cycles against the two backing services.
pub struct ResetCoordinator<M, F> {
    messaging: Arc<M>,
    feed: Arc<F>,
    clock: Arc<dyn RunClock>,
    config: CoordinatorConfig,
    /// Single-slot guard; owned by this instance so independent demo
    /// environments can coexist in one process.
    running: AtomicBool,
}

/// RAII token for the single-slot lock. Dropping it releases the slot, so a
/// mid-run failure still unlocks future resets.
struct RunToken<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunToken<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl<M: MessagingService, F: FeedService> ResetCoordinator<M, F> {
    pub fn new(
        messaging: Arc<M>,
        feed: Arc<F>,
        clock: Arc<dyn RunClock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            messaging,
            feed,
            clock,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Seed the baseline state without tearing anything down. Idempotent.
    pub async fn seed_demo(&self, session_user_id: &str) -> Result<SeedingResult> {
        let _token = self.acquire()?;
        info!(session = %session_user_id, "Starting seed run");
        self.run_seed(session_user_id).await
    }

    /// Tear down all discovered state (preserving the anchor and its fixed
    /// lounge), wait out the settling delay, then reseed from scratch.
    pub async fn reset_demo(&self, session_user_id: &str) -> Result<SeedingResult> {
        let _token = self.acquire()?;
        info!(session = %session_user_id, "Starting reset run");

        let preserve = self.preserve_ids(session_user_id);
        let report = CleanupOrchestrator::new(Arc::clone(&self.messaging), Arc::clone(&self.feed))
            .with_item_batch_size(self.config.item_batch_size)
            .with_max_item_retries(self.config.max_item_retries)
            .purge(session_user_id, &preserve)
            .await?;

        let failed_items = report
            .channels
            .iter()
            .chain(report.identities.iter())
            .chain(report.feed_identities.iter())
            .filter(|r| !r.is_success())
            .count();
        if failed_items > 0 {
            warn!(failed_items, "Cleanup left items behind, reseeding anyway");
        }

        // Blocking pause on this call path, letting both services'
        // eventual-consistency windows close before recreating state.
        tokio::time::sleep(self.config.settle_delay).await;

        self.run_seed(session_user_id).await
    }

    /// Grab the single run slot, or fail fast with a conflict.
    fn acquire(&self) -> Result<RunToken<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(RunToken {
                flag: &self.running,
            })
        } else {
            Err(GreenroomError::Conflict(
                "a reset is already in progress on this environment".into(),
            ))
        }
    }

    fn preserve_ids(&self, session_user_id: &str) -> BTreeSet<String> {
        [
            self.config.anchor_id.clone(),
            LOUNGE_CHANNEL_ID.to_string(),
            session_user_id.to_string(),
        ]
        .into_iter()
        .collect()
    }

    /// The strict seeding sequence: provision, channels, content, follows.
    /// A phase-level failure aborts the remaining phases.
    async fn run_seed(&self, session_user_id: &str) -> Result<SeedingResult> {
        let rows = IdentityProvisioner::new(Arc::clone(&self.messaging), Arc::clone(&self.clock))
            .with_persona_count(self.config.persona_count)
            .provision(&self.config.anchor_id)
            .await?;
        let users: Vec<WorkingUser> = rows.iter().filter_map(|r| r.value().cloned()).collect();

        let channel_rows = ChannelSeeder::new(
            Arc::clone(&self.messaging),
            self.config.anchor_id.clone(),
            self.config.group_size,
        )
        .seed_channels(session_user_id, &users)
        .await?;

        let feed_seeder = FeedSeeder::new(
            Arc::clone(&self.feed),
            Arc::clone(&self.clock),
            self.config.anchor_id.clone(),
        );
        let content_rows = feed_seeder.seed_content(session_user_id, &users).await?;
        let follow_rows = feed_seeder
            .seed_follow_graph(session_user_id, &users)
            .await?;

        let result = SeedingResult {
            user_count: users.len(),
            channel_count: success_count(&channel_rows),
            activity_count: success_count(&content_rows),
            follow_edge_count: success_count(&follow_rows),
        };
        info!(
            session = %session_user_id,
            users = result.user_count,
            channels = result.channel_count,
            activities = result.activity_count,
            follow_edges = result.follow_edge_count,
            "Seeding run complete"
        );
        Ok(result)
    }
}
