//! Cleanup orchestration
//!
//! Tears down everything a previous pass left behind, with tiered fallback
//! per item and an explicit preserve list that always shields the anchor
//! identity and its fixed lounge channel.
//!
//! Ordering matters: messaging-side cleanup runs first because the channel
//! scan is how disambiguated persona ids from earlier passes are recovered,
//! and those ids must also be targeted in the feed service.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::scan::{discover_identity_ids, StateScanner};
use crate::services::{
    retry_rate_limited, user_stream, ChannelResource, FeedService, MessagingService, ServiceError,
};
use crate::types::{ItemOutcome, Result};

/// What a purge run accomplished, per item.
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// One row per scanned channel (including preserved ones as skips).
    pub channels: Vec<ItemOutcome>,
    /// One row per non-preserved messaging identity.
    pub identities: Vec<ItemOutcome>,
    /// One row per non-preserved feed identity.
    pub feed_identities: Vec<ItemOutcome>,
    /// Follow edges successfully unwound.
    pub edges_removed: usize,
    /// Content items successfully removed.
    pub items_removed: usize,
}

/// Deletes discovered resources with tiered fallback, never aborting the
/// batch on a single item.
pub struct CleanupOrchestrator<M, F> {
    messaging: Arc<M>,
    feed: Arc<F>,
    item_batch_size: usize,
    max_item_retries: usize,
}

impl<M: MessagingService, F: FeedService> CleanupOrchestrator<M, F> {
    pub fn new(messaging: Arc<M>, feed: Arc<F>) -> Self {
        Self {
            messaging,
            feed,
            item_batch_size: 10,
            max_item_retries: 3,
        }
    }

    /// Items removed per round of feed-stream draining.
    pub fn with_item_batch_size(mut self, size: usize) -> Self {
        self.item_batch_size = size.max(1);
        self
    }

    /// Retry cap per identity while draining its stream, so a persistently
    /// failing backend cannot loop forever.
    pub fn with_max_item_retries(mut self, retries: usize) -> Self {
        self.max_item_retries = retries.max(1);
        self
    }

    /// Purge all discovered state except the preserve list.
    pub async fn purge(
        &self,
        session_user_id: &str,
        preserve_ids: &BTreeSet<String>,
    ) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();

        // Messaging side first: the scan output drives feed-side targeting.
        let channels = StateScanner::new(Arc::clone(&self.messaging))
            .discover_channels(session_user_id)
            .await;
        let scanned_ids = discover_identity_ids(&channels, session_user_id).await;

        report.channels = self.purge_channels(&channels, preserve_ids).await;
        report.identities = self
            .purge_messaging_identities(&scanned_ids, preserve_ids)
            .await;

        // Feed side: unwind the follow graph before touching content.
        report.edges_removed = self.unwind_follow_graph(&scanned_ids).await;
        report.items_removed = self.drain_streams(&scanned_ids, preserve_ids).await;
        report.feed_identities = self
            .purge_feed_identities(&scanned_ids, preserve_ids)
            .await;

        info!(
            session = %session_user_id,
            channels = report.channels.iter().filter(|r| r.is_success()).count(),
            identities = report.identities.iter().filter(|r| r.is_success()).count(),
            edges_removed = report.edges_removed,
            items_removed = report.items_removed,
            "Purge complete"
        );
        Ok(report)
    }

    /// Per channel: permanent delete, then reversible delete, then log and
    /// continue. "Not found" counts as already gone.
    async fn purge_channels(
        &self,
        channels: &[ChannelResource],
        preserve_ids: &BTreeSet<String>,
    ) -> Vec<ItemOutcome> {
        let deletions = channels.iter().map(|channel| async move {
            if preserve_ids.contains(&channel.id) {
                debug!(channel = %channel.id, "Channel on preserve list, skipping");
                return ItemOutcome::skipped(channel.id.clone(), "preserved");
            }

            match retry_rate_limited(|| self.messaging.delete_channel(&channel.id, true)).await {
                Ok(()) | Err(ServiceError::NotFound(_)) => {
                    return ItemOutcome::succeeded(channel.id.clone(), ())
                }
                Err(e) => {
                    warn!(channel = %channel.id, error = %e, "Permanent delete failed, trying reversible");
                }
            }

            match retry_rate_limited(|| self.messaging.delete_channel(&channel.id, false)).await {
                Ok(()) | Err(ServiceError::NotFound(_)) => {
                    ItemOutcome::succeeded(channel.id.clone(), ())
                }
                Err(e) => {
                    warn!(channel = %channel.id, error = %e, "Reversible delete also failed, continuing");
                    ItemOutcome::failed(channel.id.clone(), e.to_string())
                }
            }
        });
        join_all(deletions).await
    }

    /// Per identity: cascading permanent delete, then reversible
    /// deactivation, then log and continue.
    async fn purge_messaging_identities(
        &self,
        scanned_ids: &BTreeSet<String>,
        preserve_ids: &BTreeSet<String>,
    ) -> Vec<ItemOutcome> {
        let deletions = scanned_ids
            .iter()
            .filter(|id| !preserve_ids.contains(*id))
            .map(|id| async move {
                match retry_rate_limited(|| self.messaging.delete_identity(id, true)).await {
                    Ok(()) | Err(ServiceError::NotFound(_)) => {
                        return ItemOutcome::succeeded(id.clone(), ())
                    }
                    Err(e) => {
                        warn!(identity = %id, error = %e, "Permanent identity delete failed, trying deactivation");
                    }
                }

                match retry_rate_limited(|| self.messaging.deactivate_identity(id)).await {
                    Ok(()) | Err(ServiceError::NotFound(_)) => {
                        ItemOutcome::succeeded(id.clone(), ())
                    }
                    Err(e) => {
                        warn!(identity = %id, error = %e, "Deactivation also failed, continuing");
                        ItemOutcome::failed(id.clone(), e.to_string())
                    }
                }
            });
        join_all(deletions).await
    }

    /// Every scanned identity unfollows every other. Dangling edges from
    /// partial failures are tolerated; missing edges count as already gone.
    async fn unwind_follow_graph(&self, scanned_ids: &BTreeSet<String>) -> usize {
        let mut pairs = Vec::new();
        for follower in scanned_ids {
            for following in scanned_ids {
                if follower != following {
                    pairs.push((follower.clone(), following.clone()));
                }
            }
        }

        let unfollows = pairs.iter().map(|(follower, following)| async move {
            let follower_stream = user_stream(follower);
            let following_stream = user_stream(following);
            match retry_rate_limited(|| {
                self.feed.unfollow(&follower_stream, &following_stream)
            })
            .await
            {
                Ok(()) => true,
                Err(ServiceError::NotFound(_)) => false,
                Err(e) => {
                    warn!(follower = %follower, following = %following, error = %e, "Unfollow failed, continuing");
                    false
                }
            }
        });

        join_all(unfollows).await.into_iter().filter(|r| *r).count()
    }

    /// Delete content items in small batches per identity, capped at a
    /// bounded retry count so a persistent error cannot loop forever.
    async fn drain_streams(
        &self,
        scanned_ids: &BTreeSet<String>,
        preserve_ids: &BTreeSet<String>,
    ) -> usize {
        let drains = scanned_ids
            .iter()
            .filter(|id| !preserve_ids.contains(*id))
            .map(|id| self.drain_stream(id));
        join_all(drains).await.into_iter().sum()
    }

    async fn drain_stream(&self, identity_id: &str) -> usize {
        let stream = user_stream(identity_id);
        let mut removed = 0usize;
        let mut failures = 0usize;

        loop {
            let batch = match self.feed.list_items(&stream, self.item_batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    failures += 1;
                    warn!(stream = %stream, error = %e, attempt = failures, "Stream listing failed");
                    if failures >= self.max_item_retries {
                        warn!(stream = %stream, "Retry cap reached, leaving remaining items");
                        break;
                    }
                    continue;
                }
            };
            if batch.is_empty() {
                break;
            }

            let mut round_removed = 0usize;
            let mut batch_failed = false;
            for item in batch {
                match retry_rate_limited(|| self.feed.remove_item(&stream, &item.id)).await {
                    Ok(()) => {
                        removed += 1;
                        round_removed += 1;
                    }
                    Err(ServiceError::NotFound(_)) => {}
                    Err(e) => {
                        warn!(stream = %stream, item = %item.id, error = %e, "Item removal failed");
                        batch_failed = true;
                    }
                }
            }

            // A non-empty batch from which nothing was removed is a stale
            // listing; count it against the cap or the loop never ends.
            if batch_failed || round_removed == 0 {
                failures += 1;
                if failures >= self.max_item_retries {
                    warn!(stream = %stream, "Retry cap reached, leaving remaining items");
                    break;
                }
            }
        }

        removed
    }

    /// Delete non-preserved feed identities. "Not found" is already gone.
    async fn purge_feed_identities(
        &self,
        scanned_ids: &BTreeSet<String>,
        preserve_ids: &BTreeSet<String>,
    ) -> Vec<ItemOutcome> {
        let deletions = scanned_ids
            .iter()
            .filter(|id| !preserve_ids.contains(*id))
            .map(|id| async move {
                match retry_rate_limited(|| self.feed.delete_identity(id)).await {
                    Ok(()) | Err(ServiceError::NotFound(_)) => {
                        ItemOutcome::succeeded(id.clone(), ())
                    }
                    Err(e) => {
                        warn!(identity = %id, error = %e, "Feed identity delete failed, continuing");
                        ItemOutcome::failed(id.clone(), e.to_string())
                    }
                }
            });
        join_all(deletions).await
    }
}
