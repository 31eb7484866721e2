//! Reconciliation scanning
//!
//! No single query enumerates every resource a previous pass may have left
//! behind, so discovery runs an ordered union of overlapping, individually
//! incomplete queries and dedupes the accumulated results by id. A failing
//! query is logged and treated as an empty result; it is never fatal to the
//! overall scan.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::personas::LOUNGE_CHANNEL_ID;
use crate::services::{ChannelFilter, ChannelKind, ChannelResource, MessagingService};

/// Page size used by every scan query.
const SCAN_PAGE_LIMIT: usize = 100;

/// Run an ordered list of named queries, accumulating and deduplicating
/// results by id. Shared by both services' cleanup paths.
pub async fn union_scan<T, F>(
    scope: &str,
    queries: Vec<(&'static str, BoxFuture<'_, crate::services::ServiceResult<Vec<T>>>)>,
    id_of: F,
) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for (name, query) in queries {
        match query.await {
            Ok(batch) => {
                debug!(scope, query = name, results = batch.len(), "Scan query resolved");
                for item in batch {
                    if seen.insert(id_of(&item)) {
                        out.push(item);
                    }
                }
            }
            Err(e) => {
                warn!(scope, query = name, error = %e, "Scan query failed, treating as empty");
            }
        }
    }

    out
}

/// Discovers existing messaging-side state for cleanup.
pub struct StateScanner<M> {
    messaging: Arc<M>,
}

impl<M: MessagingService> StateScanner<M> {
    pub fn new(messaging: Arc<M>) -> Self {
        Self { messaging }
    }

    /// Best-effort discovery of every channel a pass may have created:
    /// by type, by membership, by creator, by known id, and a final
    /// unfiltered catch-all.
    pub async fn discover_channels(&self, session_user_id: &str) -> Vec<ChannelResource> {
        let m = &self.messaging;
        let queries: Vec<(
            &'static str,
            BoxFuture<'_, crate::services::ServiceResult<Vec<ChannelResource>>>,
        )> = vec![
            (
                "by-group-kind",
                Box::pin(m.query_channels(
                    ChannelFilter {
                        kind: Some(ChannelKind::Group),
                        ..Default::default()
                    },
                    SCAN_PAGE_LIMIT,
                )),
            ),
            (
                "by-direct-kind",
                Box::pin(m.query_channels(
                    ChannelFilter {
                        kind: Some(ChannelKind::Direct),
                        ..Default::default()
                    },
                    SCAN_PAGE_LIMIT,
                )),
            ),
            (
                "by-membership",
                Box::pin(m.query_channels(
                    ChannelFilter {
                        member: Some(session_user_id.to_string()),
                        ..Default::default()
                    },
                    SCAN_PAGE_LIMIT,
                )),
            ),
            (
                "by-creator",
                Box::pin(m.query_channels(
                    ChannelFilter {
                        created_by: Some(session_user_id.to_string()),
                        ..Default::default()
                    },
                    SCAN_PAGE_LIMIT,
                )),
            ),
            (
                "by-known-id",
                Box::pin(m.query_channels(
                    ChannelFilter {
                        id: Some(LOUNGE_CHANNEL_ID.to_string()),
                        ..Default::default()
                    },
                    SCAN_PAGE_LIMIT,
                )),
            ),
            (
                "catch-all",
                Box::pin(m.query_channels(ChannelFilter::default(), SCAN_PAGE_LIMIT)),
            ),
        ];

        union_scan("channels", queries, |c: &ChannelResource| c.id.clone()).await
    }
}

/// Every identity the feed-side cleanup must target, recovered from the
/// channel scan: members, creators, and the calling session. This is how
/// disambiguated persona ids from earlier passes are found, since the feed
/// service itself has no identity enumeration.
pub async fn discover_identity_ids(
    channels: &[ChannelResource],
    session_user_id: &str,
) -> BTreeSet<String> {
    let queries: Vec<(
        &'static str,
        BoxFuture<'_, crate::services::ServiceResult<Vec<String>>>,
    )> = vec![
        (
            "by-channel-membership",
            Box::pin(async move {
                Ok(channels
                    .iter()
                    .flat_map(|c| c.member_ids.iter().cloned())
                    .collect())
            }),
        ),
        (
            "by-channel-creator",
            Box::pin(async move {
                Ok(channels
                    .iter()
                    .filter_map(|c| c.created_by.clone())
                    .collect())
            }),
        ),
        (
            "session-identity",
            Box::pin(async move { Ok(vec![session_user_id.to_string()]) }),
        ),
    ];

    union_scan("identities", queries, |id: &String| id.clone())
        .await
        .into_iter()
        .collect()
}
