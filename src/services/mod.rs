//! External service boundaries
//!
//! The lifecycle manager consumes two independent record-keeping backends: a
//! messaging/channel service and an activity-feed service. Both are consumed
//! through traits so concrete SDK plumbing stays out of the core, and so
//! tests can run against the in-memory implementations in [`memory`].

pub mod memory;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{InMemoryFeed, InMemoryMessaging};

/// Error classes crossing the service boundary.
///
/// The core maps the transient classes (`AlreadyExists`, `NotFound`,
/// `RateLimited`) to local recovery; only `Other` is ever treated as
/// terminal for an item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited")]
    RateLimited,
    #[error("{0}")]
    Other(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Channel flavor in the messaging service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Group,
    Direct,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Group => "group",
            ChannelKind::Direct => "direct",
        }
    }
}

/// Mutable identity attributes, upserted into either service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityFields {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
}

/// Mutable channel attributes for create and update calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelFields {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: Option<String>,
    pub member_ids: Vec<String>,
}

/// A channel as the messaging service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResource {
    pub id: String,
    pub kind: ChannelKind,
    pub member_ids: BTreeSet<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: Option<String>,
}

/// Query filter for channel discovery. Individual filters are deliberately
/// incomplete; the scanner unions several of them.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    pub kind: Option<ChannelKind>,
    pub member: Option<String>,
    pub created_by: Option<String>,
    pub id: Option<String>,
}

/// A content item published to a personal stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    /// Caller-supplied correlation id, unique across repeated passes.
    pub correlation_id: String,
    pub author_id: String,
    pub body: String,
    pub attachments: Vec<String>,
    pub likes: u32,
    pub shares: u32,
    pub category: String,
    pub published_at: DateTime<Utc>,
}

/// A stored item as the feed service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    /// Service-assigned item id, used for removal.
    pub id: String,
    pub item: FeedItem,
}

/// Personal stream key for an identity.
pub fn user_stream(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Backoff before the single retry of a rate-limited call.
const RATE_LIMIT_BACKOFF: std::time::Duration = std::time::Duration::from_millis(250);

/// Run a service call, retrying once after a short pause if it was rate
/// limited. Rate limits during fan-out are short bursts; any other error
/// passes through untouched.
pub async fn retry_rate_limited<T, Op, Fut>(op: Op) -> ServiceResult<T>
where
    Op: Fn() -> Fut,
    Fut: std::future::Future<Output = ServiceResult<T>>,
{
    match op().await {
        Err(ServiceError::RateLimited) => {
            tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            op().await
        }
        other => other,
    }
}

/// Messaging/channel service capability set.
#[async_trait::async_trait]
pub trait MessagingService: Send + Sync {
    /// Create or update an identity. Creating an existing id updates it.
    async fn upsert_identity(&self, id: &str, fields: IdentityFields) -> ServiceResult<()>;

    /// Create a channel, or return the existing one. For `Direct` channels
    /// `id` is `None` and uniqueness is per member set.
    async fn create_or_get_channel(
        &self,
        kind: ChannelKind,
        id: Option<&str>,
        fields: ChannelFields,
    ) -> ServiceResult<ChannelResource>;

    /// Update channel metadata. Fields set to `None` are left untouched.
    async fn update_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<()>;

    /// Add members to an existing channel.
    async fn add_members(&self, id: &str, member_ids: &[String]) -> ServiceResult<()>;

    /// Query channels matching a filter, up to `limit`.
    async fn query_channels(
        &self,
        filter: ChannelFilter,
        limit: usize,
    ) -> ServiceResult<Vec<ChannelResource>>;

    /// Delete a channel. `permanent = false` is the reversible variant.
    async fn delete_channel(&self, id: &str, permanent: bool) -> ServiceResult<()>;

    /// Permanently delete an identity, optionally cascading to the
    /// conversational resources it owns.
    async fn delete_identity(&self, id: &str, cascade: bool) -> ServiceResult<()>;

    /// Reversibly deactivate an identity.
    async fn deactivate_identity(&self, id: &str) -> ServiceResult<()>;
}

/// Activity-feed service capability set.
#[async_trait::async_trait]
pub trait FeedService: Send + Sync {
    /// Create or update a feed identity.
    async fn upsert_identity(&self, id: &str, fields: IdentityFields) -> ServiceResult<()>;

    /// Delete a feed identity.
    async fn delete_identity(&self, id: &str) -> ServiceResult<()>;

    /// Publish an item to a stream; returns the service-assigned item id.
    /// Downstream fan-out is the feed service's own responsibility.
    async fn publish(&self, stream_key: &str, item: FeedItem) -> ServiceResult<String>;

    /// List items in a stream, up to `limit`.
    async fn list_items(&self, stream_key: &str, limit: usize) -> ServiceResult<Vec<StoredItem>>;

    /// Remove a single item from a stream.
    async fn remove_item(&self, stream_key: &str, item_id: &str) -> ServiceResult<()>;

    /// Create a follow edge from `stream_key` to `target_key`.
    async fn follow(&self, stream_key: &str, target_key: &str) -> ServiceResult<()>;

    /// Remove a follow edge.
    async fn unfollow(&self, stream_key: &str, target_key: &str) -> ServiceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind_round_trip() {
        assert_eq!(ChannelKind::Group.as_str(), "group");
        let json = serde_json::to_string(&ChannelKind::Direct).unwrap();
        assert_eq!(json, "\"direct\"");
    }

    #[test]
    fn test_user_stream_key() {
        assert_eq!(user_stream("maya-7"), "user:maya-7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_retried_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let result = retry_rate_limited(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ServiceError::RateLimited)
            } else {
                Ok(7u32)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_rate_limit_surfaces_after_retry() {
        let result: ServiceResult<()> =
            retry_rate_limited(|| async { Err(ServiceError::RateLimited) }).await;
        assert_eq!(result, Err(ServiceError::RateLimited));
    }
}
