//! In-memory service implementations
//!
//! Dashmap-backed fakes honoring the trait contracts: duplicate creates
//! report `AlreadyExists`, missing targets report `NotFound`, and direct
//! channels are unique per member set. Used by tests and by the CLI's local
//! mode. Failure hooks let tests force individual operations to fail so the
//! fault-tolerance paths can be exercised.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};

use super::{
    ChannelFields, ChannelFilter, ChannelKind, ChannelResource, FeedItem, FeedService,
    IdentityFields, MessagingService, ServiceError, ServiceResult, StoredItem,
};

#[derive(Debug, Clone)]
struct IdentityRecord {
    fields: IdentityFields,
    active: bool,
}

#[derive(Debug, Clone)]
struct ChannelRecord {
    resource: ChannelResource,
    /// Set by the reversible delete; hidden channels are invisible to
    /// queries until recreated.
    hidden: bool,
}

/// In-memory messaging/channel service.
#[derive(Default)]
pub struct InMemoryMessaging {
    identities: DashMap<String, IdentityRecord>,
    channels: DashMap<String, ChannelRecord>,
    fail_upserts: DashSet<String>,
    rate_limit_upserts: DashSet<String>,
    deny_permanent_channel: DashSet<String>,
    deny_permanent_identity: DashSet<String>,
}

impl InMemoryMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `upsert_identity` fail for any id starting with `base`.
    pub fn fail_upserts_for(&self, base: &str) {
        self.fail_upserts.insert(base.to_string());
    }

    /// Rate-limit the next `upsert_identity` for any id starting with
    /// `base`; the retry then succeeds.
    pub fn rate_limit_next_upsert(&self, base: &str) {
        self.rate_limit_upserts.insert(base.to_string());
    }

    /// Make permanent channel deletion fail for `id`, forcing the fallback.
    pub fn deny_permanent_channel_delete(&self, id: &str) {
        self.deny_permanent_channel.insert(id.to_string());
    }

    /// Make permanent identity deletion fail for any id starting with `base`.
    pub fn deny_permanent_identity_delete(&self, base: &str) {
        self.deny_permanent_identity.insert(base.to_string());
    }

    pub fn identity_exists(&self, id: &str) -> bool {
        self.identities.contains_key(id)
    }

    pub fn identity_active(&self, id: &str) -> Option<bool> {
        self.identities.get(id).map(|r| r.active)
    }

    pub fn identity_fields(&self, id: &str) -> Option<IdentityFields> {
        self.identities.get(id).map(|r| r.fields.clone())
    }

    pub fn channel(&self, id: &str) -> Option<ChannelResource> {
        self.channels.get(id).map(|r| r.resource.clone())
    }

    pub fn channel_hidden(&self, id: &str) -> Option<bool> {
        self.channels.get(id).map(|r| r.hidden)
    }

    /// Number of visible (non-hidden) channels.
    pub fn visible_channel_count(&self) -> usize {
        self.channels.iter().filter(|r| !r.hidden).count()
    }

    /// Remove a channel out-of-band, simulating deletion outside the manager.
    pub fn drop_channel(&self, id: &str) {
        self.channels.remove(id);
    }

    fn direct_channel_id(member_ids: &BTreeSet<String>) -> String {
        let joined: Vec<&str> = member_ids.iter().map(String::as_str).collect();
        format!("direct:{}", joined.join("+"))
    }
}

#[async_trait::async_trait]
impl MessagingService for InMemoryMessaging {
    async fn upsert_identity(&self, id: &str, fields: IdentityFields) -> ServiceResult<()> {
        if self.fail_upserts.iter().any(|b| id.starts_with(b.key())) {
            return Err(ServiceError::Other(format!(
                "injected upsert failure for {id}"
            )));
        }
        let limited = self
            .rate_limit_upserts
            .iter()
            .find(|b| id.starts_with(b.key()))
            .map(|b| b.key().clone());
        if let Some(base) = limited {
            self.rate_limit_upserts.remove(&base);
            return Err(ServiceError::RateLimited);
        }
        self.identities.insert(
            id.to_string(),
            IdentityRecord {
                fields,
                active: true,
            },
        );
        Ok(())
    }

    async fn create_or_get_channel(
        &self,
        kind: ChannelKind,
        id: Option<&str>,
        fields: ChannelFields,
    ) -> ServiceResult<ChannelResource> {
        let member_ids: BTreeSet<String> = fields.member_ids.iter().cloned().collect();
        let channel_id = match (kind, id) {
            (_, Some(id)) => id.to_string(),
            (ChannelKind::Direct, None) => Self::direct_channel_id(&member_ids),
            (ChannelKind::Group, None) => {
                return Err(ServiceError::Other(
                    "group channel requires an explicit id".into(),
                ))
            }
        };

        if let Some(mut existing) = self.channels.get_mut(&channel_id) {
            // Recreating a reversibly deleted channel restores it.
            existing.hidden = false;
            return Ok(existing.resource.clone());
        }

        let resource = ChannelResource {
            id: channel_id.clone(),
            kind,
            member_ids,
            display_name: fields.display_name,
            avatar_url: fields.avatar_url,
            created_by: fields.created_by,
        };
        self.channels.insert(
            channel_id,
            ChannelRecord {
                resource: resource.clone(),
                hidden: false,
            },
        );
        Ok(resource)
    }

    async fn update_channel(&self, id: &str, fields: ChannelFields) -> ServiceResult<()> {
        let mut record = self
            .channels
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        if let Some(name) = fields.display_name {
            record.resource.display_name = Some(name);
        }
        if let Some(avatar) = fields.avatar_url {
            record.resource.avatar_url = Some(avatar);
        }
        Ok(())
    }

    async fn add_members(&self, id: &str, member_ids: &[String]) -> ServiceResult<()> {
        let mut record = self
            .channels
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        record
            .resource
            .member_ids
            .extend(member_ids.iter().cloned());
        Ok(())
    }

    async fn query_channels(
        &self,
        filter: ChannelFilter,
        limit: usize,
    ) -> ServiceResult<Vec<ChannelResource>> {
        let mut out = Vec::new();
        for record in self.channels.iter() {
            if record.hidden {
                continue;
            }
            let resource = &record.resource;
            if let Some(kind) = filter.kind {
                if resource.kind != kind {
                    continue;
                }
            }
            if let Some(ref member) = filter.member {
                if !resource.member_ids.contains(member) {
                    continue;
                }
            }
            if let Some(ref creator) = filter.created_by {
                if resource.created_by.as_deref() != Some(creator.as_str()) {
                    continue;
                }
            }
            if let Some(ref id) = filter.id {
                if &resource.id != id {
                    continue;
                }
            }
            out.push(resource.clone());
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn delete_channel(&self, id: &str, permanent: bool) -> ServiceResult<()> {
        if permanent {
            if self.deny_permanent_channel.contains(id) {
                return Err(ServiceError::Other(format!(
                    "permanent delete rejected for {id}"
                )));
            }
            self.channels
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| ServiceError::NotFound(id.to_string()))
        } else {
            let mut record = self
                .channels
                .get_mut(id)
                .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
            record.hidden = true;
            Ok(())
        }
    }

    async fn delete_identity(&self, id: &str, cascade: bool) -> ServiceResult<()> {
        if self
            .deny_permanent_identity
            .iter()
            .any(|b| id.starts_with(b.key()))
        {
            return Err(ServiceError::Other(format!(
                "permanent identity delete rejected for {id}"
            )));
        }
        self.identities
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        if cascade {
            let owned: Vec<String> = self
                .channels
                .iter()
                .filter(|r| r.resource.created_by.as_deref() == Some(id))
                .map(|r| r.resource.id.clone())
                .collect();
            for channel_id in owned {
                self.channels.remove(&channel_id);
            }
        }
        Ok(())
    }

    async fn deactivate_identity(&self, id: &str) -> ServiceResult<()> {
        let mut record = self
            .identities
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        record.active = false;
        Ok(())
    }
}

/// In-memory activity-feed service.
#[derive(Default)]
pub struct InMemoryFeed {
    identities: DashMap<String, IdentityFields>,
    streams: DashMap<String, Vec<StoredItem>>,
    follows: DashMap<String, BTreeSet<String>>,
    next_item: AtomicU64,
    fail_list: DashSet<String>,
    stale_list: DashSet<String>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `list_items` fail for a stream key, for retry-cap tests.
    pub fn fail_list_items(&self, stream_key: &str) {
        self.fail_list.insert(stream_key.to_string());
    }

    /// Make `list_items` keep reporting an item that no longer exists for
    /// this stream, the shape an eventually-consistent backend produces
    /// when a deletion has not yet settled.
    pub fn serve_stale_listing(&self, stream_key: &str) {
        self.stale_list.insert(stream_key.to_string());
    }

    pub fn identity_exists(&self, id: &str) -> bool {
        self.identities.contains_key(id)
    }

    pub fn item_count(&self, stream_key: &str) -> usize {
        self.streams.get(stream_key).map(|s| s.len()).unwrap_or(0)
    }

    pub fn total_item_count(&self) -> usize {
        self.streams.iter().map(|s| s.len()).sum()
    }

    pub fn follow_edge_count(&self) -> usize {
        self.follows.iter().map(|f| f.len()).sum()
    }

    pub fn has_follow(&self, stream_key: &str, target_key: &str) -> bool {
        self.follows
            .get(stream_key)
            .map(|t| t.contains(target_key))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl FeedService for InMemoryFeed {
    async fn upsert_identity(&self, id: &str, fields: IdentityFields) -> ServiceResult<()> {
        self.identities.insert(id.to_string(), fields);
        Ok(())
    }

    async fn delete_identity(&self, id: &str) -> ServiceResult<()> {
        self.identities
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn publish(&self, stream_key: &str, item: FeedItem) -> ServiceResult<String> {
        let item_id = format!("item-{}", self.next_item.fetch_add(1, Ordering::SeqCst));
        self.streams
            .entry(stream_key.to_string())
            .or_default()
            .push(StoredItem {
                id: item_id.clone(),
                item,
            });
        Ok(item_id)
    }

    async fn list_items(&self, stream_key: &str, limit: usize) -> ServiceResult<Vec<StoredItem>> {
        if self.fail_list.contains(stream_key) {
            return Err(ServiceError::Other(format!(
                "injected list failure for {stream_key}"
            )));
        }
        if self.stale_list.contains(stream_key) {
            return Ok(vec![StoredItem {
                id: "stale-item".to_string(),
                item: FeedItem {
                    correlation_id: "stale".to_string(),
                    author_id: stream_key.to_string(),
                    body: String::new(),
                    attachments: Vec::new(),
                    likes: 0,
                    shares: 0,
                    category: String::new(),
                    published_at: chrono::Utc::now(),
                },
            }]);
        }
        Ok(self
            .streams
            .get(stream_key)
            .map(|s| s.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_item(&self, stream_key: &str, item_id: &str) -> ServiceResult<()> {
        let mut stream = self
            .streams
            .get_mut(stream_key)
            .ok_or_else(|| ServiceError::NotFound(stream_key.to_string()))?;
        let before = stream.len();
        stream.retain(|i| i.id != item_id);
        if stream.len() == before {
            return Err(ServiceError::NotFound(item_id.to_string()));
        }
        Ok(())
    }

    async fn follow(&self, stream_key: &str, target_key: &str) -> ServiceResult<()> {
        self.follows
            .entry(stream_key.to_string())
            .or_default()
            .insert(target_key.to_string());
        Ok(())
    }

    async fn unfollow(&self, stream_key: &str, target_key: &str) -> ServiceResult<()> {
        let removed = self
            .follows
            .get_mut(stream_key)
            .map(|mut t| t.remove(target_key))
            .unwrap_or(false);
        if removed {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!(
                "{stream_key} -> {target_key}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn members(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_direct_channel_unique_per_member_set() {
        let svc = InMemoryMessaging::new();

        let first = assert_ok!(
            svc.create_or_get_channel(
                ChannelKind::Direct,
                None,
                ChannelFields {
                    member_ids: members(&["u1", "maya-1"]),
                    ..Default::default()
                },
            )
            .await
        );

        // Same pair, reversed order: must resolve to the same channel.
        let second = svc
            .create_or_get_channel(
                ChannelKind::Direct,
                None,
                ChannelFields {
                    member_ids: members(&["maya-1", "u1"]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(svc.visible_channel_count(), 1);
    }

    #[tokio::test]
    async fn test_reversible_delete_hides_until_recreated() {
        let svc = InMemoryMessaging::new();
        svc.create_or_get_channel(
            ChannelKind::Group,
            Some("lounge"),
            ChannelFields {
                member_ids: members(&["u1"]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        svc.delete_channel("lounge", false).await.unwrap();
        assert_eq!(svc.visible_channel_count(), 0);

        svc.create_or_get_channel(
            ChannelKind::Group,
            Some("lounge"),
            ChannelFields::default(),
        )
        .await
        .unwrap();
        assert_eq!(svc.visible_channel_count(), 1);
    }

    #[tokio::test]
    async fn test_identity_cascade_removes_owned_channels() {
        let svc = InMemoryMessaging::new();
        svc.upsert_identity("maya-1", IdentityFields::default())
            .await
            .unwrap();
        svc.create_or_get_channel(
            ChannelKind::Group,
            Some("maya-room"),
            ChannelFields {
                created_by: Some("maya-1".into()),
                member_ids: members(&["maya-1"]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        svc.delete_identity("maya-1", true).await.unwrap();
        assert!(!svc.identity_exists("maya-1"));
        assert!(svc.channel("maya-room").is_none());
    }

    #[tokio::test]
    async fn test_feed_publish_list_remove() {
        let feed = InMemoryFeed::new();
        let item = FeedItem {
            correlation_id: "act-1".into(),
            author_id: "maya-1".into(),
            body: "hello".into(),
            attachments: vec![],
            likes: 0,
            shares: 0,
            category: "test".into(),
            published_at: chrono::Utc::now(),
        };

        let id = feed.publish("user:maya-1", item).await.unwrap();
        assert_eq!(feed.item_count("user:maya-1"), 1);

        feed.remove_item("user:maya-1", &id).await.unwrap();
        assert_eq!(feed.item_count("user:maya-1"), 0);

        let err = feed.remove_item("user:maya-1", &id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unfollow_missing_edge_is_not_found() {
        let feed = InMemoryFeed::new();
        feed.follow("user:a", "user:b").await.unwrap();
        assert!(feed.has_follow("user:a", "user:b"));

        feed.unfollow("user:a", "user:b").await.unwrap();
        let err = feed.unfollow("user:a", "user:b").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
