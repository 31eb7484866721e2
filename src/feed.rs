//! Feed seeding
//!
//! Registers the working cast with the activity-feed service, publishes the
//! fixed set of illustrative posts to their authors' personal streams, and
//! builds the baseline follow graph. Every item and edge is independently
//! fault-tolerant; each post carries a correlation id that stays unique
//! across repeated passes.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use crate::ids::{correlation_id, RunClock};
use crate::personas::{CROSS_FOLLOWS, DEMO_POSTS};
use crate::provision::WorkingUser;
use crate::services::{
    retry_rate_limited, user_stream, FeedItem, FeedService, IdentityFields, ServiceError,
};
use crate::types::{ItemOutcome, Result};

/// Seeds baseline content and the follow graph.
pub struct FeedSeeder<F> {
    feed: Arc<F>,
    clock: Arc<dyn RunClock>,
    anchor_id: String,
}

impl<F: FeedService> FeedSeeder<F> {
    pub fn new(feed: Arc<F>, clock: Arc<dyn RunClock>, anchor_id: impl Into<String>) -> Self {
        Self {
            feed,
            clock,
            anchor_id: anchor_id.into(),
        }
    }

    /// Register the cast in the feed service and publish the fixed posts.
    ///
    /// Each post's author is chosen positionally from the persona catalog,
    /// falling back to the first available persona when the preferred slot
    /// was lost to a provisioning failure. Returns one row per post.
    pub async fn seed_content(
        &self,
        session_user_id: &str,
        working_users: &[WorkingUser],
    ) -> Result<Vec<ItemOutcome<String>>> {
        self.register_identities(session_user_id, working_users)
            .await;

        let personas: Vec<&WorkingUser> = working_users
            .iter()
            .filter(|u| u.id != self.anchor_id)
            .collect();

        let personas = &personas;
        let publishes = DEMO_POSTS
            .iter()
            .map(|post| async move {
                let author = match personas.get(post.author_index).or_else(|| personas.first()) {
                    Some(author) => *author,
                    None => {
                        warn!(category = post.category, "No personas available, skipping post");
                        return ItemOutcome::skipped(post.category, "no personas available");
                    }
                };

                let item = FeedItem {
                    correlation_id: correlation_id("act", self.clock.as_ref()),
                    author_id: author.id.clone(),
                    body: post.body.to_string(),
                    attachments: post.attachment.iter().map(|a| a.to_string()).collect(),
                    likes: post.likes,
                    shares: post.shares,
                    category: post.category.to_string(),
                    published_at: Utc::now(),
                };
                let cid = item.correlation_id.clone();

                // Publish only to the author's personal stream; fan-out is
                // the feed service's job.
                let stream = user_stream(&author.id);
                let published =
                    retry_rate_limited(|| self.feed.publish(&stream, item.clone())).await;

                match published {
                    Ok(item_id) => ItemOutcome::succeeded(cid, item_id),
                    Err(e) => {
                        warn!(author = %author.id, error = %e, "Post publish failed, skipping");
                        ItemOutcome::failed(cid, e.to_string())
                    }
                }
            });
        let rows = join_all(publishes).await;

        info!(
            session = %session_user_id,
            published = rows.iter().filter(|r| r.is_success()).count(),
            attempted = rows.len(),
            "Content seeding complete"
        );
        Ok(rows)
    }

    /// Build the follow graph: the session identity follows every persona,
    /// plus a small fixed set of cross-persona edges. Edges are only
    /// attempted between identities provisioned in this pass.
    pub async fn seed_follow_graph(
        &self,
        session_user_id: &str,
        working_users: &[WorkingUser],
    ) -> Result<Vec<ItemOutcome>> {
        let personas: Vec<&WorkingUser> = working_users
            .iter()
            .filter(|u| u.id != self.anchor_id)
            .collect();

        let mut edges: Vec<(String, String)> = personas
            .iter()
            .map(|p| (session_user_id.to_string(), p.id.clone()))
            .collect();
        for (follower_idx, following_idx) in CROSS_FOLLOWS {
            match (personas.get(follower_idx), personas.get(following_idx)) {
                (Some(follower), Some(following)) => {
                    edges.push((follower.id.clone(), following.id.clone()));
                }
                _ => {
                    warn!(
                        follower_idx,
                        following_idx,
                        "Cross-follow endpoint missing from pass, skipping edge"
                    );
                }
            }
        }

        let follows = edges.iter().map(|(follower, following)| async move {
            let edge_id = format!("{follower}->{following}");
            let follower_stream = user_stream(follower);
            let following_stream = user_stream(following);
            match retry_rate_limited(|| {
                self.feed.follow(&follower_stream, &following_stream)
            })
            .await
            {
                Ok(()) | Err(ServiceError::AlreadyExists(_)) => {
                    ItemOutcome::succeeded(edge_id, ())
                }
                Err(e) => {
                    warn!(edge = %edge_id, error = %e, "Follow edge creation failed, skipping");
                    ItemOutcome::failed(edge_id, e.to_string())
                }
            }
        });
        let rows = join_all(follows).await;

        info!(
            session = %session_user_id,
            created = rows.iter().filter(|r| r.is_success()).count(),
            attempted = rows.len(),
            "Follow graph seeding complete"
        );
        Ok(rows)
    }

    /// Idempotent feed-side registration of the whole cast. Registration
    /// failures are logged and tolerated; publishing will surface them.
    async fn register_identities(&self, session_user_id: &str, working_users: &[WorkingUser]) {
        let mut registrations = vec![(
            session_user_id.to_string(),
            IdentityFields {
                role: Some("session".to_string()),
                ..Default::default()
            },
        )];
        registrations.extend(working_users.iter().map(|u| {
            (
                u.id.clone(),
                IdentityFields {
                    display_name: Some(u.display_name.clone()),
                    avatar_url: Some(u.avatar_url.clone()),
                    role: None,
                },
            )
        }));

        let upserts = registrations.into_iter().map(|(id, fields)| async move {
            if let Err(e) =
                retry_rate_limited(|| self.feed.upsert_identity(&id, fields.clone())).await
            {
                warn!(identity = %id, error = %e, "Feed registration failed");
            }
        });
        join_all(upserts).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequenceClock;
    use crate::personas::PERSONAS;
    use crate::services::InMemoryFeed;
    use crate::types::success_count;

    fn cast(stamp: i64) -> Vec<WorkingUser> {
        let mut all = vec![WorkingUser {
            id: "greenroom-host".into(),
            display_name: "Greenroom Host".into(),
            avatar_url: "https://example.test/host.png".into(),
        }];
        all.extend(PERSONAS.iter().map(|p| WorkingUser {
            id: format!("{}-{}", p.base_id, stamp),
            display_name: p.display_name.to_string(),
            avatar_url: p.avatar_url.to_string(),
        }));
        all
    }

    fn seeder(feed: Arc<InMemoryFeed>) -> FeedSeeder<InMemoryFeed> {
        FeedSeeder::new(feed, Arc::new(SequenceClock::default()), "greenroom-host")
    }

    #[tokio::test]
    async fn test_seed_content_publishes_fixed_posts() {
        let feed = Arc::new(InMemoryFeed::new());
        let rows = seeder(Arc::clone(&feed))
            .seed_content("u1", &cast(100))
            .await
            .unwrap();

        assert_eq!(success_count(&rows), DEMO_POSTS.len());
        assert_eq!(feed.total_item_count(), DEMO_POSTS.len());
        assert!(feed.identity_exists("u1"));
        assert!(feed.identity_exists("greenroom-host"));
    }

    #[tokio::test]
    async fn test_correlation_ids_unique_across_passes() {
        let feed = Arc::new(InMemoryFeed::new());
        let seeder = seeder(Arc::clone(&feed));

        let first = seeder.seed_content("u1", &cast(100)).await.unwrap();
        let second = seeder.seed_content("u1", &cast(101)).await.unwrap();

        let mut ids: Vec<_> = first.iter().chain(second.iter()).map(|r| &r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 2 * DEMO_POSTS.len());
    }

    #[tokio::test]
    async fn test_author_falls_back_when_slot_missing() {
        let feed = Arc::new(InMemoryFeed::new());
        // Only the first two personas survived provisioning; the post that
        // prefers index 3 must fall back to the first available persona.
        let mut users = cast(100);
        users.truncate(3); // anchor + maya + jordan

        let rows = seeder(Arc::clone(&feed))
            .seed_content("u1", &users)
            .await
            .unwrap();
        assert_eq!(success_count(&rows), DEMO_POSTS.len());
        assert_eq!(feed.item_count("user:maya-100"), 2);
        assert_eq!(feed.item_count("user:jordan-100"), 1);
    }

    #[tokio::test]
    async fn test_follow_graph_session_plus_cross_edges() {
        let feed = Arc::new(InMemoryFeed::new());
        let rows = seeder(Arc::clone(&feed))
            .seed_follow_graph("u1", &cast(100))
            .await
            .unwrap();

        assert_eq!(success_count(&rows), PERSONAS.len() + CROSS_FOLLOWS.len());
        assert_eq!(
            feed.follow_edge_count(),
            PERSONAS.len() + CROSS_FOLLOWS.len()
        );
        assert!(feed.has_follow("user:u1", "user:maya-100"));
        assert!(feed.has_follow("user:jordan-100", "user:maya-100"));
    }

    #[tokio::test]
    async fn test_cross_edge_skipped_when_endpoint_missing() {
        let feed = Arc::new(InMemoryFeed::new());
        // Only three personas survived; the (3, 2) cross edge has no
        // follower and must be skipped, not attempted.
        let mut users = cast(100);
        users.truncate(4); // anchor + maya + jordan + priya

        let rows = seeder(Arc::clone(&feed))
            .seed_follow_graph("u1", &users)
            .await
            .unwrap();

        // 3 session edges + the (1, 0) cross edge.
        assert_eq!(success_count(&rows), 4);
        assert_eq!(feed.follow_edge_count(), 4);
        assert!(!feed.has_follow("user:felix-100", "user:priya-100"));
    }
}
