//! Channel seeding
//!
//! Ensures the baseline messaging resources exist: one shared lounge channel
//! for the session user and the leading personas, and a direct channel
//! between the session user and every persona. Idempotent - reruns resolve
//! to the existing resources instead of duplicating them.
//!
//! Per-channel failures are recorded and skipped; partial completion is an
//! acceptable end state and nothing is rolled back.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::personas::{
    DM_PLACEHOLDER_NAMES, LOUNGE_AVATAR_URL, LOUNGE_CHANNEL_ID, LOUNGE_DISPLAY_NAME,
};
use crate::provision::WorkingUser;
use crate::services::{
    retry_rate_limited, ChannelFields, ChannelKind, MessagingService, ServiceError,
};
use crate::types::{ItemOutcome, Result};

/// Seeds group and direct channels for a pass.
pub struct ChannelSeeder<M> {
    messaging: Arc<M>,
    anchor_id: String,
    group_size: usize,
}

impl<M: MessagingService> ChannelSeeder<M> {
    pub fn new(messaging: Arc<M>, anchor_id: impl Into<String>, group_size: usize) -> Self {
        Self {
            messaging,
            anchor_id: anchor_id.into(),
            group_size,
        }
    }

    /// Ensure the lounge channel and one DM per persona exist.
    ///
    /// `working_users` is the provisioning result including the anchor; the
    /// anchor gets no DM. Returns one row for the lounge followed by one row
    /// per persona DM.
    pub async fn seed_channels(
        &self,
        session_user_id: &str,
        working_users: &[WorkingUser],
    ) -> Result<Vec<ItemOutcome>> {
        let personas: Vec<&WorkingUser> = working_users
            .iter()
            .filter(|u| u.id != self.anchor_id)
            .collect();

        let mut rows = Vec::with_capacity(1 + personas.len());
        rows.push(self.seed_lounge(session_user_id, &personas).await);

        let dm_futures = personas
            .iter()
            .map(|persona| self.seed_direct(session_user_id, persona));
        rows.extend(join_all(dm_futures).await);

        info!(
            session = %session_user_id,
            seeded = rows.iter().filter(|r| r.is_success()).count(),
            attempted = rows.len(),
            "Channel seeding complete"
        );
        Ok(rows)
    }

    /// Create or reuse the shared lounge, then unconditionally refresh its
    /// member list and metadata. "Already exists" is success.
    async fn seed_lounge(
        &self,
        session_user_id: &str,
        personas: &[&WorkingUser],
    ) -> ItemOutcome {
        let mut member_ids: Vec<String> = vec![session_user_id.to_string()];
        member_ids.extend(
            personas
                .iter()
                .take(self.group_size)
                .map(|p| p.id.clone()),
        );

        let fields = ChannelFields {
            display_name: Some(LOUNGE_DISPLAY_NAME.to_string()),
            avatar_url: Some(LOUNGE_AVATAR_URL.to_string()),
            created_by: Some(session_user_id.to_string()),
            member_ids: member_ids.clone(),
        };
        let created = retry_rate_limited(|| {
            self.messaging
                .create_or_get_channel(ChannelKind::Group, Some(LOUNGE_CHANNEL_ID), fields.clone())
        })
        .await;

        match created {
            Ok(_) | Err(ServiceError::AlreadyExists(_)) => {}
            Err(e) => {
                warn!(channel = LOUNGE_CHANNEL_ID, error = %e, "Lounge creation failed");
                return ItemOutcome::failed(LOUNGE_CHANNEL_ID, e.to_string());
            }
        }

        // Reuse may predate this pass's personas; re-add the member set and
        // refresh metadata regardless of who created the channel.
        if let Err(e) = self
            .messaging
            .add_members(LOUNGE_CHANNEL_ID, &member_ids)
            .await
        {
            warn!(channel = LOUNGE_CHANNEL_ID, error = %e, "Lounge member refresh failed");
            return ItemOutcome::failed(LOUNGE_CHANNEL_ID, e.to_string());
        }

        if let Err(e) = self
            .messaging
            .update_channel(
                LOUNGE_CHANNEL_ID,
                ChannelFields {
                    display_name: Some(LOUNGE_DISPLAY_NAME.to_string()),
                    avatar_url: Some(LOUNGE_AVATAR_URL.to_string()),
                    ..Default::default()
                },
            )
            .await
        {
            warn!(channel = LOUNGE_CHANNEL_ID, error = %e, "Lounge metadata update failed");
            return ItemOutcome::failed(LOUNGE_CHANNEL_ID, e.to_string());
        }

        ItemOutcome::succeeded(LOUNGE_CHANNEL_ID, ())
    }

    /// Create or reuse the DM between the session user and one persona.
    /// Metadata is backfilled only when absent or a known placeholder, so a
    /// later customization is never overwritten.
    async fn seed_direct(&self, session_user_id: &str, persona: &WorkingUser) -> ItemOutcome {
        let fields = ChannelFields {
            created_by: Some(session_user_id.to_string()),
            member_ids: vec![session_user_id.to_string(), persona.id.clone()],
            ..Default::default()
        };

        let created = retry_rate_limited(|| {
            self.messaging
                .create_or_get_channel(ChannelKind::Direct, None, fields.clone())
        })
        .await;

        let channel = match created {
            Ok(channel) => channel,
            Err(e) => {
                warn!(persona = %persona.id, error = %e, "DM creation failed, skipping");
                return ItemOutcome::failed(persona.id.clone(), e.to_string());
            }
        };

        let needs_backfill = match channel.display_name.as_deref() {
            None => true,
            Some(name) => DM_PLACEHOLDER_NAMES.contains(&name),
        };

        if needs_backfill {
            if let Err(e) = self
                .messaging
                .update_channel(
                    &channel.id,
                    ChannelFields {
                        display_name: Some(persona.display_name.clone()),
                        avatar_url: Some(persona.avatar_url.clone()),
                        ..Default::default()
                    },
                )
                .await
            {
                warn!(channel = %channel.id, error = %e, "DM metadata backfill failed, skipping");
                return ItemOutcome::failed(channel.id, e.to_string());
            }
        } else {
            debug!(channel = %channel.id, "DM metadata already customized, leaving as-is");
        }

        ItemOutcome::succeeded(channel.id, ())
    }
}
