//! Identity provisioning
//!
//! Creates the demo cast for a seeding pass: the immutable anchor identity
//! plus one fresh working user per baseline persona. Persona ids embed the
//! run timestamp so a pass never collides with a previously hard-deleted
//! identity sharing the same base name.
//!
//! A failure for one persona is recorded and that persona is omitted from
//! the result - it never aborts the batch.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ids::{persona_id, RunClock};
use crate::personas::{PersonaSpec, ANCHOR_AVATAR_URL, ANCHOR_DISPLAY_NAME, PERSONAS};
use crate::services::{retry_rate_limited, IdentityFields, MessagingService};
use crate::types::{GreenroomError, ItemOutcome, Result};

/// A demo identity created or reused during a seeding pass.
///
/// Never mutated after creation, only superseded by a later pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingUser {
    pub id: String,
    pub display_name: String,
    pub avatar_url: String,
}

/// Provisions the anchor and the baseline personas.
pub struct IdentityProvisioner<M> {
    messaging: Arc<M>,
    clock: Arc<dyn RunClock>,
    persona_count: usize,
}

impl<M: MessagingService> IdentityProvisioner<M> {
    pub fn new(messaging: Arc<M>, clock: Arc<dyn RunClock>) -> Self {
        Self {
            messaging,
            clock,
            persona_count: PERSONAS.len(),
        }
    }

    /// Cap the number of baseline personas provisioned per pass.
    pub fn with_persona_count(mut self, count: usize) -> Self {
        self.persona_count = count.min(PERSONAS.len());
        self
    }

    /// Provision the anchor plus 0..N personas.
    ///
    /// The anchor upsert is an update when the id already exists, never an
    /// error; an anchor failure aborts the phase since nothing downstream is
    /// meaningful without it. Persona upserts fan out concurrently and fail
    /// independently. The anchor row always comes first in the result.
    pub async fn provision(&self, anchor_id: &str) -> Result<Vec<ItemOutcome<WorkingUser>>> {
        let anchor = WorkingUser {
            id: anchor_id.to_string(),
            display_name: ANCHOR_DISPLAY_NAME.to_string(),
            avatar_url: ANCHOR_AVATAR_URL.to_string(),
        };

        let anchor_fields = IdentityFields {
            display_name: Some(anchor.display_name.clone()),
            avatar_url: Some(anchor.avatar_url.clone()),
            role: Some("host".to_string()),
        };
        retry_rate_limited(|| {
            self.messaging
                .upsert_identity(&anchor.id, anchor_fields.clone())
        })
        .await
        .map_err(|e| {
            GreenroomError::Messaging(format!("anchor upsert failed for {anchor_id}: {e}"))
        })?;

        // One disambiguator per pass; ids within a pass stay unique because
        // persona base names are unique.
        let run_stamp = self.clock.timestamp_millis();

        let futures = PERSONAS
            .iter()
            .take(self.persona_count)
            .map(|spec| self.provision_persona(spec, run_stamp));
        let persona_rows = join_all(futures).await;

        let provisioned = persona_rows.iter().filter(|r| r.is_success()).count();
        info!(
            anchor = %anchor.id,
            run_stamp,
            provisioned,
            requested = self.persona_count,
            "Identity provisioning pass complete"
        );

        let mut rows = Vec::with_capacity(1 + persona_rows.len());
        rows.push(ItemOutcome::succeeded(anchor.id.clone(), anchor));
        rows.extend(persona_rows);
        Ok(rows)
    }

    async fn provision_persona(
        &self,
        spec: &PersonaSpec,
        run_stamp: i64,
    ) -> ItemOutcome<WorkingUser> {
        let user = WorkingUser {
            id: persona_id(spec.base_id, run_stamp),
            display_name: spec.display_name.to_string(),
            avatar_url: spec.avatar_url.to_string(),
        };

        let fields = IdentityFields {
            display_name: Some(user.display_name.clone()),
            avatar_url: Some(user.avatar_url.clone()),
            role: Some("persona".to_string()),
        };

        let upserted =
            retry_rate_limited(|| self.messaging.upsert_identity(&user.id, fields.clone())).await;
        match upserted {
            Ok(()) => ItemOutcome::succeeded(user.id.clone(), user),
            Err(e) => {
                warn!(persona = %user.id, error = %e, "Persona provisioning failed, omitting from pass");
                ItemOutcome::failed(user.id, e.to_string())
            }
        }
    }
}
