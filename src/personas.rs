//! Fixed demo fixtures
//!
//! The persona catalog, the shared lounge channel, and the small set of
//! illustrative feed posts every seeded environment starts with.

/// A baseline demo persona. The live id is `{base_id}-{run timestamp}`.
#[derive(Debug, Clone, Copy)]
pub struct PersonaSpec {
    pub base_id: &'static str,
    pub display_name: &'static str,
    pub avatar_url: &'static str,
}

/// The baseline persona cast, in positional order.
pub const PERSONAS: [PersonaSpec; 5] = [
    PersonaSpec {
        base_id: "maya",
        display_name: "Maya Chen",
        avatar_url: "https://i.pravatar.cc/150?img=32",
    },
    PersonaSpec {
        base_id: "jordan",
        display_name: "Jordan Avery",
        avatar_url: "https://i.pravatar.cc/150?img=12",
    },
    PersonaSpec {
        base_id: "priya",
        display_name: "Priya Raghavan",
        avatar_url: "https://i.pravatar.cc/150?img=47",
    },
    PersonaSpec {
        base_id: "felix",
        display_name: "Felix Okafor",
        avatar_url: "https://i.pravatar.cc/150?img=59",
    },
    PersonaSpec {
        base_id: "noor",
        display_name: "Noor Haddad",
        avatar_url: "https://i.pravatar.cc/150?img=26",
    },
];

/// Default id of the anchor identity cleanup must never remove.
pub const DEFAULT_ANCHOR_ID: &str = "greenroom-host";
pub const ANCHOR_DISPLAY_NAME: &str = "Greenroom Host";
pub const ANCHOR_AVATAR_URL: &str = "https://i.pravatar.cc/150?img=68";

/// The anchor's fixed shared channel. On the preserve list together with
/// the anchor itself.
pub const LOUNGE_CHANNEL_ID: &str = "greenroom-lounge";
pub const LOUNGE_DISPLAY_NAME: &str = "The Lounge";
pub const LOUNGE_AVATAR_URL: &str = "https://i.pravatar.cc/150?img=5";

/// Direct-channel names considered service placeholders. Metadata is only
/// backfilled over these, never over a later customization.
pub const DM_PLACEHOLDER_NAMES: [&str; 2] = ["", "Direct Message"];

/// An illustrative feed post attributed to a persona by catalog position.
#[derive(Debug, Clone, Copy)]
pub struct DemoPost {
    /// Preferred author index into [`PERSONAS`]. Falls back to the first
    /// available persona when that slot was lost to a provisioning failure.
    pub author_index: usize,
    pub body: &'static str,
    pub category: &'static str,
    pub attachment: Option<&'static str>,
    pub likes: u32,
    pub shares: u32,
}

/// The fixed baseline content set.
pub const DEMO_POSTS: [DemoPost; 3] = [
    DemoPost {
        author_index: 0,
        body: "Welcome to the workspace! Everything you see here was seeded \
               automatically - poke around and break things.",
        category: "announcements",
        attachment: None,
        likes: 4,
        shares: 1,
    },
    DemoPost {
        author_index: 1,
        body: "Posted the Q3 design recap. Feedback welcome before Friday.",
        category: "design",
        attachment: Some("https://images.unsplash.com/photo-1558655146-d09347e92766"),
        likes: 11,
        shares: 3,
    },
    DemoPost {
        author_index: 3,
        body: "Coffee bot is back online. You may resume shipping.",
        category: "random",
        attachment: None,
        likes: 23,
        shares: 6,
    },
];

/// Cross-persona follow edges, as (follower index, following index) pairs.
/// Added on top of the session-follows-everyone edges for demo realism.
pub const CROSS_FOLLOWS: [(usize, usize); 2] = [(1, 0), (3, 2)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_base_ids_are_unique() {
        let mut ids: Vec<_> = PERSONAS.iter().map(|p| p.base_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), PERSONAS.len());
    }

    #[test]
    fn test_fixture_indices_are_in_range() {
        for post in &DEMO_POSTS {
            assert!(post.author_index < PERSONAS.len());
        }
        for (a, b) in &CROSS_FOLLOWS {
            assert!(*a < PERSONAS.len());
            assert!(*b < PERSONAS.len());
            assert_ne!(a, b);
        }
    }
}
