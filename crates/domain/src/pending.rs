//! Players waiting for their release-ghost teleport to be redirected.

use std::collections::HashSet;

use crate::ids::PlayerGuid;

/// Set of players whose next matching teleport should be intercepted.
///
/// An entry is added when a dead player releases their spirit inside an
/// instance, and removed either by the single consumption point
/// ([`consume_if_pending`](Self::consume_if_pending)) or on logout. An entry
/// that never matches a teleport dangles until logout; there is no expiry.
#[derive(Debug, Default)]
pub struct PendingTeleportSet {
    players: HashSet<PlayerGuid>,
}

impl PendingTeleportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a player as awaiting a redirect. At most one entry per player;
    /// re-marking is a no-op.
    pub fn mark_pending(&mut self, guid: PlayerGuid) {
        self.players.insert(guid);
    }

    /// Check-and-remove in one step, so a release/teleport pair fires at
    /// most once. Returns whether the player was pending.
    pub fn consume_if_pending(&mut self, guid: PlayerGuid) -> bool {
        self.players.remove(&guid)
    }

    /// Unconditional removal on logout. Guid reuse across sessions must not
    /// resurrect a stale redirect intent.
    pub fn clear(&mut self, guid: PlayerGuid) {
        self.players.remove(&guid);
    }

    pub fn contains(&self, guid: PlayerGuid) -> bool {
        self.players.contains(&guid)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
