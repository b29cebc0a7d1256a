//! Inbound host contract: the events the host engine feeds into this core.
//!
//! The host registers thin glue that forwards its own player/world callbacks
//! to a [`GameEventHooks`] implementation. Registration itself is outside
//! this crate's concern.

use async_trait::async_trait;

use graveward_domain::{MapId, PlayerGuid, Position};

use crate::infrastructure::ports::RepoError;

/// Snapshot of host-side player state at the moment an event fires.
///
/// The host builds this before invoking a hook; the core never reaches back
/// into live player objects, so a stale view is a caller-side bug.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerView {
    pub guid: PlayerGuid,
    /// Map the player is currently on. For teleport events this is the
    /// pre-teleport map.
    pub map: MapId,
    pub pos: Position,
    pub is_dead: bool,
    /// Whether the current map is a dungeon or raid instance.
    pub in_instance: bool,
}

/// Outcome of a teleport interception, returned to the host to act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TeleportDecision {
    /// Execute the teleport as originally requested.
    Proceed,
    /// The core has already teleported and resurrected the player at the
    /// saved dungeon location; the host must suppress the original teleport.
    Override { map: MapId, pos: Position },
}

/// The host events this core consumes.
#[async_trait]
pub trait GameEventHooks: Send + Sync {
    async fn on_login(&self, guid: PlayerGuid);

    async fn on_logout(&self, guid: PlayerGuid);

    /// Only meaningful for a dead player inside a dungeon/raid; the host
    /// does not offer release-ghost to living players.
    async fn on_released_ghost(&self, view: &PlayerView);

    /// Invoked immediately before the host executes any teleport for a
    /// player. `view` carries the pre-teleport state.
    async fn on_before_teleport(
        &self,
        view: &PlayerView,
        dest_map: MapId,
        dest_pos: Position,
    ) -> TeleportDecision;

    /// Fired after the player's map and position have been updated.
    async fn on_map_changed(&self, view: &PlayerView);

    /// Startup and reload entry point: refreshes settings and reloads saved
    /// locations from storage. A reload flushes live state first.
    async fn on_config_loaded(&self, is_reload: bool) -> Result<(), RepoError>;

    async fn on_shutdown(&self);
}
