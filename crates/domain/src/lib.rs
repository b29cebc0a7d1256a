//! Graveward domain: respawn tracking for instanced dungeons and raids.
//!
//! Pure in-memory state with no I/O. The engine crate wraps these types in a
//! service and wires them to the host and to storage.

pub mod ids;
pub mod location;
pub mod pending;
pub mod respawn;

pub use ids::{MapId, PlayerGuid};
pub use location::{DungeonLocation, Position};
pub use pending::PendingTeleportSet;
pub use respawn::{RespawnRecord, RespawnRegistry};
