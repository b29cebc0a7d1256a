//! Per-player respawn state and the registry that owns it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{MapId, PlayerGuid};
use crate::location::{DungeonLocation, Position};

/// Last known instance location for one player, plus the flags that drive
/// capture and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RespawnRecord {
    pub guid: PlayerGuid,
    pub location: DungeonLocation,
    /// True between "a cross-map teleport was requested" and "the arrival in
    /// the new map has been observed". The location may only be captured
    /// after the player has actually arrived, never at request time.
    pub awaiting_map_arrival: bool,
    /// Mirror of the player's last observed dungeon/raid membership. Gates
    /// whether the record is persisted or its row deleted at flush time.
    pub in_instance: bool,
}

impl RespawnRecord {
    /// Fresh record for a player seen for the first time this process.
    pub fn new(guid: PlayerGuid) -> Self {
        Self {
            guid,
            location: DungeonLocation::unset(),
            awaiting_map_arrival: false,
            in_instance: false,
        }
    }

    /// Record reconstructed from storage. Dungeon membership and arrival
    /// state are unknown until fresh host events come in, so both flags
    /// start false.
    pub fn from_storage(guid: PlayerGuid, location: DungeonLocation) -> Self {
        Self {
            guid,
            location,
            awaiting_map_arrival: false,
            in_instance: false,
        }
    }
}

/// Registry of every player seen during this process's lifetime (or loaded
/// from storage), keyed by guid. Records are created lazily and never
/// removed during a run; only a config reload clears the registry.
#[derive(Debug, Default)]
pub struct RespawnRegistry {
    records: HashMap<PlayerGuid, RespawnRecord>,
}

impl RespawnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `guid`, creating a fresh one on first access.
    /// Repeated calls for the same guid never create a second record.
    pub fn get_or_create(&mut self, guid: PlayerGuid) -> &mut RespawnRecord {
        self.records
            .entry(guid)
            .or_insert_with(|| RespawnRecord::new(guid))
    }

    /// Arms the next map-change capture. Called whenever a teleport to a
    /// different map is about to happen, regardless of dungeon context: the
    /// destination map is not known to be a dungeon until arrival.
    pub fn mark_awaiting_arrival(&mut self, guid: PlayerGuid) {
        self.get_or_create(guid).awaiting_map_arrival = true;
    }

    /// Applies a map-change observation. Must run after the player's
    /// position has actually updated to the new map; stale coordinates here
    /// are a caller-side correctness violation.
    ///
    /// Always refreshes the dungeon-membership mirror. Captures the
    /// location and disarms the pending capture only when the player is in
    /// an instance and a capture is armed.
    pub fn update_on_map_change(
        &mut self,
        guid: PlayerGuid,
        map: MapId,
        pos: Position,
        in_instance: bool,
    ) {
        let record = self.get_or_create(guid);
        record.in_instance = in_instance;

        if !in_instance || !record.awaiting_map_arrival {
            return;
        }

        record.location = DungeonLocation::captured(map, pos);
        record.awaiting_map_arrival = false;
    }

    /// Reattaches a record loaded from storage. An already-known guid keeps
    /// its live record; storage never overrides live state.
    pub fn insert(&mut self, record: RespawnRecord) {
        self.records.entry(record.guid).or_insert(record);
    }

    /// Single-pass traversal for the persistence flush.
    pub fn iter(&self) -> impl Iterator<Item = &RespawnRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Empties the registry. Reload path only: the caller must have flushed
    /// first or the unsaved state is gone.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
