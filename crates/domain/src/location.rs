//! Point-in-space snapshots inside an instanced map.

use serde::{Deserialize, Serialize};

use crate::ids::MapId;

/// World-space position plus facing, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Orientation in radians.
    pub o: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32, o: f32) -> Self {
        Self { x, y, z, o }
    }
}

/// A saved respawn point inside a dungeon or raid.
///
/// `map == None` means no location has been captured yet. A `Some` map is
/// always paired with coordinates taken at the moment of capture.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DungeonLocation {
    pub map: Option<MapId>,
    pub pos: Position,
}

impl DungeonLocation {
    /// A location that has not been captured yet.
    pub const fn unset() -> Self {
        Self {
            map: None,
            pos: Position::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    pub const fn captured(map: MapId, pos: Position) -> Self {
        Self {
            map: Some(map),
            pos,
        }
    }

    /// Whether this location is captured and lies on `map`.
    pub fn matches(&self, map: MapId) -> bool {
        self.map == Some(map)
    }
}
