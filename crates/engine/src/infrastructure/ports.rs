//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the engine. Ports exist for:
//! - Respawn location storage (could swap SQLite -> another store)
//! - Host engine calls (teleport/resurrect/corpse, mockable in tests)
//! - Settings (environment in production, fixed values in tests)

use async_trait::async_trait;

use graveward_domain::{DungeonLocation, MapId, PlayerGuid, Position, RespawnRecord};

use crate::infrastructure::settings::RespawnSettings;

/// Storage operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },
}

impl RepoError {
    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }
}

/// Failures of outbound host calls. The player reference may be gone by the
/// time a call lands; that is an expected no-op, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("player {0} is not available")]
    PlayerUnavailable(PlayerGuid),
    #[error("host call failed: {0}")]
    Failed(String),
}

// =============================================================================
// Storage Port
// =============================================================================

/// Durable respawn location rows, keyed by player guid.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RespawnStore: Send + Sync {
    /// Load every stored row. An empty store yields `Ok(vec![])`, not an
    /// error; loaded records carry both tracking flags false.
    async fn load_all(&self) -> Result<Vec<RespawnRecord>, RepoError>;

    /// Insert the row for `guid`, or overwrite all its location fields.
    async fn upsert(&self, guid: PlayerGuid, location: &DungeonLocation) -> Result<(), RepoError>;

    /// Remove the row for `guid`. Removing an absent row is not an error.
    async fn delete(&self, guid: PlayerGuid) -> Result<(), RepoError>;
}

// =============================================================================
// Host Engine Port
// =============================================================================

/// Outbound calls into the host engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostPort: Send + Sync {
    async fn teleport_player(
        &self,
        guid: PlayerGuid,
        map: MapId,
        pos: Position,
    ) -> Result<(), HostError>;

    /// `health_fraction` is the restored share of max health, 0..=1.
    async fn resurrect_player(&self, guid: PlayerGuid, health_fraction: f32)
        -> Result<(), HostError>;

    /// Leaves a corpse marker at the death location after a redirected
    /// resurrection.
    async fn spawn_corpse_marker(&self, guid: PlayerGuid) -> Result<(), HostError>;
}

// =============================================================================
// Settings Port
// =============================================================================

/// Where runtime settings come from. Read at startup and on every reload.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> RespawnSettings;
}
