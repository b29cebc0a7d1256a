//! SQLite-backed respawn location storage.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use graveward_domain::{DungeonLocation, MapId, PlayerGuid, Position, RespawnRecord};

use crate::infrastructure::ports::{RepoError, RespawnStore};

/// Sentinel in the `map` column for a location that was never captured.
/// The column is signed so the sentinel fits below every real map id.
const NO_MAP: i64 = -1;

/// SQLite implementation of [`RespawnStore`].
///
/// One row per tracked player; guids outside the table simply have no saved
/// location. Schema management beyond this single table is the host's job.
pub struct SqliteRespawnStore {
    pool: SqlitePool,
}

impl SqliteRespawnStore {
    pub async fn connect(db_path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path)).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS respawn_locations (
                guid INTEGER PRIMARY KEY,
                map INTEGER NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                z REAL NOT NULL,
                o REAL NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_row(row: &SqliteRow) -> Result<RespawnRecord, sqlx::Error> {
    let guid: i64 = row.try_get("guid")?;
    let map: i64 = row.try_get("map")?;
    let pos = Position::new(
        row.try_get("x")?,
        row.try_get("y")?,
        row.try_get("z")?,
        row.try_get("o")?,
    );

    let location = if map == NO_MAP {
        DungeonLocation::unset()
    } else {
        DungeonLocation::captured(MapId::new(map as u32), pos)
    };

    Ok(RespawnRecord::from_storage(PlayerGuid::new(guid as u64), location))
}

#[async_trait]
impl RespawnStore for SqliteRespawnStore {
    async fn load_all(&self) -> Result<Vec<RespawnRecord>, RepoError> {
        let rows = sqlx::query("SELECT guid, map, x, y, z, o FROM respawn_locations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("load_all", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_row(row) {
                Ok(record) => records.push(record),
                // Should be impossible under the fixed schema; skip rather
                // than abort the whole load.
                Err(e) => tracing::warn!(error = %e, "skipping malformed respawn row"),
            }
        }

        Ok(records)
    }

    async fn upsert(&self, guid: PlayerGuid, location: &DungeonLocation) -> Result<(), RepoError> {
        let map = location.map.map_or(NO_MAP, |m| i64::from(m.raw()));

        sqlx::query(
            r#"
            INSERT INTO respawn_locations (guid, map, x, y, z, o)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                map = excluded.map,
                x = excluded.x,
                y = excluded.y,
                z = excluded.z,
                o = excluded.o
            "#,
        )
        .bind(guid.raw() as i64)
        .bind(map)
        .bind(location.pos.x)
        .bind(location.pos.y)
        .bind(location.pos.z)
        .bind(location.pos.o)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("upsert", e))?;

        Ok(())
    }

    async fn delete(&self, guid: PlayerGuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM respawn_locations WHERE guid = ?")
            .bind(guid.raw() as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("delete", e))?;

        Ok(())
    }
}
