//! Runtime configuration for respawn tracking.

use crate::infrastructure::ports::SettingsSource;

/// Master switch plus resurrection tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RespawnSettings {
    /// When false, every hook is a no-op.
    pub enabled: bool,
    /// Percent of max health restored on a redirected resurrection, 0-100.
    pub respawn_health_pct: f32,
}

impl Default for RespawnSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            respawn_health_pct: 50.0,
        }
    }
}

impl RespawnSettings {
    /// The 0..=1 fraction handed to the host's resurrect call.
    pub fn health_fraction(&self) -> f32 {
        self.respawn_health_pct / 100.0
    }
}

/// Environment-backed settings: `.env` first, then process environment.
///
/// - `GRAVEWARD_ENABLE` - bool, default false
/// - `GRAVEWARD_RESPAWN_HEALTH_PCT` - float, default 50.0
pub struct EnvSettingsSource;

impl EnvSettingsSource {
    pub fn new() -> Self {
        // Missing .env is fine; process environment still applies.
        dotenvy::dotenv().ok();
        Self
    }
}

impl Default for EnvSettingsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsSource for EnvSettingsSource {
    fn load(&self) -> RespawnSettings {
        let defaults = RespawnSettings::default();

        let enabled = std::env::var("GRAVEWARD_ENABLE")
            .ok()
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(defaults.enabled);

        let respawn_health_pct = std::env::var("GRAVEWARD_RESPAWN_HEALTH_PCT")
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(defaults.respawn_health_pct);

        RespawnSettings {
            enabled,
            respawn_health_pct,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
