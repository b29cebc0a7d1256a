//! Graveward engine library.
//!
//! Redirects the post-death "release ghost" graveyard teleport back to a
//! player's last known location inside an instanced dungeon or raid.
//!
//! ## Structure
//!
//! - `hooks` - Inbound host contract (events, player snapshots, decisions)
//! - `service` - The state-owning service implementing the hooks
//! - `infrastructure/` - External dependency implementations (ports + adapters)

pub mod hooks;
pub mod infrastructure;
pub mod service;

pub use hooks::{GameEventHooks, PlayerView, TeleportDecision};
pub use infrastructure::ports::{HostError, HostPort, RepoError, RespawnStore, SettingsSource};
pub use infrastructure::settings::{EnvSettingsSource, RespawnSettings};
pub use infrastructure::store::SqliteRespawnStore;
pub use service::RespawnService;
