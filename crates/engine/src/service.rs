//! The respawn service: host event handling, teleport interception, and
//! persistence orchestration.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use graveward_domain::{MapId, PendingTeleportSet, PlayerGuid, Position, RespawnRegistry};

use crate::hooks::{GameEventHooks, PlayerView, TeleportDecision};
use crate::infrastructure::ports::{HostPort, RepoError, RespawnStore, SettingsSource};
use crate::infrastructure::settings::RespawnSettings;

/// Owns all respawn-tracking state for the process.
///
/// Constructed once and handed to the host's hook glue. Each collection sits
/// behind its own lock so a multi-threaded host cannot interleave the flush
/// traversal with live event mutation; under the usual single simulation
/// thread the locks are uncontended.
pub struct RespawnService {
    settings: RwLock<RespawnSettings>,
    registry: RwLock<RespawnRegistry>,
    pending: RwLock<PendingTeleportSet>,
    store: Arc<dyn RespawnStore>,
    host: Arc<dyn HostPort>,
    config: Arc<dyn SettingsSource>,
}

impl RespawnService {
    /// Starts disabled with empty state; `on_config_loaded(false)` is the
    /// startup call that reads settings and storage.
    pub fn new(
        store: Arc<dyn RespawnStore>,
        host: Arc<dyn HostPort>,
        config: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            settings: RwLock::new(RespawnSettings::default()),
            registry: RwLock::new(RespawnRegistry::new()),
            pending: RwLock::new(PendingTeleportSet::new()),
            store,
            host,
            config,
        }
    }

    async fn enabled(&self) -> bool {
        self.settings.read().await.enabled
    }

    /// Per-record flush: players still inside an instance get their row
    /// upserted, everyone else's row is deleted. Deletion here is the only
    /// garbage collection the durable store gets. One failing record must
    /// not stop the rest.
    async fn save_all(&self) {
        let records: Vec<_> = {
            let registry = self.registry.read().await;
            registry.iter().copied().collect()
        };

        for record in records {
            let result = if record.in_instance {
                self.store.upsert(record.guid, &record.location).await
            } else {
                self.store.delete(record.guid).await
            };

            if let Err(e) = result {
                tracing::warn!(guid = %record.guid, error = %e, "failed to flush respawn record");
            }
        }
    }
}

#[async_trait]
impl GameEventHooks for RespawnService {
    async fn on_login(&self, guid: PlayerGuid) {
        if !self.enabled().await {
            return;
        }
        self.registry.write().await.get_or_create(guid);
    }

    async fn on_logout(&self, guid: PlayerGuid) {
        if !self.enabled().await {
            return;
        }
        self.pending.write().await.clear(guid);
    }

    async fn on_released_ghost(&self, view: &PlayerView) {
        if !self.enabled().await || !view.in_instance {
            return;
        }
        self.pending.write().await.mark_pending(view.guid);
    }

    async fn on_before_teleport(
        &self,
        view: &PlayerView,
        dest_map: MapId,
        _dest_pos: Position,
    ) -> TeleportDecision {
        let settings = *self.settings.read().await;
        if !settings.enabled {
            return TeleportDecision::Proceed;
        }

        // Any cross-map teleport arms the next capture, whatever the
        // destination turns out to be; it is not known to be a dungeon
        // until arrival.
        if view.map != dest_map {
            self.registry.write().await.mark_awaiting_arrival(view.guid);
        }

        if !view.in_instance || !view.is_dead {
            return TeleportDecision::Proceed;
        }

        if !self.pending.write().await.consume_if_pending(view.guid) {
            return TeleportDecision::Proceed;
        }

        let saved = {
            let mut registry = self.registry.write().await;
            registry.get_or_create(view.guid).location
        };

        if !saved.matches(dest_map) {
            // The pending entry stays consumed even though nothing was
            // redirected; a later matching teleport will not fire.
            return TeleportDecision::Proceed;
        }

        if let Err(e) = self
            .host
            .teleport_player(view.guid, dest_map, saved.pos)
            .await
        {
            tracing::warn!(guid = %view.guid, error = %e, "redirect teleport failed, letting the original proceed");
            return TeleportDecision::Proceed;
        }

        if let Err(e) = self
            .host
            .resurrect_player(view.guid, settings.health_fraction())
            .await
        {
            tracing::warn!(guid = %view.guid, error = %e, "resurrect after redirect failed");
        }

        if let Err(e) = self.host.spawn_corpse_marker(view.guid).await {
            tracing::warn!(guid = %view.guid, error = %e, "corpse marker spawn failed");
        }

        tracing::debug!(guid = %view.guid, map = %dest_map, "redirected release teleport to saved dungeon location");
        TeleportDecision::Override {
            map: dest_map,
            pos: saved.pos,
        }
    }

    async fn on_map_changed(&self, view: &PlayerView) {
        if !self.enabled().await {
            return;
        }
        self.registry
            .write()
            .await
            .update_on_map_change(view.guid, view.map, view.pos, view.in_instance);
    }

    async fn on_config_loaded(&self, is_reload: bool) -> Result<(), RepoError> {
        if is_reload {
            if self.enabled().await {
                self.save_all().await;
            }
            self.registry.write().await.clear();
        }

        let fresh = self.config.load();
        let enabled = fresh.enabled;
        *self.settings.write().await = fresh;

        if !enabled {
            tracing::debug!("respawn tracking disabled, skipping location load");
            return Ok(());
        }

        let records = self.store.load_all().await?;
        let count = records.len();
        {
            let mut registry = self.registry.write().await;
            for record in records {
                registry.insert(record);
            }
        }
        tracing::info!(rows = count, "loaded saved respawn locations");
        Ok(())
    }

    async fn on_shutdown(&self) {
        if !self.enabled().await {
            return;
        }
        self.save_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        HostError, MockHostPort, MockRespawnStore, MockSettingsSource,
    };
    use graveward_domain::{DungeonLocation, RespawnRecord};
    use mockall::Sequence;

    const P: PlayerGuid = PlayerGuid::new(7);
    const Q: PlayerGuid = PlayerGuid::new(8);
    const DUNGEON: MapId = MapId::new(389);
    const GRAVEYARD: MapId = MapId::new(0);

    fn enabled_settings() -> RespawnSettings {
        RespawnSettings {
            enabled: true,
            respawn_health_pct: 50.0,
        }
    }

    fn service_with(
        store: MockRespawnStore,
        host: MockHostPort,
        settings: RespawnSettings,
    ) -> RespawnService {
        let mut source = MockSettingsSource::new();
        source.expect_load().return_const(settings);
        RespawnService::new(Arc::new(store), Arc::new(host), Arc::new(source))
    }

    /// Service after the startup config load.
    async fn started(service: RespawnService) -> RespawnService {
        service.on_config_loaded(false).await.unwrap();
        service
    }

    fn empty_store() -> MockRespawnStore {
        let mut store = MockRespawnStore::new();
        store.expect_load_all().returning(|| Ok(Vec::new()));
        store
    }

    fn view(guid: PlayerGuid, map: MapId, pos: Position, is_dead: bool, in_instance: bool) -> PlayerView {
        PlayerView {
            guid,
            map,
            pos,
            is_dead,
            in_instance,
        }
    }

    /// Walks a player through the host's enter-dungeon event pair: an
    /// outbound cross-map teleport followed by the arrival map-change.
    async fn enter_dungeon(service: &RespawnService, guid: PlayerGuid, map: MapId, pos: Position) {
        let outside = view(guid, GRAVEYARD, Position::default(), false, false);
        let decision = service.on_before_teleport(&outside, map, pos).await;
        assert_eq!(decision, TeleportDecision::Proceed);
        service.on_map_changed(&view(guid, map, pos, false, true)).await;
    }

    #[tokio::test]
    async fn login_tracks_each_player_once() {
        let service = started(service_with(
            empty_store(),
            MockHostPort::new(),
            enabled_settings(),
        ))
        .await;

        service.on_login(P).await;
        service.on_login(P).await;

        assert_eq!(service.registry.read().await.len(), 1);
    }

    #[tokio::test]
    async fn same_map_teleport_while_alive_does_not_arm_capture() {
        let service = started(service_with(
            empty_store(),
            MockHostPort::new(),
            enabled_settings(),
        ))
        .await;
        let inside = view(P, MapId::new(1), Position::new(5.0, 5.0, 5.0, 0.0), false, true);

        let decision = service
            .on_before_teleport(&inside, MapId::new(1), Position::new(8.0, 8.0, 8.0, 0.0))
            .await;

        assert_eq!(decision, TeleportDecision::Proceed);
        assert!(
            !service
                .registry
                .write()
                .await
                .get_or_create(P)
                .awaiting_map_arrival
        );
    }

    #[tokio::test]
    async fn cross_map_teleport_always_arms_capture() {
        let service = started(service_with(
            empty_store(),
            MockHostPort::new(),
            enabled_settings(),
        ))
        .await;
        let outside = view(P, GRAVEYARD, Position::default(), false, false);

        let decision = service
            .on_before_teleport(&outside, DUNGEON, Position::default())
            .await;

        assert_eq!(decision, TeleportDecision::Proceed);
        assert!(
            service
                .registry
                .write()
                .await
                .get_or_create(P)
                .awaiting_map_arrival
        );
    }

    #[tokio::test]
    async fn alive_or_outside_players_are_never_redirected() {
        let pos = Position::new(10.0, 20.0, 30.0, 0.0);
        let service = started(service_with(
            empty_store(),
            MockHostPort::new(),
            enabled_settings(),
        ))
        .await;

        enter_dungeon(&service, P, DUNGEON, pos).await;
        service
            .on_released_ghost(&view(P, DUNGEON, pos, true, true))
            .await;

        // Alive inside the dungeon: gate fires before consumption, so the
        // pending entry survives.
        let alive = view(P, DUNGEON, pos, false, true);
        assert_eq!(
            service.on_before_teleport(&alive, DUNGEON, pos).await,
            TeleportDecision::Proceed
        );
        assert!(service.pending.read().await.contains(P));

        // Dead but no longer inside an instance: same.
        let outside = view(P, GRAVEYARD, pos, true, false);
        assert_eq!(
            service.on_before_teleport(&outside, GRAVEYARD, pos).await,
            TeleportDecision::Proceed
        );
        assert!(service.pending.read().await.contains(P));
    }

    #[tokio::test]
    async fn released_ghost_is_redirected_to_saved_location() {
        let pos = Position::new(10.0, 20.0, 30.0, 0.0);

        let mut host = MockHostPort::new();
        host.expect_teleport_player()
            .withf(move |guid, map, p| *guid == P && *map == DUNGEON && *p == pos)
            .once()
            .returning(|_, _, _| Ok(()));
        host.expect_resurrect_player()
            .withf(|guid, frac| *guid == P && (*frac - 0.5).abs() < f32::EPSILON)
            .once()
            .returning(|_, _| Ok(()));
        host.expect_spawn_corpse_marker()
            .withf(|guid| *guid == P)
            .once()
            .returning(|_| Ok(()));

        let service = started(service_with(empty_store(), host, enabled_settings())).await;
        service.on_login(P).await;
        enter_dungeon(&service, P, DUNGEON, pos).await;

        let dead = view(P, DUNGEON, Position::new(11.0, 21.0, 31.0, 0.0), true, true);
        service.on_released_ghost(&dead).await;
        assert!(service.pending.read().await.contains(P));

        // This dungeon's graveyard is on the same map, so the requested
        // destination matches the saved location.
        let decision = service
            .on_before_teleport(&dead, DUNGEON, Position::new(500.0, 500.0, 0.0, 0.0))
            .await;

        assert_eq!(decision, TeleportDecision::Override { map: DUNGEON, pos });
        assert!(service.pending.read().await.is_empty());
    }

    #[tokio::test]
    async fn graveyard_on_another_map_proceeds_and_still_consumes() {
        let pos = Position::new(10.0, 20.0, 30.0, 0.0);
        let service = started(service_with(
            empty_store(),
            MockHostPort::new(),
            enabled_settings(),
        ))
        .await;

        enter_dungeon(&service, P, DUNGEON, pos).await;
        let dead = view(P, DUNGEON, pos, true, true);
        service.on_released_ghost(&dead).await;

        let decision = service
            .on_before_teleport(&dead, GRAVEYARD, Position::default())
            .await;
        assert_eq!(decision, TeleportDecision::Proceed);
        assert!(service.pending.read().await.is_empty());

        // The consumed entry is not re-armed: a second teleport shortly
        // after release is never redirected, even at the dungeon itself.
        let second = service.on_before_teleport(&dead, DUNGEON, pos).await;
        assert_eq!(second, TeleportDecision::Proceed);
    }

    #[tokio::test]
    async fn logout_clears_pending_and_release_after_relogin_arms_fresh() {
        let pos = Position::new(10.0, 20.0, 30.0, 0.0);
        let service = started(service_with(
            empty_store(),
            MockHostPort::new(),
            enabled_settings(),
        ))
        .await;
        let dead = view(P, DUNGEON, pos, true, true);

        service.on_released_ghost(&dead).await;
        assert!(service.pending.read().await.contains(P));

        service.on_logout(P).await;
        assert!(service.pending.read().await.is_empty());

        service.on_login(P).await;
        service.on_released_ghost(&dead).await;
        assert!(service.pending.read().await.contains(P));
    }

    #[tokio::test]
    async fn resurrection_health_fraction_follows_settings() {
        let pos = Position::new(1.0, 2.0, 3.0, 0.0);
        let settings = RespawnSettings {
            enabled: true,
            respawn_health_pct: 75.0,
        };

        let mut host = MockHostPort::new();
        host.expect_teleport_player().once().returning(|_, _, _| Ok(()));
        host.expect_resurrect_player()
            .withf(|_, frac| (*frac - 0.75).abs() < f32::EPSILON)
            .once()
            .returning(|_, _| Ok(()));
        host.expect_spawn_corpse_marker().once().returning(|_| Ok(()));

        let service = started(service_with(empty_store(), host, settings)).await;
        enter_dungeon(&service, P, DUNGEON, pos).await;

        let dead = view(P, DUNGEON, pos, true, true);
        service.on_released_ghost(&dead).await;
        let decision = service.on_before_teleport(&dead, DUNGEON, pos).await;
        assert_eq!(decision, TeleportDecision::Override { map: DUNGEON, pos });
    }

    #[tokio::test]
    async fn vanished_player_degrades_to_proceed() {
        let pos = Position::new(1.0, 2.0, 3.0, 0.0);

        let mut host = MockHostPort::new();
        host.expect_teleport_player()
            .once()
            .returning(|guid, _, _| Err(HostError::PlayerUnavailable(guid)));
        // No resurrect or corpse expectations: neither may be called after
        // a failed teleport.

        let service = started(service_with(empty_store(), host, enabled_settings())).await;
        enter_dungeon(&service, P, DUNGEON, pos).await;

        let dead = view(P, DUNGEON, pos, true, true);
        service.on_released_ghost(&dead).await;

        let decision = service.on_before_teleport(&dead, DUNGEON, pos).await;
        assert_eq!(decision, TeleportDecision::Proceed);
        assert!(service.pending.read().await.is_empty());
    }

    #[tokio::test]
    async fn disabled_module_ignores_every_event() {
        // No store or host expectations: nothing may be called.
        let service = service_with(
            MockRespawnStore::new(),
            MockHostPort::new(),
            RespawnSettings::default(),
        );
        service.on_config_loaded(false).await.unwrap();

        let dead = view(P, DUNGEON, Position::default(), true, true);
        service.on_login(P).await;
        service.on_released_ghost(&dead).await;
        service.on_map_changed(&dead).await;
        assert_eq!(
            service
                .on_before_teleport(&dead, DUNGEON, Position::default())
                .await,
            TeleportDecision::Proceed
        );
        service.on_shutdown().await;

        assert!(service.registry.read().await.is_empty());
        assert!(service.pending.read().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_upserts_instance_players_and_deletes_the_rest() {
        let pos = Position::new(10.0, 20.0, 30.0, 0.0);

        let mut store = MockRespawnStore::new();
        store.expect_load_all().returning(|| Ok(Vec::new()));
        store
            .expect_upsert()
            .withf(move |guid, location| *guid == P && location.matches(DUNGEON))
            .once()
            .returning(|_, _| Ok(()));
        store
            .expect_delete()
            .withf(|guid| *guid == Q)
            .once()
            .returning(|_| Ok(()));

        let service = started(service_with(store, MockHostPort::new(), enabled_settings())).await;
        enter_dungeon(&service, P, DUNGEON, pos).await;
        service.on_login(Q).await;

        service.on_shutdown().await;
    }

    #[tokio::test]
    async fn flush_continues_after_a_failed_save() {
        let pos = Position::new(10.0, 20.0, 30.0, 0.0);

        let mut store = MockRespawnStore::new();
        store.expect_load_all().returning(|| Ok(Vec::new()));
        store
            .expect_upsert()
            .withf(|guid, _| *guid == P)
            .once()
            .returning(|_, _| Err(RepoError::database("upsert", "disk full")));
        store
            .expect_upsert()
            .withf(|guid, _| *guid == Q)
            .once()
            .returning(|_, _| Ok(()));

        let service = started(service_with(store, MockHostPort::new(), enabled_settings())).await;
        enter_dungeon(&service, P, DUNGEON, pos).await;
        enter_dungeon(&service, Q, DUNGEON, pos).await;

        // Both expectations must be satisfied despite the first failure.
        service.on_shutdown().await;
    }

    #[tokio::test]
    async fn reload_flushes_live_state_then_mirrors_storage() {
        let live_pos = Position::new(1.0, 2.0, 3.0, 0.5);
        let stored = RespawnRecord::from_storage(
            P,
            DungeonLocation::captured(MapId::new(429), Position::new(9.0, 9.0, 9.0, 0.0)),
        );

        let mut store = MockRespawnStore::new();
        let mut seq = Sequence::new();
        store
            .expect_load_all()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));
        store
            .expect_upsert()
            .withf(move |guid, location| *guid == P && location.matches(DUNGEON))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        store
            .expect_load_all()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(vec![stored]));

        let service = started(service_with(store, MockHostPort::new(), enabled_settings())).await;
        enter_dungeon(&service, P, DUNGEON, live_pos).await;

        service.on_config_loaded(true).await.unwrap();

        let registry = service.registry.read().await;
        assert_eq!(registry.len(), 1);
        let record = registry.iter().next().unwrap();
        assert_eq!(record.guid, P);
        assert_eq!(record.location, stored.location);
        assert!(!record.awaiting_map_arrival);
        assert!(!record.in_instance);
    }

    #[tokio::test]
    async fn startup_load_failure_aborts_the_load() {
        let mut store = MockRespawnStore::new();
        store
            .expect_load_all()
            .returning(|| Err(RepoError::database("load_all", "no such table")));

        let service = service_with(store, MockHostPort::new(), enabled_settings());
        assert!(service.on_config_loaded(false).await.is_err());
    }
}
