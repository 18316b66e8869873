//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. This pattern provides:
//!
//! - **Clarity**: All dependency relationships are visible in one place
//! - **Testability**: Easy to swap implementations for testing
//! - **Maintainability**: Service creation logic is isolated from usage

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::context::{LocalIpDetector, NetworkContext};
use crate::error::{WatchTogetherError, WatchTogetherResult};
use crate::events::{BroadcastEvent, BroadcastEventBridge};
use crate::protocol_constants::{
    DISCOVERY_REFRESH_INTERVAL_MS, EVENT_CHANNEL_CAPACITY, IDLE_CLEANUP_INTERVAL_MS,
};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::{DiscoveryService, RoomRegistry};
use crate::state::Config;
use tokio::sync::broadcast;

/// Container for all bootstrapped services.
///
/// Holds all the wired services created during bootstrap. Consumed by
/// `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Owns every live room and handles idle eviction.
    pub room_registry: Arc<RoomRegistry>,
    /// LAN announce/listen/probe discovery service.
    pub discovery_service: Arc<DiscoveryService>,
    /// Broadcast channel sender for ambient/observability events.
    pub broadcast_tx: broadcast::Sender<BroadcastEvent>,
    /// Event bridge emitting ambient events to subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Network configuration (port, local IP).
    pub network: NetworkContext,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.cancel_token.cancel();
        let closed = self.ws_manager.close_all();
        log::info!("[Bootstrap] Closed {} WebSocket connection(s)", closed);
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// This is the composition root where all services are instantiated and
/// wired together. The wiring order matters - services are created in
/// dependency order:
///
/// 1. Shared infrastructure (broadcast channel, cancellation token)
/// 2. Network context (port, local IP)
/// 3. Event bridge (depends on broadcast channel)
/// 4. Room registry (depends on event bridge)
/// 5. Discovery service (depends on the room registry's instance identity)
/// 6. Background tasks (idle sweep, discovery announce/listen)
///
/// # Errors
///
/// Returns an error if local IP auto-detection fails.
pub fn bootstrap_services(config: &Config) -> WatchTogetherResult<BootstrappedServices> {
    let spawner = TokioSpawner::current();

    let (broadcast_tx, _) = broadcast::channel::<BroadcastEvent>(EVENT_CHANNEL_CAPACITY);
    let event_bridge = Arc::new(BroadcastEventBridge::new(EVENT_CHANNEL_CAPACITY));

    let cancel_token = CancellationToken::new();

    let ip_detector = LocalIpDetector::arc();
    let network = NetworkContext::auto_detect(config.preferred_port, ip_detector)
        .map_err(|e| WatchTogetherError::Internal(format!("Failed to detect local IP: {}", e)))?;

    let ws_manager = Arc::new(WsConnectionManager::new());

    let discovery_service = Arc::new(DiscoveryService::new(Some(config.discovery_port)));

    let room_registry = Arc::new(RoomRegistry::new(
        config.default_max_members,
        config.room_idle_ttl_minutes,
        Arc::clone(&event_bridge) as Arc<dyn crate::events::EventEmitter>,
        Arc::clone(&discovery_service),
        network.clone(),
    ));

    {
        let registry = Arc::clone(&room_registry);
        spawner.spawn(async move {
            registry.run_idle_sweeper(IDLE_CLEANUP_INTERVAL_MS).await;
        });
    }
    {
        let registry = Arc::clone(&room_registry);
        spawner.spawn(async move {
            registry.run_discovery_refresher(DISCOVERY_REFRESH_INTERVAL_MS).await;
        });
    }
    discovery_service.spawn_background_tasks();

    Ok(BootstrappedServices {
        room_registry,
        discovery_service,
        broadcast_tx,
        event_bridge,
        network,
        ws_manager,
        spawner,
        cancel_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_wires_room_registry_and_discovery() {
        let config = Config::default();
        let services = bootstrap_services(&config).expect("bootstrap should succeed");
        assert_eq!(services.room_registry.room_count(), 0);
        assert!(!services.discovery_service.instance_id().is_empty());
    }
}
