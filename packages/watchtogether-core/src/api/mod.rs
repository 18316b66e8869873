//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::context::NetworkContext;
use crate::events::BroadcastEventBridge;
use crate::services::{DiscoveryService, RoomRegistry};
use crate::state::Config;

pub mod http;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Owns every live room.
    pub room_registry: Arc<RoomRegistry>,
    /// LAN discovery service (announce/listen/probe).
    pub discovery_service: Arc<DiscoveryService>,
    /// Event bridge for ambient room/discovery events.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Network configuration (port, local IP).
    pub network: NetworkContext,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Application configuration.
    pub config: Arc<RwLock<Config>>,
    /// Whether network services have been started.
    services_started: Arc<AtomicBool>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    room_registry: Option<Arc<RoomRegistry>>,
    discovery_service: Option<Arc<DiscoveryService>>,
    event_bridge: Option<Arc<BroadcastEventBridge>>,
    network: Option<NetworkContext>,
    ws_manager: Option<Arc<WsConnectionManager>>,
    config: Option<Arc<RwLock<Config>>>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates all shared service fields from a `BootstrappedServices` container.
    pub fn from_services(mut self, services: &crate::BootstrappedServices) -> Self {
        self.room_registry = Some(Arc::clone(&services.room_registry));
        self.discovery_service = Some(Arc::clone(&services.discovery_service));
        self.event_bridge = Some(Arc::clone(&services.event_bridge));
        self.network = Some(services.network.clone());
        self.ws_manager = Some(Arc::clone(&services.ws_manager));
        self
    }

    /// Sets the room registry.
    pub fn room_registry(mut self, registry: Arc<RoomRegistry>) -> Self {
        self.room_registry = Some(registry);
        self
    }

    /// Sets the discovery service.
    pub fn discovery_service(mut self, service: Arc<DiscoveryService>) -> Self {
        self.discovery_service = Some(service);
        self
    }

    /// Sets the event bridge.
    pub fn event_bridge(mut self, bridge: Arc<BroadcastEventBridge>) -> Self {
        self.event_bridge = Some(bridge);
        self
    }

    /// Sets the network context.
    pub fn network(mut self, network: NetworkContext) -> Self {
        self.network = Some(network);
        self
    }

    /// Sets the WebSocket connection manager.
    pub fn ws_manager(mut self, manager: Arc<WsConnectionManager>) -> Self {
        self.ws_manager = Some(manager);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: Arc<RwLock<Config>>) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the `AppState`, panicking if required fields are missing.
    pub fn build(self) -> AppState {
        AppState {
            room_registry: self.room_registry.expect("room_registry is required"),
            discovery_service: self
                .discovery_service
                .expect("discovery_service is required"),
            event_bridge: self.event_bridge.expect("event_bridge is required"),
            network: self.network.expect("network is required"),
            ws_manager: self.ws_manager.expect("ws_manager is required"),
            config: self.config.expect("config is required"),
            services_started: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Marks services as started.
    ///
    /// Returns `true` if this was the first call to mark started,
    /// `false` if already started.
    pub fn mark_services_started(&self) -> bool {
        self.services_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns whether services have been started.
    pub fn services_started(&self) -> bool {
        self.services_started.load(Ordering::SeqCst)
    }
}

async fn find_available_port(
    start: u16,
    end: u16,
) -> Result<(u16, tokio::net::TcpListener), ServerError> {
    for port in start..=end {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Starts the HTTP server on the configured or auto-discovered port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let (port, listener) = if preferred_port > 0 {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], preferred_port));
        (preferred_port, tokio::net::TcpListener::bind(&addr).await?)
    } else {
        find_available_port(4000, 4010).await?
    };

    state.network.set_port(port);

    log::info!("Server listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}
