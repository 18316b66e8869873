//! WatchTogether Core - shared library for the WatchTogether server.
//!
//! This crate implements a LAN-hosted co-watching room coordinator: clients
//! join a room over a WebSocket, one host selects media, and the Room
//! Coordinator keeps everyone's playback position in sync via a startup gate
//! and a buffering gate.
//!
//! # Architecture
//!
//! - [`runtime`]: Task spawning abstraction for async runtime independence
//! - [`events`]: Ambient/observability event system (room + discovery lifecycle)
//! - [`context`]: Network configuration and URL building
//! - [`state`]: Core application configuration
//! - [`services`]: Room Coordinator, Member Table, Gate Controller, Media
//!   Registry, Room Registry, and LAN Discovery
//! - [`error`]: Centralized error type
//! - [`api`]: HTTP + WebSocket transport
//!
//! # Abstraction Traits
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): Emitting ambient domain events
//! - [`IpDetector`](context::IpDetector): Local IP detection

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod context;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod state;
pub mod utils;

pub use context::{IpDetector, LocalIpDetector, NetworkContext, NetworkError, UrlBuilder};
pub use error::{WatchTogetherError, WatchTogetherResult};
pub use events::{BroadcastEvent, BroadcastEventBridge, DiscoveryEvent, EventEmitter, RoomEvent};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::Config;
pub use utils::now_millis;

pub use services::{DiscoveryService, RoomHandle, RoomRegistry, RoomSnapshot};

pub use bootstrap::{bootstrap_services, BootstrappedServices};

pub use api::{start_server, AppState, AppStateBuilder, ServerError, WsConnectionManager};
