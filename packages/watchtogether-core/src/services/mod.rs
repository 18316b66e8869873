//! Application services layer: the domain logic that sits between the API
//! layer and the room actors it drives.

pub mod discovery;
pub mod gate;
pub mod media_registry;
pub mod member_table;
pub mod playback;
pub mod room;
pub mod room_registry;

pub use discovery::DiscoveryService;
pub use room::{RoomHandle, RoomSnapshot};
pub use room_registry::RoomRegistry;
