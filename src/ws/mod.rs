//! The realtime layer: connection registry, room routing, delivery dispatch,
//! and the per-connection WebSocket session.

pub mod events;
pub mod registry;
pub mod rooms;
pub mod service;
pub mod session;
pub mod types;

pub use registry::ConnectionRegistry;
pub use rooms::RoomRouter;
pub use service::RealtimeService;
pub use types::{ConnectionHandle, ConnectionId, OutboundSender};
