//! Brawl rooms: registry, per-room state machine, relay and the WebSocket
//! join endpoint.

pub mod events;
pub mod member;
pub mod registry;
pub mod relay;
pub mod room;
pub mod server;
