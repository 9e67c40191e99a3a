//! # Palaver
//!
//! A single-process realtime chat server: direct messaging, group messaging,
//! presence, blocking, and media attachments, served by a REST API backed by
//! SQLite and a WebSocket channel for push delivery.
//!
//! ## Core pieces
//!
//! - **Connection Registry** (`ws::registry`): maps authenticated users to
//!   their live connection; the source of truth for "who is online".
//! - **Room Router** (`ws::rooms`): maps a group id to the connections
//!   currently viewing that group's conversation.
//! - **Realtime Service** (`ws::service`): delivery dispatch, presence
//!   broadcast, and block-state notification on top of the two maps above.
//! - **REST boundary** (`api`): persists state changes, then triggers the
//!   realtime fan-out. Fan-out is best-effort and invisible to the requester.
//!
//! All connection state lives in process memory and is rebuilt as clients
//! reconnect after a restart.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod ws;
