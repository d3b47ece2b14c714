//! Coordinator, broadcaster and session lifecycle around `holdem-base`.
//!
//! One tokio task per table serializes every mutation of that table's
//! game (single-writer).  Subscribers receive per-viewer snapshots in
//! state-transition order.  Transport (HTTP routing, WebSocket framing,
//! authentication) stays outside this crate; `api` defines the shapes a
//! router binds to.

pub mod actor;
pub mod api;
pub mod broadcast;
pub mod ingress;
pub mod lobby;
pub mod snapshot;
pub mod store;
