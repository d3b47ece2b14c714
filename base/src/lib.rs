//! Multi-table No-Limit Hold'em cash game engine.
//!
//! This crate is the pure, synchronous core: cards, hand evaluation, the
//! per-table state machine with side pots, and per-hand records.  It does
//! no I/O; the `holdem-server` crate wraps it in a per-table actor with
//! persistence and broadcasting.

pub mod deck;
pub mod errors;
pub mod essential;
pub mod evaluator;
pub mod game;
pub mod hand_history;
