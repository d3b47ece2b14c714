//! Fan-out of state snapshots to per-game subscribers.
//!
//! Each subscriber owns an unbounded ordered channel; messages for one
//! subscriber are delivered in state-transition order.  A subscriber whose
//! channel is gone is dropped without disturbing the others.  Broadcasting
//! is a read-side projection: it never mutates game state.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use holdem_base::essential::{GameSummary, PlayerId};
use holdem_base::game::Game;

use crate::snapshot::{project, GameSnapshot};

/// Subscription refusal codes, mirrored onto the wire close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseCode {
    Normal,
    AuthFailed,
    Forbidden,
    NotFound,
}

impl CloseCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::AuthFailed => 4001,
            CloseCode::Forbidden => 4003,
            CloseCode::NotFound => 4004,
        }
    }
}

/// Message envelope sent over a subscription channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Envelope {
    GameUpdate(GameSnapshot),
    GameSummaryNotification(GameSummary),
    /// Terminal engine failure; the last committed snapshot stays valid.
    GameError { kind: String, message: String },
}

struct Subscriber {
    player_id: PlayerId,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Per-table subscriber registry, owned by the table's actor.
#[derive(Default)]
pub struct Broadcaster {
    subs: Vec<Subscriber>,
}

impl Broadcaster {
    /// Register a subscriber and hand it the current snapshot as its first
    /// message (late joiners and reconnects resync this way).
    pub fn subscribe(
        &mut self,
        player_id: PlayerId,
        tx: mpsc::UnboundedSender<Envelope>,
        game: &Game,
    ) {
        let snapshot = project(game, Some(player_id));
        if tx.send(Envelope::GameUpdate(snapshot)).is_ok() {
            self.subs.push(Subscriber { player_id, tx });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }

    /// Project and deliver the state to every subscriber, each through its
    /// own privacy filter.  Dead subscribers fall off the list.
    pub fn broadcast_update(&mut self, game: &Game) {
        self.subs.retain(|sub| {
            let snapshot = project(game, Some(sub.player_id));
            sub.tx.send(Envelope::GameUpdate(snapshot)).is_ok()
        });
        debug!(game_id = game.game_id, subs = self.subs.len(), "state broadcast");
    }

    pub fn broadcast_summary(&mut self, summary: &GameSummary) {
        self.subs.retain(|sub| {
            sub.tx
                .send(Envelope::GameSummaryNotification(summary.clone()))
                .is_ok()
        });
    }

    pub fn broadcast_error(&mut self, kind: &str, message: &str) {
        self.subs.retain(|sub| {
            sub.tx
                .send(Envelope::GameError {
                    kind: kind.to_string(),
                    message: message.to_string(),
                })
                .is_ok()
        });
    }
}
