//! The per-table actor: the single writer of one game's state.
//!
//! All mutations for a game go through this task, one command at a time.
//! A mutating command is applied to the engine, persisted, then broadcast;
//! if it fails, the pre-command state is restored so no partial mutation
//! is ever observable.  Action clocks and the between-hands wait run off
//! the same loop, so timer firings serialize with commands.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info};

use holdem_base::errors::{self, EngineError, Result};
use holdem_base::essential::{PlayerId, Seat};
use holdem_base::game::Game;

use crate::broadcast::{Broadcaster, CloseCode, Envelope};
use crate::ingress::{Command, TableHandle};
use crate::snapshot::project;
use crate::store::Store;

/// Commands queued per table before `TABLE_BUSY` pushes back.
const MAILBOX_SIZE: usize = 64;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct TableActor<S: Store> {
    game: Game,
    rx: mpsc::Receiver<Command>,
    store: Arc<S>,
    broadcaster: Broadcaster,
    persisted_actions: usize,
    persisted_hands: usize,
    summary_sent: bool,
    /// Set on an invariant violation; the table refuses further mutation
    /// until an operator intervenes.
    fatal: Option<EngineError>,
}

impl<S: Store> TableActor<S> {
    /// Spawn the actor for a game and return its handle.
    pub fn spawn(game: Game, store: Arc<S>) -> TableHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        let handle = TableHandle::new(game.game_id, tx);
        let actor = TableActor {
            game,
            rx,
            store,
            broadcaster: Broadcaster::default(),
            persisted_actions: 0,
            persisted_hands: 0,
            summary_sent: false,
            fatal: None,
        };
        tokio::spawn(actor.run());
        handle
    }

    async fn run(mut self) {
        info!(game_id = self.game.game_id, "table actor up");
        self.persist();
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        // Every handle dropped and the queue drained
                        None => break,
                    }
                }
                _ = sleep(until(deadline)), if deadline.is_some() => {
                    self.handle_timer();
                }
            }
        }
        self.persist();
        info!(game_id = self.game.game_id, "table actor down");
    }

    /// The nearest timer the game is waiting on, if any.
    fn next_deadline(&self) -> Option<u64> {
        if self.fatal.is_some() {
            return None;
        }
        if let Some(acting) = &self.game.acting_seat {
            return Some(acting.deadline);
        }
        if self.game.next_hand_start > 0 {
            return Some(self.game.next_hand_start);
        }
        None
    }

    fn handle_timer(&mut self) {
        let now = now_ms();
        if let Some(acting) = self.game.acting_seat {
            if now >= acting.deadline {
                let player_id = acting.player_id;
                let _ = self.apply(|game| game.on_action_timeout(player_id, now));
            }
        } else if self.game.next_hand_start > 0 && now >= self.game.next_hand_start {
            let _ = self.apply(|game| game.on_ready_timeout(now));
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Join {
                player_id,
                buy_in,
                resp,
            } => {
                let result = self.apply(|game| game.add_player(player_id, buy_in));
                let _ = resp.send(result);
            }
            Command::Start { player_id, resp } => {
                let now = now_ms();
                let result = self.apply(|game| {
                    // Starting is open to any seated player
                    game.seat_map
                        .get(&player_id)
                        .ok_or_else(errors::seat_not_found)?;
                    game.start_game(now)
                });
                let _ = resp.send(result);
            }
            Command::Act {
                player_id,
                action,
                resp,
            } => {
                let now = now_ms();
                let result = self.apply(|game| game.handle_action(player_id, action, now));
                let _ = resp.send(result);
            }
            Command::Ready { player_id, resp } => {
                let now = now_ms();
                let result = self.apply(|game| game.ready_for_next_hand(player_id, now));
                let _ = resp.send(result);
            }
            Command::CashOut { player_id, resp } => {
                let now = now_ms();
                let result = self.apply(|game| game.cash_out(player_id, now));
                let _ = resp.send(result);
            }
            Command::BuyBackIn {
                player_id,
                amount,
                resp,
            } => {
                let result = self.apply(|game| game.buy_back_in(player_id, amount));
                let _ = resp.send(result);
            }
            Command::Leave { player_id, resp } => {
                let result = self.apply(|game| game.leave(player_id));
                let _ = resp.send(result);
            }
            Command::Subscribe { identity, tx, resp } => {
                let result = self.subscribe(identity, tx);
                let _ = resp.send(result);
            }
            Command::Snapshot { viewer, resp } => {
                let _ = resp.send(project(&self.game, viewer));
            }
            Command::HandHistories { resp } => {
                let mut hands = self.game.completed_hands.clone();
                hands.reverse();
                let _ = resp.send(hands);
            }
        }
    }

    fn subscribe(
        &mut self,
        identity: Option<PlayerId>,
        tx: mpsc::UnboundedSender<Envelope>,
    ) -> std::result::Result<(), CloseCode> {
        let Some(player_id) = identity else {
            return Err(CloseCode::AuthFailed);
        };
        if !self.game.seat_map.contains_key(&player_id) {
            return Err(CloseCode::Forbidden);
        }
        self.broadcaster.subscribe(player_id, tx, &self.game);
        Ok(())
    }

    /// Apply one mutation atomically: on success persist then broadcast, on
    /// failure restore the pre-command state.  Invariant violations freeze
    /// the table and raise a terminal error to subscribers.
    fn apply<T>(&mut self, mutate: impl FnOnce(&mut Game) -> Result<T>) -> Result<T> {
        if let Some(fatal) = &self.fatal {
            return Err(fatal.clone());
        }
        let backup = self.game.clone();
        match mutate(&mut self.game) {
            Ok(value) => {
                self.persist();
                self.broadcast();
                Ok(value)
            }
            Err(err) if err.kind.is_fatal() => {
                error!(game_id = self.game.game_id, %err, "engine invariant violated");
                self.game = backup;
                self.broadcaster
                    .broadcast_error(err.kind.as_str(), &err.message);
                self.fatal = Some(err.clone());
                Err(err)
            }
            Err(err) => {
                self.game = backup;
                Err(err)
            }
        }
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save_game(&self.game) {
            error!(game_id = self.game.game_id, %err, "failed to persist game row");
            return;
        }
        let seats: Vec<Seat> = self.game.seat_map.values().cloned().collect();
        if let Err(err) = self.store.save_seats(self.game.game_id, &seats) {
            error!(game_id = self.game.game_id, %err, "failed to persist seat rows");
        }
        let new_actions = &self.game.action_log[self.persisted_actions..];
        if !new_actions.is_empty() {
            match self.store.append_actions(self.game.game_id, new_actions) {
                Ok(()) => self.persisted_actions = self.game.action_log.len(),
                Err(err) => error!(game_id = self.game.game_id, %err, "failed to append actions"),
            }
        }
        for hand in &self.game.completed_hands[self.persisted_hands..] {
            if let Err(err) = self.store.save_hand_history(self.game.game_id, hand) {
                error!(game_id = self.game.game_id, %err, "failed to save hand history");
            }
        }
        self.persisted_hands = self.game.completed_hands.len();
    }

    fn broadcast(&mut self) {
        self.broadcaster.broadcast_update(&self.game);
        if let Some(summary) = &self.game.summary {
            if !self.summary_sent {
                self.summary_sent = true;
                self.broadcaster.broadcast_summary(summary);
                info!(game_id = self.game.game_id, "summary notification sent");
            }
        }
    }
}

fn until(deadline: Option<u64>) -> Duration {
    match deadline {
        Some(deadline) => Duration::from_millis(deadline.saturating_sub(now_ms())),
        None => Duration::from_secs(3600),
    }
}
