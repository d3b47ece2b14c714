//! Table registry and bankroll ledger.
//!
//! The lobby spawns one actor per table and routes players to handles by
//! game id.  Bankrolls cover only the table lifecycle: a buy-in debits the
//! bankroll, leaving credits the recorded final stack back.  External
//! deposits and withdrawals live outside this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::info;

use holdem_base::errors::{self, Result};
use holdem_base::essential::{Chips, GameId, GameStatus, PlayerId, TableConfig, TableId};
use holdem_base::game::Game;

use crate::actor::TableActor;
use crate::broadcast::{CloseCode, Envelope};
use crate::ingress::TableHandle;
use crate::store::Store;

struct TableEntry {
    config: TableConfig,
    handle: TableHandle,
}

pub struct Lobby<S: Store> {
    store: Arc<S>,
    tables: Mutex<HashMap<TableId, TableEntry>>,
    bank: Mutex<HashMap<PlayerId, Chips>>,
    next_id: AtomicU64,
}

impl<S: Store> Lobby<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            tables: Mutex::new(HashMap::new()),
            bank: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // ----------------------------------------------------------------
    // Bankrolls
    // ----------------------------------------------------------------

    pub fn deposit(&self, player_id: PlayerId, amount: Chips) {
        let mut bank = self.bank.lock().expect("bank lock");
        *bank.entry(player_id).or_insert(0) += amount;
    }

    pub fn balance(&self, player_id: PlayerId) -> Chips {
        let bank = self.bank.lock().expect("bank lock");
        bank.get(&player_id).copied().unwrap_or(0)
    }

    fn debit(&self, player_id: PlayerId, amount: Chips) -> Result<()> {
        let mut bank = self.bank.lock().expect("bank lock");
        let balance = bank.entry(player_id).or_insert(0);
        if *balance < amount {
            return Err(errors::insufficient_stack());
        }
        *balance -= amount;
        Ok(())
    }

    // ----------------------------------------------------------------
    // Tables
    // ----------------------------------------------------------------

    /// Create a table with its game session and spawn the table actor.
    /// The table id doubles as the game id.
    pub fn create_table(&self, config: TableConfig) -> Result<TableId> {
        config.validate()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let game = Game::new(id, config.clone())?;
        let handle = TableActor::spawn(game, Arc::clone(&self.store));
        info!(table_id = id, name = %config.name, "table created");
        let mut tables = self.tables.lock().expect("tables lock");
        tables.insert(id, TableEntry { config, handle });
        Ok(id)
    }

    pub fn table_config(&self, table_id: TableId) -> Result<TableConfig> {
        let tables = self.tables.lock().expect("tables lock");
        tables
            .get(&table_id)
            .map(|entry| entry.config.clone())
            .ok_or_else(errors::game_not_found)
    }

    /// The handle of a table's game, for command routing.
    pub fn handle(&self, game_id: GameId) -> Result<TableHandle> {
        let tables = self.tables.lock().expect("tables lock");
        tables
            .get(&game_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(errors::game_not_found)
    }

    /// Seat a player: debit the bankroll, then take the seat.  The debit is
    /// rolled back when the table refuses.
    pub async fn join_table(
        &self,
        table_id: TableId,
        player_id: PlayerId,
        buy_in: Chips,
    ) -> Result<GameId> {
        let handle = self.handle(table_id)?;
        self.debit(player_id, buy_in)?;
        match handle.join(player_id, buy_in).await {
            Ok(_seat_index) => Ok(handle.game_id()),
            Err(err) => {
                self.deposit(player_id, buy_in);
                Err(err)
            }
        }
    }

    /// Leave after cashing out; the final stack returns to the bankroll.
    pub async fn leave_table(&self, game_id: GameId, player_id: PlayerId) -> Result<Chips> {
        let handle = self.handle(game_id)?;
        let released = handle.leave(player_id).await?;
        self.deposit(player_id, released);
        Ok(released)
    }

    pub async fn subscribe(
        &self,
        game_id: GameId,
        identity: Option<PlayerId>,
        tx: mpsc::UnboundedSender<Envelope>,
    ) -> std::result::Result<(), CloseCode> {
        let handle = match self.handle(game_id) {
            Ok(handle) => handle,
            Err(_) => return Err(CloseCode::NotFound),
        };
        handle.subscribe(identity, tx).await
    }

    /// Drop a table that has no game running and no seats taken.  Closing
    /// the last handle drains and stops the actor.
    pub async fn remove_table(&self, table_id: TableId) -> Result<bool> {
        let handle = self.handle(table_id)?;
        let snapshot = handle.snapshot(None).await?;
        let removable = snapshot.status != GameStatus::Playing && snapshot.seats.is_empty();
        if removable {
            let mut tables = self.tables.lock().expect("tables lock");
            tables.remove(&table_id);
            info!(table_id, "table removed");
        }
        Ok(removable)
    }
}
