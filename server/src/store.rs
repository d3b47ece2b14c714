//! Persistence contract of the coordinator and an in-memory store.
//!
//! Rows are borsh-encoded engine types.  The indexes follow the persisted
//! layout contract: the game row by id, seat rows unique by
//! (game, seat_index) with a (game, player) index, the action log
//! append-only by (game, sequence), hand histories unique by
//! (game, hand_number).  Any transactional backend can stand in; the
//! in-memory store backs tests and single-process deployments.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use borsh::BorshDeserialize;

use holdem_base::errors::{EngineError, ErrorKind, Result};
use holdem_base::essential::{ActionRecord, GameId, PlayerId, Seat};
use holdem_base::game::Game;
use holdem_base::hand_history::HandHistory;

pub trait Store: Send + Sync + 'static {
    /// Upsert the authoritative game row.
    fn save_game(&self, game: &Game) -> Result<()>;
    fn load_game(&self, game_id: GameId) -> Result<Option<Game>>;
    /// Replace the game's seat rows; (game, seat_index) stays unique and a
    /// seat missing from `seats` (released by a leave) is deleted.
    fn save_seats(&self, game_id: GameId, seats: &[Seat]) -> Result<()>;
    /// One seat row by its unique (game, seat_index) key.
    fn load_seat(&self, game_id: GameId, seat_index: u8) -> Result<Option<Seat>>;
    /// One seat row through the (game, player) index.
    fn load_seat_by_player(&self, game_id: GameId, player_id: PlayerId) -> Result<Option<Seat>>;
    /// All seat rows of a game, ordered by seat index.
    fn seats(&self, game_id: GameId) -> Result<Vec<Seat>>;
    /// Append accepted actions; sequences must arrive in order.
    fn append_actions(&self, game_id: GameId, records: &[ActionRecord]) -> Result<()>;
    fn actions(&self, game_id: GameId) -> Result<Vec<ActionRecord>>;
    /// Write one completed hand; (game, hand_number) is unique.
    fn save_hand_history(&self, game_id: GameId, hand: &HandHistory) -> Result<()>;
    /// Completed hands, newest first.
    fn hand_histories(&self, game_id: GameId) -> Result<Vec<HandHistory>>;
}

fn corrupt(detail: &str) -> EngineError {
    EngineError::new(ErrorKind::Internal, format!("store corruption: {detail}"))
}

#[derive(Default)]
struct MemInner {
    games: HashMap<GameId, Vec<u8>>,
    /// Seat rows keyed by seat index, per game.
    seats: HashMap<GameId, BTreeMap<u8, Seat>>,
    /// The (game, player) -> seat_index index over the rows above.
    seat_index_by_player: HashMap<GameId, HashMap<PlayerId, u8>>,
    actions: HashMap<GameId, Vec<ActionRecord>>,
    hands: HashMap<GameId, Vec<HandHistory>>,
}

/// The in-memory store.  Every method takes the one lock, so each call is
/// its own transaction.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn save_game(&self, game: &Game) -> Result<()> {
        let bytes = borsh::to_vec(game).map_err(|e| corrupt(&e.to_string()))?;
        let mut inner = self.inner.lock().expect("store lock");
        inner.games.insert(game.game_id, bytes);
        Ok(())
    }

    fn load_game(&self, game_id: GameId) -> Result<Option<Game>> {
        let inner = self.inner.lock().expect("store lock");
        match inner.games.get(&game_id) {
            Some(bytes) => {
                let game = Game::try_from_slice(bytes).map_err(|e| corrupt(&e.to_string()))?;
                Ok(Some(game))
            }
            None => Ok(None),
        }
    }

    fn save_seats(&self, game_id: GameId, seats: &[Seat]) -> Result<()> {
        let mut rows = BTreeMap::new();
        let mut by_player = HashMap::with_capacity(seats.len());
        for seat in seats {
            if rows.insert(seat.seat_index, seat.clone()).is_some() {
                return Err(corrupt("duplicate seat index"));
            }
            if by_player.insert(seat.player_id, seat.seat_index).is_some() {
                return Err(corrupt("player holds two seats"));
            }
        }
        let mut inner = self.inner.lock().expect("store lock");
        inner.seats.insert(game_id, rows);
        inner.seat_index_by_player.insert(game_id, by_player);
        Ok(())
    }

    fn load_seat(&self, game_id: GameId, seat_index: u8) -> Result<Option<Seat>> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .seats
            .get(&game_id)
            .and_then(|rows| rows.get(&seat_index))
            .cloned())
    }

    fn load_seat_by_player(&self, game_id: GameId, player_id: PlayerId) -> Result<Option<Seat>> {
        let inner = self.inner.lock().expect("store lock");
        let Some(seat_index) = inner
            .seat_index_by_player
            .get(&game_id)
            .and_then(|index| index.get(&player_id))
        else {
            return Ok(None);
        };
        inner
            .seats
            .get(&game_id)
            .and_then(|rows| rows.get(seat_index))
            .cloned()
            .map(Some)
            .ok_or_else(|| corrupt("seat index points at no row"))
    }

    fn seats(&self, game_id: GameId) -> Result<Vec<Seat>> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .seats
            .get(&game_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn append_actions(&self, game_id: GameId, records: &[ActionRecord]) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock");
        let log = inner.actions.entry(game_id).or_default();
        for record in records {
            if record.seq != log.len() as u64 + 1 {
                return Err(corrupt("action sequence gap"));
            }
            log.push(record.clone());
        }
        Ok(())
    }

    fn actions(&self, game_id: GameId) -> Result<Vec<ActionRecord>> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.actions.get(&game_id).cloned().unwrap_or_default())
    }

    fn save_hand_history(&self, game_id: GameId, hand: &HandHistory) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock");
        let hands = inner.hands.entry(game_id).or_default();
        if hands.iter().any(|h| h.hand_number == hand.hand_number) {
            return Err(corrupt("duplicate hand history"));
        }
        hands.push(hand.clone());
        Ok(())
    }

    fn hand_histories(&self, game_id: GameId) -> Result<Vec<HandHistory>> {
        let inner = self.inner.lock().expect("store lock");
        let mut hands = inner.hands.get(&game_id).cloned().unwrap_or_default();
        hands.sort_by(|a, b| b.hand_number.cmp(&a.hand_number));
        Ok(hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_base::essential::TableConfig;

    #[test]
    fn game_rows_roundtrip() {
        let store = MemStore::new();
        let mut game = Game::new(7, TableConfig::default()).unwrap();
        game.add_player(1, 500).unwrap();
        store.save_game(&game).unwrap();

        let loaded = store.load_game(7).unwrap().unwrap();
        assert_eq!(loaded, game);
        assert!(store.load_game(8).unwrap().is_none());
    }

    #[test]
    fn seat_rows_are_addressable_by_index_and_player() {
        let store = MemStore::new();
        let mut game = Game::new(3, TableConfig::default()).unwrap();
        game.add_player(11, 500).unwrap();
        game.add_player(12, 500).unwrap();
        let seats: Vec<Seat> = game.seat_map.values().cloned().collect();
        store.save_seats(3, &seats).unwrap();

        let row = store.load_seat(3, 1).unwrap().unwrap();
        assert_eq!(row.player_id, 12);
        let row = store.load_seat_by_player(3, 11).unwrap().unwrap();
        assert_eq!(row.seat_index, 0);
        assert!(store.load_seat(3, 5).unwrap().is_none());
        assert!(store.load_seat_by_player(3, 99).unwrap().is_none());
        assert_eq!(store.seats(3).unwrap().len(), 2);

        // A released seat drops out of the rows on the next save
        game.seat_map.remove(&11);
        let seats: Vec<Seat> = game.seat_map.values().cloned().collect();
        store.save_seats(3, &seats).unwrap();
        assert!(store.load_seat_by_player(3, 11).unwrap().is_none());
        assert_eq!(store.seats(3).unwrap().len(), 1);
    }

    #[test]
    fn action_log_rejects_sequence_gaps() {
        let store = MemStore::new();
        let record = ActionRecord {
            seq: 2,
            hand_number: 1,
            player_id: 1,
            seat_index: 0,
            action: holdem_base::essential::Action::Check,
            amount: 0,
            phase: holdem_base::essential::Phase::Preflop,
            timestamp_ms: 0,
        };
        let err = store.append_actions(9, &[record]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }
}
