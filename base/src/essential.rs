//! Hold'em essentials such as seats, pots, phases and actions.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::deck::Card;
use crate::errors::{self, Result};
use crate::evaluator::Category;

/// Money is integer minor units throughout the engine.
pub type Chips = u64;
pub type PlayerId = u64;
pub type GameId = u64;
pub type TableId = u64;

pub const MAX_ACTION_TIMEOUT_COUNT: u8 = 2;
pub const ACTION_TIMEOUT_PREFLOP: u64 = 12_000;
pub const ACTION_TIMEOUT_POSTFLOP: u64 = 15_000;
pub const ACTION_TIMEOUT_TURN: u64 = 20_000;
pub const ACTION_TIMEOUT_RIVER: u64 = 30_000;

pub const WAIT_TIMEOUT_DEFAULT: u64 = 5_000;
pub const WAIT_TIMEOUT_LAST_PLAYER: u64 = 5_000;
pub const WAIT_TIMEOUT_SHOWDOWN: u64 = 7_000;
pub const WAIT_TIMEOUT_RUNNER: u64 = 13_000;

/// Lifetime of a game session at one table.
#[derive(
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
    Default,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    #[default]
    Waiting,
    Playing,
    Finished,
}

/// Betting phases of a hand.  `WaitingForPlayers` is the resting phase
/// between hands (and before the first one).
#[derive(
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
    Default,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    WaitingForPlayers,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Phase {
    pub fn is_betting(&self) -> bool {
        matches!(
            self,
            Phase::Preflop | Phase::Flop | Phase::Turn | Phase::River
        )
    }
}

/// A seat's standing within the current hand.
#[derive(
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
    Default,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// In the hand, still owes action this round.
    #[default]
    Wait,
    /// Asked to act right now.
    Acting,
    /// Acted and matched the current bet level.
    Acted,
    Allin,
    Fold,
    /// Not part of the current hand (joined mid-hand, busted, cashed out,
    /// or simply between hands).
    SitOut,
}

/// A player's action at their turn.  `Bet` and `Raise` carry the target
/// amount; a raise amount is the total to-amount for the round, not the
/// increment.  `AllIn` resolves to a bet, call or raise of the whole stack.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet(Chips),
    Raise(Chips),
    AllIn,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Fold => "FOLD",
            Action::Check => "CHECK",
            Action::Call => "CALL",
            Action::Bet(_) => "BET",
            Action::Raise(_) => "RAISE",
            Action::AllIn => "ALL_IN",
        }
    }
}

/// Table configuration, fixed at creation.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub name: String,
    pub max_seats: u8,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "cash".into(),
            max_seats: 9,
            small_blind: 10,
            big_blind: 20,
            min_buy_in: 400,
            max_buy_in: 2000,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<()> {
        if !(2..=10).contains(&self.max_seats)
            || self.small_blind == 0
            || self.big_blind < self.small_blind
            || self.min_buy_in < self.big_blind * 10
            || self.max_buy_in < self.min_buy_in
        {
            return Err(errors::invalid_table_config());
        }
        Ok(())
    }
}

/// Representation of a specific player's seat for the duration of a game.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub player_id: PlayerId,
    pub seat_index: u8,
    pub stack: Chips,
    /// Total bought in across the game, for final accounting.
    pub starting_stack: Chips,
    pub hole_cards: Vec<Card>,
    pub status: SeatStatus,
    pub cashed_out: bool,
    pub ready_for_next_hand: bool,
    pub final_stack: Option<Chips>,
    /// Consecutive action timeouts; past the limit the seat is cashed out.
    pub timeout_count: u8,
    /// Last accepted buy-back, `(hand_number, amount)`, for idempotent retries.
    pub last_buy_back: Option<(u64, Chips)>,
}

impl Seat {
    pub fn new(player_id: PlayerId, seat_index: u8, buy_in: Chips) -> Self {
        Self {
            player_id,
            seat_index,
            stack: buy_in,
            starting_stack: buy_in,
            hole_cards: Vec::new(),
            status: SeatStatus::SitOut,
            cashed_out: false,
            ready_for_next_hand: false,
            final_stack: None,
            timeout_count: 0,
            last_buy_back: None,
        }
    }

    /// In the current hand and not folded.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SeatStatus::Wait | SeatStatus::Acting | SeatStatus::Acted | SeatStatus::Allin
        )
    }

    /// Dealt into the current hand, folded or not.
    pub fn in_hand(&self) -> bool {
        self.is_active() || self.status == SeatStatus::Fold
    }

    pub fn next_to_act(&self) -> bool {
        matches!(
            self.status,
            SeatStatus::Wait | SeatStatus::Acting | SeatStatus::Acted
        )
    }

    /// Move chips from the stack toward a bet.  Returns whether the seat
    /// went all-in and the amount actually taken.
    pub fn take_bet(&mut self, bet: Chips) -> (bool, Chips) {
        if bet < self.stack {
            self.stack -= bet;
            (false, bet)
        } else {
            let real_bet = self.stack;
            self.stack = 0;
            (true, real_bet)
        }
    }
}

/// The seat that should be acting at the moment.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct ActingSeat {
    pub player_id: PlayerId,
    pub seat_index: u8,
    /// False when only a short all-in happened since this seat last acted:
    /// the seat may call or fold but not raise.
    pub can_raise: bool,
    /// Action clock deadline, milliseconds since the epoch.
    pub deadline: u64,
}

/// One pot (main or side).  `owners` funded it, `winners` is filled at
/// settlement.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default,
)]
pub struct Pot {
    pub owners: Vec<PlayerId>,
    pub winners: Vec<PlayerId>,
    pub amount: Chips,
}

impl Pot {
    pub fn merge(&mut self, other: &Pot) {
        self.amount += other.amount;
    }
}

/// How the last hand was decided.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinReason {
    /// Everyone else folded; no cards were shown.
    AllFolded,
    Showdown,
}

/// Hole cards and the winning selection revealed at showdown.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShowdownHand {
    pub hole_cards: Vec<Card>,
    pub category: Category,
    pub picks: Vec<Card>,
}

/// One winning seat in the last hand.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub player_id: PlayerId,
    pub seat_index: u8,
    pub amount: Chips,
    /// Present only for seats that showed down.
    pub hand: Option<ShowdownHand>,
}

/// A pot awarded at settlement, for display.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PotAward {
    pub winners: Vec<PlayerId>,
    pub amount: Chips,
}

/// Snapshot of the last hand's result, broadcast on completion.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WinnerInfo {
    pub reason: WinReason,
    pub pot_total: Chips,
    pub winners: Vec<Winner>,
    pub pots: Vec<PotAward>,
    /// Per-seat money change over the hand (prizes minus contributions).
    pub chips_change: BTreeMap<PlayerId, i64>,
}

/// Per-seat line of the final game summary.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SeatSummary {
    pub player_id: PlayerId,
    pub seat_index: u8,
    pub starting_stack: Chips,
    pub final_stack: Chips,
    pub win_loss: i64,
}

/// Final accounting, computed once when every seat has cashed out.
/// Ordered by `win_loss` descending; the win/loss column sums to zero.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default,
)]
pub struct GameSummary {
    pub results: Vec<SeatSummary>,
}

/// Append-only log row for every accepted action.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub seq: u64,
    pub hand_number: u64,
    pub player_id: PlayerId,
    pub seat_index: u8,
    pub action: Action,
    /// Chips actually moved by the action (zero for fold/check).
    pub amount: Chips,
    pub phase: Phase,
    pub timestamp_ms: u64,
}

/// Per-seat standing within a settlement, for display.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SeatResult {
    pub player_id: PlayerId,
    pub seat_index: u8,
    pub stack: Chips,
    pub prize: Option<Chips>,
    pub status: SeatStatus,
}

/// Display cues accompanying a snapshot, consumed by front-end animations.
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Display {
    DealCards,
    DealBoard {
        prev: usize,
        board: Vec<Card>,
    },
    CollectBets {
        bet_map: BTreeMap<PlayerId, Chips>,
    },
    AwardPots {
        pots: Vec<PotAward>,
    },
    GameResult {
        seat_map: BTreeMap<PlayerId, SeatResult>,
    },
}
