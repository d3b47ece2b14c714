//! Error kinds and constructors used across the engine.
//!
//! Every rejection carries a stable [`ErrorKind`] identifier plus a human
//! message.  Kinds tagged [`ErrorKind::Internal`] indicate an engine bug
//! (invariant violation); they abort the current hand and are surfaced to
//! operators rather than clients.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, client-visible error identifiers.
#[derive(
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotYourTurn,
    InvalidAction,
    InsufficientStack,
    BetBelowMin,
    RaiseBelowMin,
    CheckWhenFacingBet,
    CashOutDuringHand,
    AlreadyCashedOut,
    NotCashedOut,
    BuyInOutOfRange,
    GameNotWaiting,
    TableFull,
    TableBusy,
    GameNotFound,
    DeckExhausted,
    BadCard,
    /// Invariant violation inside the engine.  Never caused by client input.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotYourTurn => "NOT_YOUR_TURN",
            ErrorKind::InvalidAction => "INVALID_ACTION",
            ErrorKind::InsufficientStack => "INSUFFICIENT_STACK",
            ErrorKind::BetBelowMin => "BET_BELOW_MIN",
            ErrorKind::RaiseBelowMin => "RAISE_BELOW_MIN",
            ErrorKind::CheckWhenFacingBet => "CHECK_WHEN_FACING_BET",
            ErrorKind::CashOutDuringHand => "CASH_OUT_DURING_HAND",
            ErrorKind::AlreadyCashedOut => "ALREADY_CASHED_OUT",
            ErrorKind::NotCashedOut => "NOT_CASHED_OUT",
            ErrorKind::BuyInOutOfRange => "BUY_IN_OUT_OF_RANGE",
            ErrorKind::GameNotWaiting => "GAME_NOT_WAITING",
            ErrorKind::TableFull => "TABLE_FULL",
            ErrorKind::TableBusy => "TABLE_BUSY",
            ErrorKind::GameNotFound => "GAME_NOT_FOUND",
            ErrorKind::DeckExhausted => "DECK_EXHAUSTED",
            ErrorKind::BadCard => "BAD_CARD",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// True when the failure indicates an engine bug rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Internal)
    }
}

#[derive(
    Error,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
)]
#[error("{}: {message}", kind.as_str())]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

macro_rules! engine_err {
    ($fn:ident, $kind:ident, $msg:expr) => {
        pub fn $fn() -> EngineError {
            EngineError::new(ErrorKind::$kind, $msg)
        }
    };
}

engine_err!(not_your_turn, NotYourTurn, "not this seat's turn to act");
engine_err!(seat_not_found, InvalidAction, "player has no seat in this game");
engine_err!(already_seated, InvalidAction, "player is already seated");
engine_err!(no_betting_round, InvalidAction, "no betting round in progress");
engine_err!(bet_facing_open_bet, InvalidAction, "cannot bet into an open bet, raise instead");
engine_err!(raise_without_bet, InvalidAction, "nothing to raise, bet instead");
engine_err!(raise_not_reopened, InvalidAction, "action was not reopened, call or fold");
engine_err!(raise_not_above_bet, InvalidAction, "raise must exceed the current bet");
engine_err!(call_without_bet, InvalidAction, "nothing to call, check instead");
engine_err!(check_when_facing_bet, CheckWhenFacingBet, "cannot check when facing a bet");
engine_err!(bet_below_min, BetBelowMin, "bet must be at least the big blind");
engine_err!(raise_below_min, RaiseBelowMin, "raise must be at least a full raise");
engine_err!(insufficient_stack, InsufficientStack, "stack does not cover that amount");
engine_err!(cash_out_during_hand, CashOutDuringHand, "cannot cash out during a hand");
engine_err!(already_cashed_out, AlreadyCashedOut, "seat has already cashed out");
engine_err!(not_cashed_out, NotCashedOut, "seat has not cashed out");
engine_err!(buy_in_out_of_range, BuyInOutOfRange, "buy-in outside the table's limits");
engine_err!(invalid_table_config, InvalidAction, "invalid table configuration");
engine_err!(game_not_waiting, GameNotWaiting, "game is not waiting to start");
engine_err!(game_finished, GameNotWaiting, "game has finished");
engine_err!(not_enough_players, GameNotWaiting, "at least two funded seats are required");
engine_err!(table_full, TableFull, "no open seat at this table");
engine_err!(table_busy, TableBusy, "table action queue is full, retry");
engine_err!(game_not_found, GameNotFound, "no such game");
engine_err!(deck_exhausted, DeckExhausted, "deck has no cards left to deal");
engine_err!(duplicate_card, BadCard, "deck contains a duplicate card");

engine_err!(internal_seat_missing, Internal, "seat disappeared mid-hand");
engine_err!(internal_pot_has_no_owner, Internal, "pot layer without an owner");
engine_err!(internal_pot_winner_missing, Internal, "pot without an eligible winner");
engine_err!(internal_malformed_total_bet, Internal, "total bet ledger out of sync");
engine_err!(internal_no_showdown_hands, Internal, "showdown reached with no hands");
engine_err!(internal_button_seat_missing, Internal, "no seat available for the button");
engine_err!(internal_chip_conservation, Internal, "payouts do not match the pot");
engine_err!(internal_unexpected_phase, Internal, "operation in an unexpected phase");

pub fn bad_card(input: &str) -> EngineError {
    EngineError::new(ErrorKind::BadCard, format!("not a card: {input:?}"))
}
