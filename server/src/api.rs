//! Request/response shapes of the JSON command surface.
//!
//! Transport is out of scope; these are the bodies a router would bind to
//! `POST /games/{id}/...` plus the error payload and its status mapping.

use serde::{Deserialize, Serialize};

use holdem_base::errors::{EngineError, ErrorKind, Result};
use holdem_base::essential::{Action, Chips};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

/// Body of `POST /games/{id}/action`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRequest {
    pub action_type: ActionType,
    pub amount: Option<Chips>,
}

impl ActionRequest {
    pub fn into_action(self) -> Result<Action> {
        match (self.action_type, self.amount) {
            (ActionType::Fold, _) => Ok(Action::Fold),
            (ActionType::Check, _) => Ok(Action::Check),
            (ActionType::Call, _) => Ok(Action::Call),
            (ActionType::Bet, Some(amount)) => Ok(Action::Bet(amount)),
            (ActionType::Raise, Some(amount)) => Ok(Action::Raise(amount)),
            (ActionType::AllIn, _) => Ok(Action::AllIn),
            (ActionType::Bet | ActionType::Raise, None) => Err(EngineError::new(
                ErrorKind::InvalidAction,
                "BET and RAISE require an amount",
            )),
        }
    }
}

/// Body of `POST /tables/{id}/join_table`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinTableRequest {
    pub buy_in: Chips,
}

/// Body of `POST /games/{id}/buy_back_in`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyBackInRequest {
    pub amount: Chips,
}

/// Error payload: the stable kind plus a human message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<EngineError> for ErrorBody {
    fn from(err: EngineError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// HTTP status a router should answer with for each error kind.
pub fn status_code(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidAction
        | ErrorKind::InsufficientStack
        | ErrorKind::BetBelowMin
        | ErrorKind::RaiseBelowMin
        | ErrorKind::CheckWhenFacingBet
        | ErrorKind::AlreadyCashedOut
        | ErrorKind::NotCashedOut
        | ErrorKind::BuyInOutOfRange
        | ErrorKind::BadCard => 400,
        ErrorKind::GameNotFound => 404,
        ErrorKind::NotYourTurn
        | ErrorKind::CashOutDuringHand
        | ErrorKind::GameNotWaiting
        | ErrorKind::TableFull => 409,
        ErrorKind::TableBusy => 503,
        ErrorKind::DeckExhausted | ErrorKind::Internal => 500,
    }
}
