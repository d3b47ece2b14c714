//! Immutable record of one completed hand.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::deck::Card;
use crate::errors::{self, Result};
use crate::essential::{Action, Chips, Phase, PlayerId, ShowdownHand, WinnerInfo};

#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ChipsChange {
    Add(Chips),
    Sub(Chips),
}

#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlindType {
    Sb,
    Bb,
}

#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlindBet {
    pub player_id: PlayerId,
    pub blind_type: BlindType,
    pub amount: Chips,
}

impl BlindBet {
    pub fn new(player_id: PlayerId, blind_type: BlindType, amount: Chips) -> Self {
        Self {
            player_id,
            blind_type,
            amount,
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlayerAction {
    pub player_id: PlayerId,
    pub action: Action,
}

impl PlayerAction {
    pub fn new(player_id: PlayerId, action: Action) -> Self {
        Self { player_id, action }
    }
}

/// Actions of one street plus the pot size entering it.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default,
)]
pub struct StreetActions {
    pub pot: Chips,
    pub actions: Vec<PlayerAction>,
}

/// Per-hand record.  Written once at settlement, never mutated after.
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default,
)]
pub struct HandHistory {
    pub hand_number: u64,
    pub dealer_seat: u8,
    pub board: Vec<Card>,
    pub blinds: Vec<BlindBet>,
    pub preflop: StreetActions,
    pub flop: StreetActions,
    pub turn: StreetActions,
    pub river: StreetActions,
    pub showdowns: BTreeMap<PlayerId, ShowdownHand>,
    pub chips_change: BTreeMap<PlayerId, ChipsChange>,
    /// Each seat's total contribution to the pot.
    pub contributions: BTreeMap<PlayerId, Chips>,
    pub pot_total: Chips,
    pub winner_info: Option<WinnerInfo>,
}

impl HandHistory {
    pub fn new(hand_number: u64, dealer_seat: u8) -> Self {
        Self {
            hand_number,
            dealer_seat,
            ..Default::default()
        }
    }

    pub fn set_board(&mut self, board: Vec<Card>) {
        self.board = board;
    }

    pub fn set_blinds(&mut self, blinds: Vec<BlindBet>) {
        self.blinds = blinds;
    }

    pub fn set_pot(&mut self, phase: Phase, pot: Chips) {
        match phase {
            Phase::Preflop => self.preflop.pot = pot,
            Phase::Flop => self.flop.pot = pot,
            Phase::Turn => self.turn.pot = pot,
            Phase::River => self.river.pot = pot,
            Phase::WaitingForPlayers | Phase::Showdown => (),
        }
    }

    pub fn add_action(&mut self, phase: Phase, action: PlayerAction) -> Result<()> {
        match phase {
            Phase::Preflop => self.preflop.actions.push(action),
            Phase::Flop => self.flop.actions.push(action),
            Phase::Turn => self.turn.actions.push(action),
            Phase::River => self.river.actions.push(action),
            Phase::WaitingForPlayers | Phase::Showdown => {
                return Err(errors::internal_unexpected_phase());
            }
        }
        Ok(())
    }

    pub fn add_showdown(&mut self, player_id: PlayerId, showdown: ShowdownHand) {
        self.showdowns.insert(player_id, showdown);
    }

    pub fn set_chips_change(&mut self, changes: &BTreeMap<PlayerId, i64>) {
        for (&player_id, &change) in changes.iter() {
            if change > 0 {
                self.chips_change
                    .insert(player_id, ChipsChange::Add(change as Chips));
            } else if change < 0 {
                self.chips_change
                    .insert(player_id, ChipsChange::Sub((-change) as Chips));
            }
        }
    }

    /// Seal the record with the hand's outcome.
    pub fn set_result(
        &mut self,
        winner_info: WinnerInfo,
        contributions: BTreeMap<PlayerId, Chips>,
    ) {
        self.pot_total = winner_info.pot_total;
        self.winner_info = Some(winner_info);
        self.contributions = contributions;
    }
}
