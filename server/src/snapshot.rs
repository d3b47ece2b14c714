//! Per-viewer projection of the authoritative game state.
//!
//! Snapshots are the only read surface clients ever see.  The projection
//! applies the card privacy filter: a seat's hole cards appear only to
//! their owner, to everyone while the phase is SHOWDOWN, or for seats that
//! showed down in the hand that just completed.

use serde::{Deserialize, Serialize};

use holdem_base::deck::Card;
use holdem_base::essential::{
    Chips, Display, GameId, GameStatus, GameSummary, Phase, PlayerId, SeatStatus, WinReason,
    WinnerInfo,
};
use holdem_base::game::Game;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeatView {
    pub player_id: PlayerId,
    pub seat_index: u8,
    pub stack: Chips,
    pub current_bet: Chips,
    pub total_bet_this_hand: Chips,
    /// Empty unless the viewer is allowed to see them.
    pub hole_cards: Vec<Card>,
    pub status: SeatStatus,
    pub cashed_out: bool,
    pub ready_for_next_hand: bool,
    pub final_stack: Option<Chips>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub table_name: String,
    pub status: GameStatus,
    pub phase: Phase,
    pub hand_number: u64,
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub board: Vec<Card>,
    pub dealer_seat: u8,
    pub current_turn_seat: Option<u8>,
    /// Action clock deadline for the acting seat, ms since the epoch.
    pub action_deadline: Option<u64>,
    pub seats: Vec<SeatView>,
    pub winner_info: Option<WinnerInfo>,
    pub summary: Option<GameSummary>,
    pub display: Vec<Display>,
}

/// Whether `viewer` may see this seat's hole cards right now.
fn cards_visible(game: &Game, seat_owner: PlayerId, viewer: Option<PlayerId>) -> bool {
    if viewer == Some(seat_owner) {
        return true;
    }
    if game.phase == Phase::Showdown {
        return true;
    }
    // Between hands, seats that showed down stay revealed
    if matches!(&game.winner_info, Some(info) if info.reason == WinReason::Showdown) {
        return game
            .completed_hands
            .last()
            .is_some_and(|hand| hand.showdowns.contains_key(&seat_owner));
    }
    false
}

pub fn project(game: &Game, viewer: Option<PlayerId>) -> GameSnapshot {
    let seats = game
        .seat_map
        .values()
        .map(|seat| SeatView {
            player_id: seat.player_id,
            seat_index: seat.seat_index,
            stack: seat.stack,
            current_bet: game.bet_map.get(&seat.player_id).copied().unwrap_or(0),
            total_bet_this_hand: game
                .total_bet_map
                .get(&seat.player_id)
                .copied()
                .unwrap_or(0),
            hole_cards: if cards_visible(game, seat.player_id, viewer) {
                seat.hole_cards.clone()
            } else {
                Vec::new()
            },
            status: seat.status,
            cashed_out: seat.cashed_out,
            ready_for_next_hand: seat.ready_for_next_hand,
            final_stack: seat.final_stack,
        })
        .collect();

    GameSnapshot {
        game_id: game.game_id,
        table_name: game.config.name.clone(),
        status: game.status,
        phase: game.phase,
        hand_number: game.hand_number,
        pot: game.pot(),
        current_bet: game.street_bet,
        min_raise: game.min_raise,
        board: game.board.clone(),
        dealer_seat: game.btn,
        current_turn_seat: game.acting_seat.as_ref().map(|a| a.seat_index),
        action_deadline: game.acting_seat.as_ref().map(|a| a.deadline),
        seats,
        winner_info: game.winner_info.clone(),
        summary: game.summary.clone(),
        display: game.display.clone(),
    }
}
