//! Game state machine of a cash table: the core of this lib.
//!
//! One [`Game`] owns everything a table needs for one session: seats, the
//! current deck, bet ledgers, pots and the append-only action log.  All
//! methods are synchronous and mutate in place; the coordinator serializes
//! callers and takes care of persistence and broadcasting.
//!
//! Timestamps (`now`) are milliseconds since the epoch, supplied by the
//! caller so that hands replay deterministically.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::deck::{Card, Deck};
use crate::errors::{self, Result};
use crate::essential::{
    ActingSeat, Action, ActionRecord, Chips, Display, GameId, GameStatus, GameSummary, Phase,
    PlayerId, Pot, PotAward, Seat, SeatResult, SeatStatus, SeatSummary, ShowdownHand, TableConfig,
    WinReason, Winner, WinnerInfo, ACTION_TIMEOUT_POSTFLOP, ACTION_TIMEOUT_PREFLOP,
    ACTION_TIMEOUT_RIVER, ACTION_TIMEOUT_TURN, MAX_ACTION_TIMEOUT_COUNT, WAIT_TIMEOUT_LAST_PLAYER,
    WAIT_TIMEOUT_RUNNER, WAIT_TIMEOUT_SHOWDOWN,
};
use crate::evaluator::{compare_ranks, evaluate_cards, seven_cards, HandRank};
use crate::hand_history::{BlindBet, BlindType, HandHistory, PlayerAction};

#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Game {
    pub game_id: GameId,
    pub config: TableConfig,
    pub status: GameStatus,
    pub phase: Phase,
    pub hand_number: u64,
    /// Dealer button, as a seat index.
    pub btn: u8,
    /// Highest bet to match in the current round.
    pub street_bet: Chips,
    /// Minimum raise increment (the last full raise, floored at one big blind).
    pub min_raise: Chips,
    pub board: Vec<Card>,
    pub seat_map: BTreeMap<PlayerId, Seat>,
    /// Seats of the current hand arranged clockwise from the button:
    /// SB, BB, ..., BTN.
    pub seat_order: Vec<PlayerId>,
    /// Chips committed in the current round, per seat.
    pub bet_map: BTreeMap<PlayerId, Chips>,
    /// Chips committed over the whole hand, per seat.
    pub total_bet_map: BTreeMap<PlayerId, Chips>,
    pub prize_map: BTreeMap<PlayerId, Chips>,
    pub pots: Vec<Pot>,
    pub acting_seat: Option<ActingSeat>,
    pub last_aggressor: Option<PlayerId>,
    pub winner_info: Option<WinnerInfo>,
    pub summary: Option<GameSummary>,
    pub action_log: Vec<ActionRecord>,
    pub hand_history: HandHistory,
    /// Completed hands, oldest first.
    pub completed_hands: Vec<HandHistory>,
    pub display: Vec<Display>,
    pub deck: Deck,
    pub deck_seed: u64,
    /// Injected deck for the next hand (tests and replays).
    pub next_deck: Option<Deck>,
    /// When the between-hands wait expires, ms timestamp; 0 when unarmed.
    pub next_hand_start: u64,
    /// Accounting rows of seats that already left the table.
    pub departed: Vec<SeatSummary>,
}

impl Game {
    pub fn new(game_id: GameId, config: TableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            game_id,
            config,
            status: GameStatus::Waiting,
            phase: Phase::WaitingForPlayers,
            hand_number: 0,
            btn: 0,
            street_bet: 0,
            min_raise: 0,
            board: Vec::with_capacity(5),
            seat_map: BTreeMap::new(),
            seat_order: Vec::new(),
            bet_map: BTreeMap::new(),
            total_bet_map: BTreeMap::new(),
            prize_map: BTreeMap::new(),
            pots: Vec::new(),
            acting_seat: None,
            last_aggressor: None,
            winner_info: None,
            summary: None,
            action_log: Vec::new(),
            hand_history: HandHistory::default(),
            completed_hands: Vec::new(),
            display: Vec::new(),
            deck: Deck::default(),
            deck_seed: 0,
            next_deck: None,
            next_hand_start: 0,
            departed: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The pot is the sum of every seat's contribution this hand.
    pub fn pot(&self) -> Chips {
        self.total_bet_map.values().sum()
    }

    pub fn is_acting_seat(&self, player_id: PlayerId) -> bool {
        matches!(&self.acting_seat, Some(acting) if acting.player_id == player_id)
    }

    fn seat(&self, player_id: PlayerId) -> Result<&Seat> {
        self.seat_map
            .get(&player_id)
            .ok_or_else(errors::seat_not_found)
    }

    fn seat_mut(&mut self, player_id: PlayerId) -> Result<&mut Seat> {
        self.seat_map
            .get_mut(&player_id)
            .ok_or_else(errors::seat_not_found)
    }

    fn seat_bet(&self, player_id: PlayerId) -> Chips {
        self.bet_map.get(&player_id).copied().unwrap_or(0)
    }

    /// Seats that can be dealt into the next hand.
    fn eligible_players(&self) -> Vec<PlayerId> {
        self.seat_map
            .values()
            .filter(|s| !s.cashed_out && s.stack > 0)
            .map(|s| s.player_id)
            .collect()
    }

    fn set_seat_status(&mut self, player_id: PlayerId, status: SeatStatus) -> Result<()> {
        self.seat_mut(player_id)?.status = status;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Seat a player at the lowest open seat.  Joining mid-hand sits the
    /// seat out until the next hand.
    pub fn add_player(&mut self, player_id: PlayerId, buy_in: Chips) -> Result<u8> {
        if self.status == GameStatus::Finished {
            return Err(errors::game_finished());
        }
        if self.seat_map.contains_key(&player_id) {
            return Err(errors::already_seated());
        }
        if buy_in < self.config.min_buy_in || buy_in > self.config.max_buy_in {
            return Err(errors::buy_in_out_of_range());
        }
        let occupied: Vec<u8> = self.seat_map.values().map(|s| s.seat_index).collect();
        let Some(seat_index) = (0..self.config.max_seats).find(|i| !occupied.contains(i)) else {
            return Err(errors::table_full());
        };
        info!(game_id = self.game_id, player_id, seat_index, buy_in, "player joins");
        self.seat_map
            .insert(player_id, Seat::new(player_id, seat_index, buy_in));
        Ok(seat_index)
    }

    /// WAITING -> PREFLOP.  Requires two funded, non-cashed-out seats.
    pub fn start_game(&mut self, now: u64) -> Result<()> {
        if self.status != GameStatus::Waiting {
            return Err(errors::game_not_waiting());
        }
        if self.eligible_players().len() < 2 {
            return Err(errors::not_enough_players());
        }
        self.status = GameStatus::Playing;
        self.start_new_hand(now)
    }

    /// Between hands, record readiness.  Idempotent: re-readying is a no-op.
    /// Starts the next hand once every non-cashed-out seat is ready.
    pub fn ready_for_next_hand(&mut self, player_id: PlayerId, now: u64) -> Result<()> {
        let phase = self.phase;
        let seat = self.seat_mut(player_id)?;
        if seat.cashed_out {
            return Err(errors::already_cashed_out());
        }
        if phase != Phase::WaitingForPlayers {
            return Err(errors::game_not_waiting());
        }
        seat.ready_for_next_hand = true;
        self.try_start_next_hand(now)
    }

    /// Record `final_stack` and turn the seat into a spectator.  Disallowed
    /// while the seat is involved in a hand; idempotent afterwards.
    pub fn cash_out(&mut self, player_id: PlayerId, now: u64) -> Result<()> {
        let game_id = self.game_id;
        let seat = self.seat_mut(player_id)?;
        if seat.cashed_out {
            return Ok(());
        }
        if seat.status != SeatStatus::SitOut {
            return Err(errors::cash_out_during_hand());
        }
        info!(game_id, player_id, stack = seat.stack, "cash out");
        seat.cashed_out = true;
        seat.final_stack = Some(seat.stack);
        seat.ready_for_next_hand = false;
        if self.all_cashed_out() {
            self.finish_game();
        } else {
            // The departing seat no longer gates readiness
            self.try_start_next_hand(now)?;
        }
        Ok(())
    }

    /// Re-enter a cashed-out seat with a fresh stack, from the next hand on.
    /// Retrying the same buy-back within the same hand is a no-op.
    pub fn buy_back_in(&mut self, player_id: PlayerId, amount: Chips) -> Result<()> {
        if self.status == GameStatus::Finished {
            return Err(errors::game_finished());
        }
        let hand_number = self.hand_number;
        let min = self.config.min_buy_in;
        let max = self.config.max_buy_in;
        let game_id = self.game_id;
        let seat = self.seat_mut(player_id)?;
        if !seat.cashed_out {
            if seat.last_buy_back == Some((hand_number, amount)) {
                return Ok(());
            }
            return Err(errors::not_cashed_out());
        }
        if amount < min || amount > max {
            return Err(errors::buy_in_out_of_range());
        }
        info!(game_id, player_id, amount, "buy back in");
        seat.cashed_out = false;
        seat.stack = amount;
        seat.starting_stack += amount;
        seat.final_stack = None;
        seat.status = SeatStatus::SitOut;
        seat.ready_for_next_hand = false;
        seat.timeout_count = 0;
        seat.last_buy_back = Some((hand_number, amount));
        Ok(())
    }

    /// Release the seat and return the chips to credit back to the player's
    /// bankroll.  Only legal while cashed out.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<Chips> {
        let seat = self.seat(player_id)?;
        if !seat.cashed_out {
            return Err(errors::not_cashed_out());
        }
        let final_stack = seat.final_stack.unwrap_or(seat.stack);
        let row = SeatSummary {
            player_id,
            seat_index: seat.seat_index,
            starting_stack: seat.starting_stack,
            final_stack,
            win_loss: final_stack as i64 - seat.starting_stack as i64,
        };
        self.departed.push(row);
        self.seat_map.remove(&player_id);
        info!(game_id = self.game_id, player_id, final_stack, "seat released");
        Ok(final_stack)
    }

    fn all_cashed_out(&self) -> bool {
        !self.seat_map.is_empty() && self.seat_map.values().all(|s| s.cashed_out)
    }

    /// FINISHED: compute the summary exactly once.
    fn finish_game(&mut self) {
        if self.summary.is_some() {
            return;
        }
        self.status = GameStatus::Finished;
        self.next_hand_start = 0;
        let mut results: Vec<SeatSummary> = self
            .seat_map
            .values()
            .map(|s| {
                let final_stack = s.final_stack.unwrap_or(s.stack);
                SeatSummary {
                    player_id: s.player_id,
                    seat_index: s.seat_index,
                    starting_stack: s.starting_stack,
                    final_stack,
                    win_loss: final_stack as i64 - s.starting_stack as i64,
                }
            })
            .chain(self.departed.iter().cloned())
            .collect();
        results.sort_by(|a, b| b.win_loss.cmp(&a.win_loss));
        info!(game_id = self.game_id, "game finished, summary ready");
        self.summary = Some(GameSummary { results });
    }

    /// Start the next hand if everyone still seated is ready.
    fn try_start_next_hand(&mut self, now: u64) -> Result<()> {
        if self.status != GameStatus::Playing || self.phase != Phase::WaitingForPlayers {
            return Ok(());
        }
        let all_ready = self
            .seat_map
            .values()
            .filter(|s| !s.cashed_out)
            .all(|s| s.ready_for_next_hand);
        if all_ready && self.eligible_players().len() >= 2 {
            self.start_new_hand(now)?;
        }
        Ok(())
    }

    /// The between-hands wait expired: unready seats are treated as ready.
    pub fn on_ready_timeout(&mut self, now: u64) -> Result<()> {
        if self.status != GameStatus::Playing
            || self.phase != Phase::WaitingForPlayers
            || self.next_hand_start == 0
            || now < self.next_hand_start
        {
            return Ok(());
        }
        if self.eligible_players().len() >= 2 {
            self.start_new_hand(now)
        } else {
            // Not enough funded seats; wait for joins or buy-backs.
            self.next_hand_start = 0;
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Hand setup
    // ------------------------------------------------------------------

    /// The button moves clockwise among seats that can play.  The first
    /// hand puts it on the lowest seat index.
    fn next_btn(&self) -> Result<u8> {
        let mut positions: Vec<u8> = self
            .seat_map
            .values()
            .filter(|s| !s.cashed_out && s.stack > 0)
            .map(|s| s.seat_index)
            .collect();
        positions.sort_unstable();
        if self.hand_number <= 1 {
            return positions
                .first()
                .copied()
                .ok_or_else(errors::internal_button_seat_missing);
        }
        positions
            .iter()
            .find(|&&p| p > self.btn)
            .or(positions.first())
            .copied()
            .ok_or_else(errors::internal_button_seat_missing)
    }

    /// According to seat positions, place the in-hand seats in the order:
    /// SB, BB, UTG (1st-to-act), ..., BTN (last-to-act).
    fn arrange_players(&mut self, last_pos: u8) {
        let mut seat_pos: Vec<(PlayerId, u16)> = self
            .seat_map
            .values()
            .filter(|s| s.status != SeatStatus::SitOut)
            .map(|s| {
                if s.seat_index > last_pos {
                    (s.player_id, (s.seat_index - last_pos) as u16)
                } else {
                    (s.player_id, s.seat_index as u16 + 100)
                }
            })
            .collect();
        seat_pos.sort_by_key(|&(_, pos)| pos);
        self.seat_order = seat_pos.into_iter().map(|(id, _)| id).collect();
    }

    pub fn start_new_hand(&mut self, now: u64) -> Result<()> {
        self.hand_number += 1;
        self.btn = self.next_btn()?;
        debug!(game_id = self.game_id, hand = self.hand_number, btn = self.btn, "new hand");

        // Reset everything the last hand left behind
        self.board.clear();
        self.bet_map.clear();
        self.total_bet_map.clear();
        self.prize_map.clear();
        self.pots.clear();
        self.display.clear();
        self.acting_seat = None;
        self.last_aggressor = None;
        self.winner_info = None;
        self.street_bet = 0;
        self.min_raise = 0;
        self.next_hand_start = 0;

        for seat in self.seat_map.values_mut() {
            seat.hole_cards.clear();
            seat.ready_for_next_hand = false;
            seat.status = if !seat.cashed_out && seat.stack > 0 {
                SeatStatus::Wait
            } else {
                SeatStatus::SitOut
            };
        }

        self.hand_history = HandHistory::new(self.hand_number, self.btn);

        match self.next_deck.take() {
            Some(deck) => {
                self.deck = deck;
                self.deck_seed = 0;
            }
            None => {
                self.deck_seed = Deck::random_seed();
                self.deck = Deck::shuffled(self.deck_seed);
            }
        }

        // Two cards each, clockwise from the seat left of the button
        self.arrange_players(self.btn);
        for player_id in self.seat_order.clone() {
            let cards = self.deck.deal(2)?;
            self.seat_mut(player_id)?.hole_cards = cards;
        }
        self.display.push(Display::DealCards);

        self.phase = Phase::Preflop;
        self.blind_bets(now)
    }

    fn blind_bets(&mut self, now: u64) -> Result<()> {
        if self.seat_order.len() < 2 {
            return Err(errors::not_enough_players());
        }
        let sb = self.config.small_blind;
        let bb = self.config.big_blind;

        // Heads-up: the button posts the small blind and acts first preflop
        let (sb_id, bb_id) = if self.seat_order.len() == 2 {
            (self.seat_order[1], self.seat_order[0])
        } else {
            (self.seat_order[0], self.seat_order[1])
        };

        let (allin, real_sb) = self.take_bet(sb_id, sb)?;
        if allin {
            self.set_seat_status(sb_id, SeatStatus::Allin)?;
        }
        let (allin, real_bb) = self.take_bet(bb_id, bb)?;
        if allin {
            self.set_seat_status(bb_id, SeatStatus::Allin)?;
        }

        self.hand_history.set_blinds(vec![
            BlindBet::new(sb_id, BlindType::Sb, real_sb),
            BlindBet::new(bb_id, BlindType::Bb, real_bb),
        ]);
        self.hand_history.set_pot(Phase::Preflop, real_sb + real_bb);

        self.street_bet = bb;
        self.min_raise = bb;
        self.last_aggressor = Some(bb_id);

        // Under the gun is left of the big blind
        if self.seat_order.len() == 2 {
            self.seat_order.rotate_left(1);
        } else {
            self.seat_order.rotate_left(2);
        }

        let first_to_act = self
            .seat_order
            .clone()
            .into_iter()
            .find(|id| matches!(self.seat_map.get(id), Some(s) if s.next_to_act()));

        match first_to_act {
            Some(player_id) => self.ask_for_action(player_id, now),
            // Blinds already put everyone all-in
            None => self.next_state(now),
        }
    }

    // ------------------------------------------------------------------
    // Betting
    // ------------------------------------------------------------------

    fn action_time(&self) -> u64 {
        match self.phase {
            Phase::Flop => ACTION_TIMEOUT_POSTFLOP,
            Phase::Turn => ACTION_TIMEOUT_TURN,
            Phase::River => ACTION_TIMEOUT_RIVER,
            Phase::Preflop => {
                if self.street_bet == self.config.big_blind {
                    ACTION_TIMEOUT_PREFLOP
                } else {
                    ACTION_TIMEOUT_POSTFLOP
                }
            }
            _ => 0,
        }
    }

    fn ask_for_action(&mut self, player_id: PlayerId, now: u64) -> Result<()> {
        let deadline = now + self.action_time();
        let seat = self.seat_mut(player_id)?;
        // A seat that already matched a level may not reraise unless a full
        // raise reopened the round since.
        let can_raise = seat.status == SeatStatus::Wait;
        let seat_index = seat.seat_index;
        seat.status = SeatStatus::Acting;
        debug!(game_id = self.game_id, player_id, can_raise, "asking seat to act");
        self.acting_seat = Some(ActingSeat {
            player_id,
            seat_index,
            can_raise,
            deadline,
        });
        Ok(())
    }

    fn take_bet(&mut self, player_id: PlayerId, amount: Chips) -> Result<(bool, Chips)> {
        let seat = self.seat_mut(player_id)?;
        let (allin, real_amount) = seat.take_bet(amount);
        *self.bet_map.entry(player_id).or_insert(0) += real_amount;
        *self.total_bet_map.entry(player_id).or_insert(0) += real_amount;
        Ok((allin, real_amount))
    }

    /// A full bet or raise reopens the round: seats that had matched the
    /// previous level owe action again and may reraise.
    fn reopen_action(&mut self, aggressor: PlayerId) {
        for seat in self.seat_map.values_mut() {
            if seat.player_id != aggressor && seat.status == SeatStatus::Acted {
                seat.status = SeatStatus::Wait;
            }
        }
        self.last_aggressor = Some(aggressor);
    }

    /// Validate and apply one action of the acting seat, then advance the
    /// hand as far as it will go without further input.
    pub fn handle_action(&mut self, player_id: PlayerId, action: Action, now: u64) -> Result<()> {
        if self.status != GameStatus::Playing || !self.phase.is_betting() {
            return Err(errors::no_betting_round());
        }
        let Some(acting) = self.acting_seat else {
            return Err(errors::not_your_turn());
        };
        if acting.player_id != player_id {
            return Err(errors::not_your_turn());
        }

        let seat = self.seat(player_id)?;
        let stack = seat.stack;
        let bb = self.config.big_blind;
        let street_bet = self.street_bet;
        let betted = self.seat_bet(player_id);

        let moved = match action {
            Action::Fold => {
                self.set_seat_status(player_id, SeatStatus::Fold)?;
                0
            }

            Action::Check => {
                if betted != street_bet {
                    return Err(errors::check_when_facing_bet());
                }
                self.set_seat_status(player_id, SeatStatus::Acted)?;
                0
            }

            Action::Call => {
                if street_bet <= betted {
                    return Err(errors::call_without_bet());
                }
                // A short call goes all-in and does not reopen the round
                let (allin, real) = self.take_bet(player_id, street_bet - betted)?;
                self.set_seat_acted(player_id, allin)?;
                real
            }

            Action::Bet(amount) => {
                if street_bet != 0 {
                    return Err(errors::bet_facing_open_bet());
                }
                if amount > stack {
                    return Err(errors::insufficient_stack());
                }
                if amount < bb && amount != stack {
                    return Err(errors::bet_below_min());
                }
                let full = amount >= bb;
                let (allin, real) = self.take_bet(player_id, amount)?;
                self.street_bet = real;
                if full {
                    self.min_raise = real;
                    self.reopen_action(player_id);
                }
                self.set_seat_acted(player_id, allin)?;
                real
            }

            Action::Raise(to_amount) => {
                if street_bet == 0 || self.bet_map.is_empty() {
                    return Err(errors::raise_without_bet());
                }
                if !acting.can_raise {
                    return Err(errors::raise_not_reopened());
                }
                if to_amount <= street_bet {
                    return Err(errors::raise_not_above_bet());
                }
                let add = to_amount - betted;
                if add > stack {
                    return Err(errors::insufficient_stack());
                }
                if to_amount < street_bet + self.min_raise && add != stack {
                    return Err(errors::raise_below_min());
                }
                let (allin, real) = self.take_bet(player_id, add)?;
                let new_bet = betted + real;
                // An undersized all-in raise does not reopen the round and
                // leaves the raise increment untouched
                if new_bet >= street_bet + self.min_raise {
                    self.min_raise = new_bet - street_bet;
                    self.reopen_action(player_id);
                }
                self.street_bet = new_bet;
                self.set_seat_acted(player_id, allin)?;
                real
            }

            Action::AllIn => {
                let resolved = if street_bet == 0 {
                    Action::Bet(stack)
                } else if betted + stack <= street_bet {
                    Action::Call
                } else {
                    Action::Raise(betted + stack)
                };
                return self.handle_action(player_id, resolved, now);
            }
        };

        self.seat_mut(player_id)?.timeout_count = 0;
        self.record_action(player_id, action, moved, now)?;
        self.next_state(now)
    }

    fn set_seat_acted(&mut self, player_id: PlayerId, allin: bool) -> Result<()> {
        self.set_seat_status(
            player_id,
            if allin {
                SeatStatus::Allin
            } else {
                SeatStatus::Acted
            },
        )
    }

    fn record_action(
        &mut self,
        player_id: PlayerId,
        action: Action,
        moved: Chips,
        now: u64,
    ) -> Result<()> {
        let seat_index = self.seat(player_id)?.seat_index;
        let phase = self.phase;
        self.hand_history
            .add_action(phase, PlayerAction::new(player_id, action))?;
        self.action_log.push(ActionRecord {
            seq: self.action_log.len() as u64 + 1,
            hand_number: self.hand_number,
            player_id,
            seat_index,
            action,
            amount: moved,
            phase,
            timestamp_ms: now,
        });
        Ok(())
    }

    /// The action clock expired: check when free, fold when facing a bet.
    pub fn on_action_timeout(&mut self, player_id: PlayerId, now: u64) -> Result<()> {
        if !self.is_acting_seat(player_id) {
            return Err(errors::not_your_turn());
        }
        let betted = self.seat_bet(player_id);
        let seat = self.seat_mut(player_id)?;
        seat.timeout_count += 1;
        let action = if betted == self.street_bet {
            Action::Check
        } else {
            Action::Fold
        };
        debug!(game_id = self.game_id, player_id, ?action, "action timeout");
        self.set_seat_status(
            player_id,
            match action {
                Action::Check => SeatStatus::Acted,
                _ => SeatStatus::Fold,
            },
        )?;
        self.record_action(player_id, action, 0, now)?;
        self.next_state(now)
    }

    // ------------------------------------------------------------------
    // Advancement
    // ------------------------------------------------------------------

    fn ref_position(&self) -> u8 {
        match &self.acting_seat {
            Some(acting) => acting.seat_index,
            None => self.btn,
        }
    }

    /// The first seat in order that still owes action this round.
    fn next_action_player(&self, candidates: &[PlayerId]) -> Option<PlayerId> {
        for id in candidates {
            if let Some(seat) = self.seat_map.get(id) {
                let bet = self.seat_bet(*id);
                if bet < self.street_bet || seat.status == SeatStatus::Wait {
                    return Some(*id);
                }
            }
        }
        None
    }

    /// De facto advancement loop.  Called after every mutation that can
    /// close a round; keeps going until a human seat owes action or the
    /// hand is settled.
    fn next_state(&mut self, now: u64) -> Result<()> {
        let last_pos = self.ref_position();
        self.arrange_players(last_pos);

        let mut to_stay = Vec::new();
        let mut to_act = Vec::new();
        let mut allin = Vec::new();
        for id in self.seat_order.clone() {
            let Some(seat) = self.seat_map.get(&id) else {
                continue;
            };
            match seat.status {
                SeatStatus::Acting => to_stay.push(id),
                SeatStatus::Wait | SeatStatus::Acted => {
                    to_stay.push(id);
                    to_act.push(id);
                }
                SeatStatus::Allin => {
                    to_stay.push(id);
                    allin.push(id);
                }
                SeatStatus::Fold | SeatStatus::SitOut => {}
            }
        }

        // Everyone else folded: the pot moves without a showdown
        if to_stay.len() == 1 {
            let winner = to_stay[0];
            debug!(game_id = self.game_id, winner, "all others folded");
            self.acting_seat = None;
            return self.single_player_win(winner, now);
        }

        if let Some(next_player) = self.next_action_player(&to_act) {
            return self.ask_for_action(next_player, now);
        }

        // Betting is done for good: run the board out and settle
        if allin.len() + 1 >= to_stay.len() {
            self.acting_seat = None;
            self.collect_bets()?;
            let ran_out = self.board.len() < 5;
            while self.board.len() < 5 {
                let prev = self.board.len();
                let n = if prev == 0 { 3 } else { 1 };
                let mut cards = self.deck.deal(n)?;
                self.board.append(&mut cards);
                self.display.push(Display::DealBoard {
                    prev,
                    board: self.board.clone(),
                });
            }
            self.hand_history.set_board(self.board.clone());
            self.phase = Phase::Showdown;
            let wait = if ran_out {
                WAIT_TIMEOUT_RUNNER
            } else {
                WAIT_TIMEOUT_SHOWDOWN
            };
            return self.settle(now, wait);
        }

        match self.next_phase() {
            Phase::Showdown => {
                self.acting_seat = None;
                self.collect_bets()?;
                self.phase = Phase::Showdown;
                self.settle(now, WAIT_TIMEOUT_SHOWDOWN)
            }
            next_phase => {
                self.change_street(next_phase)?;
                let total_pot: Chips = self.pots.iter().map(|p| p.amount).sum();
                self.hand_history.set_pot(next_phase, total_pot);
                self.next_state(now)
            }
        }
    }

    fn next_phase(&self) -> Phase {
        match self.phase {
            Phase::WaitingForPlayers => Phase::Preflop,
            Phase::Preflop => Phase::Flop,
            Phase::Flop => Phase::Turn,
            Phase::Turn => Phase::River,
            _ => Phase::Showdown,
        }
    }

    fn change_street(&mut self, new_phase: Phase) -> Result<()> {
        for seat in self.seat_map.values_mut() {
            if seat.status == SeatStatus::Acted {
                seat.status = SeatStatus::Wait;
            }
        }
        self.collect_bets()?;
        self.phase = new_phase;
        debug!(game_id = self.game_id, phase = ?self.phase, "street changes");
        self.street_bet = 0;
        self.min_raise = self.config.big_blind;
        self.acting_seat = None;
        self.last_aggressor = None;

        let prev = self.board.len();
        let n = match new_phase {
            Phase::Flop => 3,
            Phase::Turn | Phase::River => 1,
            _ => return Err(errors::internal_unexpected_phase()),
        };
        let mut cards = self.deck.deal(n)?;
        self.board.append(&mut cards);
        self.display.push(Display::DealBoard {
            prev,
            board: self.board.clone(),
        });
        self.hand_history.set_board(self.board.clone());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pots and settlement
    // ------------------------------------------------------------------

    /// Layer the round's bets into main and side pots.  For example, after
    /// players A(100), B(45), C(45), D(50) call or go all-in:
    /// Main:  { amount: 45*4, owners: [A, B, C, D] }
    /// Side1: { amount: 5*2,  owners: [A, D] }
    /// Side2: { amount: 50,   owners: [A] } <- returned to A uncontested
    fn collect_bets(&mut self) -> Result<()> {
        let unfolded: Vec<PlayerId> = self
            .seat_map
            .values()
            .filter(|s| s.is_active())
            .map(|s| s.player_id)
            .collect();

        // Owners folded since earlier streets no longer contest their pots
        for pot in self.pots.iter_mut() {
            pot.owners.retain(|id| unfolded.contains(id));
        }

        let mut levels: Vec<Chips> = self.bet_map.values().copied().collect();
        levels.sort_unstable();
        levels.dedup();

        let mut new_pots = Vec::<Pot>::new();
        let mut acc: Chips = 0;
        for level in levels {
            let mut owners: Vec<PlayerId> = self
                .bet_map
                .iter()
                .filter(|(_, &bet)| bet >= level)
                .map(|(&id, _)| id)
                .collect();
            let layer = level - acc;
            let amount = layer * owners.len() as Chips;
            if owners.len() == 1 {
                // An uncontested layer goes back to its owner
                let owner = owners[0];
                let total_bet = self
                    .total_bet_map
                    .get_mut(&owner)
                    .ok_or_else(errors::internal_malformed_total_bet)?;
                *total_bet = total_bet
                    .checked_sub(amount)
                    .ok_or_else(errors::internal_malformed_total_bet)?;
                self.seat_mut(owner)?.stack += amount;
                continue;
            }
            owners.retain(|id| unfolded.contains(id));
            new_pots.push(Pot {
                owners,
                winners: Vec::new(),
                amount,
            });
            acc += layer;
        }

        // Successive layers with the same contenders are one pot
        for new_pot in new_pots {
            match self.pots.last_mut() {
                Some(last) if last.owners.len() == new_pot.owners.len() => last.merge(&new_pot),
                _ => self.pots.push(new_pot),
            }
        }

        debug!(game_id = self.game_id, pots = ?self.pots, "bets collected");
        self.display.push(Display::CollectBets {
            bet_map: self.bet_map.clone(),
        });
        self.bet_map.clear();
        Ok(())
    }

    /// `winner_sets` ranks seats from strongest to weakest, ties grouped:
    /// `[[alice, bob], [carol]]` reads "alice and bob split over carol".
    fn assign_winners(&mut self, winner_sets: &[Vec<PlayerId>]) -> Result<()> {
        for pot in self.pots.iter_mut() {
            let winners = winner_sets
                .iter()
                .map(|set| {
                    set.iter()
                        .filter(|id| pot.owners.contains(id))
                        .copied()
                        .collect::<Vec<PlayerId>>()
                })
                .find(|set| !set.is_empty())
                .ok_or_else(errors::internal_pot_winner_missing)?;
            pot.winners = winners;
        }

        let award_pots = self
            .pots
            .iter()
            .map(|pot| PotAward {
                winners: pot.winners.clone(),
                amount: pot.amount,
            })
            .collect();
        self.display.push(Display::AwardPots { pots: award_pots });
        Ok(())
    }

    /// The winning seat earliest clockwise from the button.
    fn first_clockwise(&self, ids: &[PlayerId]) -> Result<PlayerId> {
        ids.iter()
            .filter_map(|id| self.seat_map.get(id))
            .min_by_key(|s| {
                if s.seat_index > self.btn {
                    (s.seat_index - self.btn) as u16
                } else {
                    s.seat_index as u16 + 100
                }
            })
            .map(|s| s.player_id)
            .ok_or_else(errors::internal_pot_winner_missing)
    }

    /// Split each pot among its winners.  An indivisible remainder goes to
    /// the winner earliest clockwise from the button of that pot.
    fn calc_prize(&mut self) -> Result<()> {
        let mut prize_map = BTreeMap::<PlayerId, Chips>::new();
        let pots = self.pots.clone();
        for pot in &pots {
            let cnt = pot.winners.len() as Chips;
            if cnt == 0 {
                return Err(errors::internal_pot_winner_missing());
            }
            let share = pot.amount / cnt;
            let remainder = pot.amount % cnt;
            for winner in &pot.winners {
                *prize_map.entry(*winner).or_insert(0) += share;
            }
            if remainder > 0 {
                let taker = self.first_clockwise(&pot.winners)?;
                *prize_map.entry(taker).or_insert(0) += remainder;
            }
        }
        self.prize_map = prize_map;
        Ok(())
    }

    /// Per-seat chips delta for the hand: prizes won minus chips contributed.
    fn update_chips_map(&mut self) -> Result<BTreeMap<PlayerId, i64>> {
        let mut chips_change_map: BTreeMap<PlayerId, i64> = self
            .seat_map
            .values()
            .filter(|s| s.in_hand())
            .map(|s| (s.player_id, 0))
            .collect();

        for (player_id, total_bet) in self.total_bet_map.iter() {
            chips_change_map
                .entry(*player_id)
                .and_modify(|chg| *chg -= *total_bet as i64);
        }
        for (player_id, prize) in self.prize_map.iter() {
            chips_change_map
                .entry(*player_id)
                .and_modify(|chg| *chg += *prize as i64);
        }

        let mut result_seat_map = BTreeMap::<PlayerId, SeatResult>::new();
        for (id, seat) in self.seat_map.iter() {
            if !seat.in_hand() {
                continue;
            }
            let prize = self.prize_map.get(id).copied().filter(|&p| p > 0);
            result_seat_map.insert(
                *id,
                SeatResult {
                    player_id: *id,
                    seat_index: seat.seat_index,
                    stack: seat.stack,
                    prize,
                    status: seat.status,
                },
            );
        }
        self.display.push(Display::GameResult {
            seat_map: result_seat_map,
        });

        self.hand_history.set_chips_change(&chips_change_map);
        Ok(chips_change_map)
    }

    fn apply_prize(&mut self) -> Result<()> {
        for seat in self.seat_map.values_mut() {
            if let Some(prize) = self.prize_map.get(&seat.player_id) {
                seat.stack += *prize;
            }
        }
        Ok(())
    }

    fn single_player_win(&mut self, winner: PlayerId, now: u64) -> Result<()> {
        self.collect_bets()?;
        self.assign_winners(&[vec![winner]])?;
        self.calc_prize()?;
        let chips_change = self.update_chips_map()?;
        self.apply_prize()?;
        self.finalize_hand(
            WinReason::AllFolded,
            BTreeMap::new(),
            chips_change,
            now,
            WAIT_TIMEOUT_LAST_PLAYER,
        )
    }

    /// Showdown: evaluate every eligible hand, rank into tiers, award pots.
    fn settle(&mut self, now: u64, wait: u64) -> Result<()> {
        let mut hands: Vec<(PlayerId, HandRank)> = Vec::new();
        let mut showdowns = BTreeMap::<PlayerId, ShowdownHand>::new();

        for seat in self.seat_map.values() {
            if !seat.is_active() {
                continue;
            }
            if seat.hole_cards.len() != 2 {
                return Err(errors::internal_seat_missing());
            }
            let cards = seven_cards(&self.board, &seat.hole_cards);
            let rank = evaluate_cards(&cards);
            showdowns.insert(
                seat.player_id,
                ShowdownHand {
                    hole_cards: seat.hole_cards.clone(),
                    category: rank.category,
                    picks: rank.picks.clone(),
                },
            );
            hands.push((seat.player_id, rank));
        }

        if hands.is_empty() {
            return Err(errors::internal_no_showdown_hands());
        }
        hands.sort_by(|(_, h1), (_, h2)| compare_ranks(h2, h1));

        // Group equal hands into tiers, strongest first
        let mut winner_sets: Vec<Vec<PlayerId>> = Vec::new();
        let mut current: Option<&HandRank> = None;
        for (player_id, hand) in hands.iter() {
            if current != Some(hand) {
                winner_sets.push(Vec::new());
            }
            if let Some(tier) = winner_sets.last_mut() {
                tier.push(*player_id);
            }
            current = Some(hand);
        }
        debug!(game_id = self.game_id, ?winner_sets, "showdown rankings");

        self.assign_winners(&winner_sets)?;
        self.calc_prize()?;
        let chips_change = self.update_chips_map()?;
        self.apply_prize()?;
        self.finalize_hand(WinReason::Showdown, showdowns, chips_change, now, wait)
    }

    fn finalize_hand(
        &mut self,
        reason: WinReason,
        showdowns: BTreeMap<PlayerId, ShowdownHand>,
        chips_change: BTreeMap<PlayerId, i64>,
        now: u64,
        wait: u64,
    ) -> Result<()> {
        let pot_total: Chips = self.pots.iter().map(|p| p.amount).sum();
        let paid: Chips = self.prize_map.values().sum();
        if paid != pot_total {
            return Err(errors::internal_chip_conservation());
        }

        let winners: Vec<Winner> = self
            .prize_map
            .iter()
            .filter(|(_, &amount)| amount > 0)
            .map(|(&player_id, &amount)| {
                let seat_index = self
                    .seat_map
                    .get(&player_id)
                    .map(|s| s.seat_index)
                    .unwrap_or_default();
                Winner {
                    player_id,
                    seat_index,
                    amount,
                    hand: showdowns.get(&player_id).cloned(),
                }
            })
            .collect();
        let pots: Vec<PotAward> = self
            .pots
            .iter()
            .map(|p| PotAward {
                winners: p.winners.clone(),
                amount: p.amount,
            })
            .collect();

        let winner_info = WinnerInfo {
            reason,
            pot_total,
            winners,
            pots,
            chips_change,
        };

        for (player_id, showdown) in showdowns {
            self.hand_history.add_showdown(player_id, showdown);
        }
        self.hand_history
            .set_result(winner_info.clone(), self.total_bet_map.clone());
        self.completed_hands.push(self.hand_history.clone());
        self.winner_info = Some(winner_info);
        info!(
            game_id = self.game_id,
            hand = self.hand_number,
            pot_total,
            ?reason,
            "hand complete"
        );

        // Busted seats and chronic timeouts turn into spectators
        for seat in self.seat_map.values_mut() {
            seat.status = SeatStatus::SitOut;
            seat.ready_for_next_hand = false;
            if !seat.cashed_out
                && (seat.stack == 0 || seat.timeout_count > MAX_ACTION_TIMEOUT_COUNT)
            {
                seat.cashed_out = true;
                seat.final_stack = Some(seat.stack);
            }
        }

        self.street_bet = 0;
        self.min_raise = 0;
        self.acting_seat = None;
        self.last_aggressor = None;
        self.total_bet_map.clear();
        self.phase = Phase::WaitingForPlayers;
        self.next_hand_start = now + wait;

        if self.all_cashed_out() {
            self.finish_game();
        }
        Ok(())
    }
}
