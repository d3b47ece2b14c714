//! Betting-flow tests: heads-up play, checking down to showdown, the
//! big-blind option and action validation.


use helper::*;
use holdem_base::errors::ErrorKind;
use holdem_base::essential::{Action, GameStatus, Phase, SeatStatus, WinReason};
use holdem_base::evaluator::Category;

#[test]
fn test_heads_up_fold_through() {
    // Alice (seat 0) holds the button and posts the small blind
    let mut game = setup_game(config_blinds_1_2(), &[(ALICE, 100), (BOB, 100)]);
    game.next_deck = Some(rigged_deck(&["2H 3H", "7C 8C"], ""));
    game.start_game(T0).unwrap();

    assert_eq!(game.phase, Phase::Preflop);
    assert_eq!(game.btn, 0);
    // Heads-up the dealer acts first preflop
    assert_eq!(acting_id(&game), ALICE);

    game.handle_action(ALICE, Action::Fold, T0 + 1).unwrap();

    // Hand over without a flop; the blinds decide it
    assert_eq!(game.phase, Phase::WaitingForPlayers);
    assert_eq!(stack_of(&game, ALICE), 99);
    assert_eq!(stack_of(&game, BOB), 101);

    let info = game.winner_info.as_ref().unwrap();
    assert_eq!(info.reason, WinReason::AllFolded);
    assert_eq!(info.winners.len(), 1);
    assert_eq!(info.winners[0].player_id, BOB);
    // No cards shown when everyone folded
    assert!(info.winners[0].hand.is_none());

    let hand = game.completed_hands.last().unwrap();
    assert_eq!(hand.hand_number, 1);
    assert!(hand.board.is_empty());
}

#[test]
fn test_heads_up_big_blind_acts_first_post_flop() {
    let mut game = setup_game(config_blinds_1_2(), &[(ALICE, 100), (BOB, 100)]);
    game.next_deck = Some(rigged_deck(
        &["2H 3H", "7C 8C"],
        "AS KD 9H 4C 2S",
    ));
    game.start_game(T0).unwrap();

    game.handle_action(ALICE, Action::Call, T0 + 1).unwrap();
    assert_eq!(acting_id(&game), BOB);
    game.handle_action(BOB, Action::Check, T0 + 2).unwrap();

    assert_eq!(game.phase, Phase::Flop);
    assert_eq!(acting_id(&game), BOB);
}

#[test]
fn test_check_to_showdown() {
    let mut game = setup_game(
        config_blinds_1_2(),
        &[(ALICE, 100), (BOB, 100), (CAROL, 100)],
    );
    // Deal order is Bob (SB), Carol (BB), Alice (BTN)
    game.next_deck = Some(rigged_deck(
        &["QH JC", "8D 7C", "AH KH"],
        "AS KD 8H 9C 2C",
    ));
    game.start_game(T0).unwrap();

    // Preflop: under the gun is the button in a three-handed game
    assert_eq!(acting_id(&game), ALICE);
    game.handle_action(ALICE, Action::Call, T0 + 1).unwrap();
    game.handle_action(BOB, Action::Call, T0 + 2).unwrap();
    game.handle_action(CAROL, Action::Check, T0 + 3).unwrap();

    for phase in [Phase::Flop, Phase::Turn, Phase::River] {
        assert_eq!(game.phase, phase);
        game.handle_action(BOB, Action::Check, T0 + 4).unwrap();
        game.handle_action(CAROL, Action::Check, T0 + 5).unwrap();
        game.handle_action(ALICE, Action::Check, T0 + 6).unwrap();
    }

    // Alice's aces and kings take the 6-chip pot
    assert_eq!(game.phase, Phase::WaitingForPlayers);
    assert_eq!(stack_of(&game, ALICE), 104);
    assert_eq!(stack_of(&game, BOB), 98);
    assert_eq!(stack_of(&game, CAROL), 98);

    let info = game.winner_info.as_ref().unwrap();
    assert_eq!(info.reason, WinReason::Showdown);
    assert_eq!(info.pot_total, 6);
    assert_eq!(info.winners.len(), 1);
    let winner = &info.winners[0];
    assert_eq!(winner.player_id, ALICE);
    assert_eq!(winner.amount, 6);
    assert_eq!(winner.hand.as_ref().unwrap().category, Category::TwoPair);

    let hand = game.completed_hands.last().unwrap();
    assert_eq!(hand.board.len(), 5);
    assert!(hand.showdowns.contains_key(&ALICE));
}

#[test]
fn test_big_blind_option_check_closes_round() {
    let mut game = setup_game(
        config_blinds_1_2(),
        &[(ALICE, 100), (BOB, 100), (CAROL, 100)],
    );
    game.next_deck = Some(rigged_deck(
        &["2H 3H", "7C 8C", "JD QD"],
        "AS KD 9H 4C 2S",
    ));
    game.start_game(T0).unwrap();

    game.handle_action(ALICE, Action::Call, T0 + 1).unwrap();
    game.handle_action(BOB, Action::Call, T0 + 2).unwrap();

    // Everyone matched the big blind, but Carol still gets her option
    assert_eq!(acting_id(&game), CAROL);
    assert!(game.acting_seat.unwrap().can_raise);
    game.handle_action(CAROL, Action::Check, T0 + 3).unwrap();

    assert_eq!(game.phase, Phase::Flop);
    assert_eq!(game.pot(), 6);
}

#[test]
fn test_big_blind_option_raise_reopens_round() {
    let mut game = setup_game(
        config_blinds_1_2(),
        &[(ALICE, 100), (BOB, 100), (CAROL, 100)],
    );
    game.next_deck = Some(rigged_deck(
        &["2H 3H", "7C 8C", "JD QD"],
        "AS KD 9H 4C 2S",
    ));
    game.start_game(T0).unwrap();

    game.handle_action(ALICE, Action::Call, T0 + 1).unwrap();
    game.handle_action(BOB, Action::Call, T0 + 2).unwrap();
    game.handle_action(CAROL, Action::Raise(6), T0 + 3).unwrap();

    // Still preflop, Carol is the aggressor and Alice owes action again
    assert_eq!(game.phase, Phase::Preflop);
    assert_eq!(game.street_bet, 6);
    assert_eq!(game.last_aggressor, Some(CAROL));
    assert_eq!(acting_id(&game), ALICE);
    assert!(game.acting_seat.unwrap().can_raise);

    game.handle_action(ALICE, Action::Call, T0 + 4).unwrap();
    game.handle_action(BOB, Action::Fold, T0 + 5).unwrap();
    assert_eq!(game.phase, Phase::Flop);
    assert_eq!(game.pot(), 14);
}

#[test]
fn test_action_validation() {
    let mut game = setup_game(
        config_blinds_1_2(),
        &[(ALICE, 100), (BOB, 100), (CAROL, 100)],
    );
    game.next_deck = Some(rigged_deck(
        &["2H 3H", "7C 8C", "JD QD"],
        "AS KD 9H 4C 2S",
    ));
    game.start_game(T0).unwrap();

    // Bob is not up yet
    let err = game.handle_action(BOB, Action::Check, T0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotYourTurn);

    // Alice faces the big blind: no check, no fresh bet
    let err = game.handle_action(ALICE, Action::Check, T0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CheckWhenFacingBet);
    let err = game.handle_action(ALICE, Action::Bet(10), T0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidAction);

    // A raise to 3 is below the minimum of one full big blind on top
    let err = game.handle_action(ALICE, Action::Raise(3), T0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::RaiseBelowMin);
    let err = game
        .handle_action(ALICE, Action::Raise(500), T0)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InsufficientStack);

    game.handle_action(ALICE, Action::Call, T0 + 1).unwrap();
    game.handle_action(BOB, Action::Call, T0 + 2).unwrap();
    game.handle_action(CAROL, Action::Check, T0 + 3).unwrap();

    // Postflop there is nothing to call or raise yet
    let err = game.handle_action(BOB, Action::Call, T0 + 4).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidAction);
    let err = game.handle_action(BOB, Action::Raise(4), T0 + 4).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidAction);
    let err = game.handle_action(BOB, Action::Bet(1), T0 + 4).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BetBelowMin);

    game.handle_action(BOB, Action::Bet(4), T0 + 5).unwrap();
    assert_eq!(game.street_bet, 4);
    assert_eq!(game.last_aggressor, Some(BOB));
}

#[test]
fn test_action_timeout_checks_or_folds() {
    let mut game = setup_game(
        config_blinds_1_2(),
        &[(ALICE, 100), (BOB, 100), (CAROL, 100)],
    );
    game.next_deck = Some(rigged_deck(
        &["2H 3H", "7C 8C", "JD QD"],
        "AS KD 9H 4C 2S",
    ));
    game.start_game(T0).unwrap();

    // Alice faces the blind: her timeout folds her
    game.on_action_timeout(ALICE, T0 + 1).unwrap();
    assert_eq!(
        game.seat_map.get(&ALICE).unwrap().status,
        SeatStatus::Fold
    );
    assert_eq!(game.seat_map.get(&ALICE).unwrap().timeout_count, 1);

    game.handle_action(BOB, Action::Call, T0 + 2).unwrap();
    // Carol has matched the bet: her timeout checks her option away
    game.on_action_timeout(CAROL, T0 + 3).unwrap();
    assert_eq!(game.phase, Phase::Flop);
    assert_eq!(game.status, GameStatus::Playing);
}

#[test]
fn test_start_game_preconditions() {
    let mut game = setup_game(config_blinds_1_2(), &[(ALICE, 100)]);
    let err = game.start_game(T0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GameNotWaiting);

    game.add_player(BOB, 100).unwrap();
    let err = game.add_player(BOB, 100).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidAction);
    let err = game.add_player(CAROL, 5).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BuyInOutOfRange);

    game.start_game(T0).unwrap();
    let err = game.start_game(T0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GameNotWaiting);
}

#[test]
fn test_table_fills_up() {
    let mut config = config_blinds_1_2();
    config.max_seats = 2;
    let mut game = setup_game(config, &[(ALICE, 100), (BOB, 100)]);
    let err = game.add_player(CAROL, 100).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TableFull);
}
