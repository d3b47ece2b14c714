//! End-to-end coordinator tests: command routing, broadcast ordering, card
//! privacy, summary delivery and persistence.

use std::sync::Arc;

use tokio::sync::mpsc;

use holdem_base::errors::ErrorKind;
use holdem_base::essential::{Action, GameStatus, Phase, PlayerId, TableConfig};
use holdem_server::broadcast::{CloseCode, Envelope};
use holdem_server::lobby::Lobby;
use holdem_server::store::{MemStore, Store};

const P1: PlayerId = 1;
const P2: PlayerId = 2;
const P3: PlayerId = 3;

fn test_config() -> TableConfig {
    TableConfig {
        name: "cash-10-20".into(),
        max_seats: 6,
        small_blind: 10,
        big_blind: 20,
        min_buy_in: 200,
        max_buy_in: 1000,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        out.push(envelope);
    }
    out
}

async fn setup_three_player_game(
    lobby: &Lobby<MemStore>,
) -> (u64, holdem_server::ingress::TableHandle) {
    for player in [P1, P2, P3] {
        lobby.deposit(player, 1000);
    }
    let table_id = lobby.create_table(test_config()).unwrap();
    for player in [P1, P2, P3] {
        lobby.join_table(table_id, player, 500).await.unwrap();
    }
    let handle = lobby.handle(table_id).unwrap();
    (table_id, handle)
}

#[tokio::test]
async fn test_full_session_flow() {
    let store = Arc::new(MemStore::new());
    let lobby = Lobby::new(Arc::clone(&store));
    let (game_id, handle) = setup_three_player_game(&lobby).await;

    // Subscribers get the current snapshot as their first message
    let mut rxs = Vec::new();
    for player in [P1, P2, P3] {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.subscribe(Some(player), tx).await.unwrap();
        let first = rx.recv().await.unwrap();
        match first {
            Envelope::GameUpdate(snap) => {
                assert_eq!(snap.status, GameStatus::Waiting);
                assert_eq!(snap.game_id, game_id);
            }
            other => panic!("expected snapshot first, got {other:?}"),
        }
        rxs.push(rx);
    }

    handle.start(P1).await.unwrap();

    // Hand 1: folded to the big blind
    handle.act(P1, Action::Fold).await.unwrap();
    handle.act(P2, Action::Fold).await.unwrap();
    let snap = handle.snapshot(None).await.unwrap();
    assert_eq!(snap.phase, Phase::WaitingForPlayers);
    assert_eq!(snap.hand_number, 1);

    // Hand 2 starts once the last seat readies up
    for player in [P1, P2, P3] {
        handle.ready(player).await.unwrap();
    }
    let snap = handle.snapshot(None).await.unwrap();
    assert_eq!(snap.hand_number, 2);
    assert_eq!(snap.dealer_seat, 1);
    handle.act(P2, Action::Fold).await.unwrap();
    handle.act(P3, Action::Fold).await.unwrap();

    // Everyone cashes out; the summary fires exactly once per subscriber
    for player in [P1, P2, P3] {
        handle.cash_out(player).await.unwrap();
    }
    let snap = handle.snapshot(None).await.unwrap();
    assert_eq!(snap.status, GameStatus::Finished);

    let summary = snap.summary.unwrap();
    let win_loss: Vec<i64> = summary.results.iter().map(|r| r.win_loss).collect();
    assert_eq!(win_loss, vec![10, 0, -10]);
    assert_eq!(summary.results[0].player_id, P1);

    for rx in rxs.iter_mut() {
        let messages = drain(rx);
        let summaries = messages
            .iter()
            .filter(|m| matches!(m, Envelope::GameSummaryNotification(_)))
            .count();
        assert_eq!(summaries, 1);
    }

    // Leaving credits the final stack back to the bankroll
    let released = lobby.leave_table(game_id, P1).await.unwrap();
    assert_eq!(released, 510);
    assert_eq!(lobby.balance(P1), 1010);
}

#[tokio::test]
async fn test_hand_histories_newest_first_and_persisted() {
    let store = Arc::new(MemStore::new());
    let lobby = Lobby::new(Arc::clone(&store));
    let (game_id, handle) = setup_three_player_game(&lobby).await;

    handle.start(P1).await.unwrap();
    handle.act(P1, Action::Fold).await.unwrap();
    handle.act(P2, Action::Fold).await.unwrap();
    for player in [P1, P2, P3] {
        handle.ready(player).await.unwrap();
    }
    handle.act(P2, Action::Fold).await.unwrap();
    handle.act(P3, Action::Fold).await.unwrap();

    let hands = handle.hand_histories().await.unwrap();
    assert_eq!(hands.len(), 2);
    assert_eq!(hands[0].hand_number, 2);
    assert_eq!(hands[1].hand_number, 1);

    // The store carries the same records plus the appended action log
    let stored = store.hand_histories(game_id).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].hand_number, 2);
    let log = store.actions(game_id).unwrap();
    assert_eq!(log.len(), 4);
    assert!(log.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    let row = store.load_game(game_id).unwrap().unwrap();
    assert_eq!(row.hand_number, 2);

    // Seat rows land under their own keys, not just inside the game row
    assert_eq!(store.seats(game_id).unwrap().len(), 3);
    let seat = store.load_seat(game_id, 0).unwrap().unwrap();
    assert_eq!(seat.player_id, P1);
    let seat = store.load_seat_by_player(game_id, P3).unwrap().unwrap();
    assert_eq!(seat.seat_index, 2);
}

#[tokio::test]
async fn test_subscription_close_codes() {
    let store = Arc::new(MemStore::new());
    let lobby = Lobby::new(store);
    lobby.deposit(P1, 1000);
    let table_id = lobby.create_table(test_config()).unwrap();
    lobby.join_table(table_id, P1, 500).await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = lobby.subscribe(999, Some(P1), tx).await.unwrap_err();
    assert_eq!(err, CloseCode::NotFound);
    assert_eq!(err.as_u16(), 4004);

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = lobby.subscribe(table_id, None, tx).await.unwrap_err();
    assert_eq!(err, CloseCode::AuthFailed);
    assert_eq!(err.as_u16(), 4001);

    // P2 never joined this table
    let (tx, _rx) = mpsc::unbounded_channel();
    let err = lobby.subscribe(table_id, Some(P2), tx).await.unwrap_err();
    assert_eq!(err, CloseCode::Forbidden);
    assert_eq!(err.as_u16(), 4003);
}

#[tokio::test]
async fn test_hole_cards_masked_until_showdown() {
    let store = Arc::new(MemStore::new());
    let lobby = Lobby::new(store);
    for player in [P1, P2] {
        lobby.deposit(player, 1000);
    }
    let table_id = lobby.create_table(test_config()).unwrap();
    for player in [P1, P2] {
        lobby.join_table(table_id, player, 500).await.unwrap();
    }
    let handle = lobby.handle(table_id).unwrap();
    handle.start(P1).await.unwrap();

    // Mid-hand every viewer sees only their own cards
    let snap = handle.snapshot(Some(P1)).await.unwrap();
    for seat in &snap.seats {
        if seat.player_id == P1 {
            assert_eq!(seat.hole_cards.len(), 2);
        } else {
            assert!(seat.hole_cards.is_empty());
        }
    }
    // An anonymous read sees no cards at all
    let snap = handle.snapshot(None).await.unwrap();
    assert!(snap.seats.iter().all(|s| s.hole_cards.is_empty()));

    // Check the hand down to a showdown
    handle.act(P1, Action::Call).await.unwrap();
    handle.act(P2, Action::Check).await.unwrap();
    for _ in 0..3 {
        handle.act(P2, Action::Check).await.unwrap();
        handle.act(P1, Action::Check).await.unwrap();
    }
    let snap = handle.snapshot(Some(P1)).await.unwrap();
    assert_eq!(snap.phase, Phase::WaitingForPlayers);
    assert!(snap.winner_info.is_some());
    // Both seats showed down, so both hands are open now
    for seat in &snap.seats {
        assert_eq!(seat.hole_cards.len(), 2, "seat {} hidden", seat.seat_index);
    }
}

#[tokio::test]
async fn test_single_writer_rejects_the_loser() {
    let store = Arc::new(MemStore::new());
    let lobby = Lobby::new(Arc::clone(&store));
    for player in [P1, P2] {
        lobby.deposit(player, 1000);
    }
    let table_id = lobby.create_table(test_config()).unwrap();
    for player in [P1, P2] {
        lobby.join_table(table_id, player, 500).await.unwrap();
    }
    let handle = lobby.handle(table_id).unwrap();
    handle.start(P1).await.unwrap();

    // Both seats race a fold; the mailbox serializes them and exactly one
    // lands in the hand
    let (a, b) = tokio::join!(handle.act(P1, Action::Fold), handle.act(P2, Action::Fold));
    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one racer may win"
    );
    let log = store.actions(table_id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].seq, 1);
}

#[tokio::test]
async fn test_join_preconditions() {
    let store = Arc::new(MemStore::new());
    let lobby = Lobby::new(store);
    lobby.deposit(P1, 300);
    let table_id = lobby.create_table(test_config()).unwrap();

    // Bankroll below the requested buy-in
    let err = lobby.join_table(table_id, P1, 500).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InsufficientStack);
    assert_eq!(lobby.balance(P1), 300);

    // Buy-in below the table minimum; the debit rolls back
    let err = lobby.join_table(table_id, P1, 100).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::BuyInOutOfRange);
    assert_eq!(lobby.balance(P1), 300);

    lobby.join_table(table_id, P1, 250).await.unwrap();
    assert_eq!(lobby.balance(P1), 50);

    let err = lobby.handle(999).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GameNotFound);
}

#[tokio::test]
async fn test_remove_table_lifecycle() {
    let store = Arc::new(MemStore::new());
    let lobby = Lobby::new(store);
    lobby.deposit(P1, 1000);
    let table_id = lobby.create_table(test_config()).unwrap();
    lobby.join_table(table_id, P1, 500).await.unwrap();

    // Occupied tables stay
    assert!(!lobby.remove_table(table_id).await.unwrap());

    let handle = lobby.handle(table_id).unwrap();
    handle.cash_out(P1).await.unwrap();
    lobby.leave_table(table_id, P1).await.unwrap();
    assert!(lobby.remove_table(table_id).await.unwrap());
    assert!(lobby.handle(table_id).is_err());
}
