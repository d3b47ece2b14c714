//! Commands sent to a table actor and the handle that sends them.
//!
//! Every command carries a oneshot for its reply.  The mailbox is bounded:
//! a full queue rejects with `TABLE_BUSY` instead of building unbounded
//! backlog, and a closed mailbox (table torn down) reads as
//! `GAME_NOT_FOUND`.

use tokio::sync::{mpsc, oneshot};

use holdem_base::errors::{self, Result};
use holdem_base::essential::{Action, Chips, GameId, PlayerId};
use holdem_base::hand_history::HandHistory;

use crate::broadcast::{CloseCode, Envelope};
use crate::snapshot::GameSnapshot;

/// Commands processed by the table actor, one at a time.
pub enum Command {
    Join {
        player_id: PlayerId,
        buy_in: Chips,
        resp: oneshot::Sender<Result<u8>>,
    },
    Start {
        player_id: PlayerId,
        resp: oneshot::Sender<Result<()>>,
    },
    Act {
        player_id: PlayerId,
        action: Action,
        resp: oneshot::Sender<Result<()>>,
    },
    Ready {
        player_id: PlayerId,
        resp: oneshot::Sender<Result<()>>,
    },
    CashOut {
        player_id: PlayerId,
        resp: oneshot::Sender<Result<()>>,
    },
    BuyBackIn {
        player_id: PlayerId,
        amount: Chips,
        resp: oneshot::Sender<Result<()>>,
    },
    Leave {
        player_id: PlayerId,
        resp: oneshot::Sender<Result<Chips>>,
    },
    Subscribe {
        identity: Option<PlayerId>,
        tx: mpsc::UnboundedSender<Envelope>,
        resp: oneshot::Sender<std::result::Result<(), CloseCode>>,
    },
    Snapshot {
        viewer: Option<PlayerId>,
        resp: oneshot::Sender<GameSnapshot>,
    },
    /// Completed hands, newest first.
    HandHistories {
        resp: oneshot::Sender<Vec<HandHistory>>,
    },
}

/// Cheap, cloneable address of one table actor.
#[derive(Clone, Debug)]
pub struct TableHandle {
    game_id: GameId,
    tx: mpsc::Sender<Command>,
}

impl TableHandle {
    pub(crate) fn new(game_id: GameId, tx: mpsc::Sender<Command>) -> Self {
        Self { game_id, tx }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    fn submit(&self, command: Command) -> Result<()> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => errors::table_busy(),
            mpsc::error::TrySendError::Closed(_) => errors::game_not_found(),
        })
    }

    async fn roundtrip<T>(&self, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        rx.await.map_err(|_| errors::game_not_found())?
    }

    pub async fn join(&self, player_id: PlayerId, buy_in: Chips) -> Result<u8> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::Join {
            player_id,
            buy_in,
            resp,
        })?;
        self.roundtrip(rx).await
    }

    pub async fn start(&self, player_id: PlayerId) -> Result<()> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::Start { player_id, resp })?;
        self.roundtrip(rx).await
    }

    pub async fn act(&self, player_id: PlayerId, action: Action) -> Result<()> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::Act {
            player_id,
            action,
            resp,
        })?;
        self.roundtrip(rx).await
    }

    pub async fn ready(&self, player_id: PlayerId) -> Result<()> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::Ready { player_id, resp })?;
        self.roundtrip(rx).await
    }

    pub async fn cash_out(&self, player_id: PlayerId) -> Result<()> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::CashOut { player_id, resp })?;
        self.roundtrip(rx).await
    }

    pub async fn buy_back_in(&self, player_id: PlayerId, amount: Chips) -> Result<()> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::BuyBackIn {
            player_id,
            amount,
            resp,
        })?;
        self.roundtrip(rx).await
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<Chips> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::Leave { player_id, resp })?;
        self.roundtrip(rx).await
    }

    pub async fn subscribe(
        &self,
        identity: Option<PlayerId>,
        tx: mpsc::UnboundedSender<Envelope>,
    ) -> std::result::Result<(), CloseCode> {
        let (resp, rx) = oneshot::channel();
        if self
            .submit(Command::Subscribe { identity, tx, resp })
            .is_err()
        {
            return Err(CloseCode::NotFound);
        }
        rx.await.map_err(|_| CloseCode::NotFound)?
    }

    pub async fn snapshot(&self, viewer: Option<PlayerId>) -> Result<GameSnapshot> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::Snapshot { viewer, resp })?;
        rx.await.map_err(|_| errors::game_not_found())
    }

    pub async fn hand_histories(&self) -> Result<Vec<HandHistory>> {
        let (resp, rx) = oneshot::channel();
        self.submit(Command::HandHistories { resp })?;
        rx.await.map_err(|_| errors::game_not_found())
    }
}
