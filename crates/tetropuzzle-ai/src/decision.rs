//! Asynchronous decisions: every seat runs its [`Player`] on a worker thread.
//!
//! The driver sends a request with a [`GameSnapshot`] and waits for the answer
//! with a timeout. When an action request times out its [`CancelToken`] is set
//! and the driver falls back to [`default_action`]. Reward choices are not
//! cancellable; a timed out choice only falls back. Late answers are dropped.

use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tetropuzzle_engine::{Action, GameSnapshot, TetrominoShape};

use crate::player::{CancelToken, Player, default_action};

/// How a decision request ended.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::IsVariant)]
pub enum DecisionOutcome<T> {
    Decided(T),
    /// The timeout expired before the answer arrived.
    Cancelled,
    /// The worker thread is gone, e.g. because the player panicked.
    Disconnected,
}

impl<T> DecisionOutcome<T> {
    pub fn unwrap_or_else(self, default: impl FnOnce() -> T) -> T {
        match self {
            Self::Decided(value) => value,
            Self::Cancelled | Self::Disconnected => default(),
        }
    }
}

#[derive(Debug)]
enum Request {
    Action {
        seq: u64,
        snapshot: GameSnapshot,
        cancel: CancelToken,
    },
    Reward {
        seq: u64,
        snapshot: GameSnapshot,
        options: Vec<TetrominoShape>,
    },
}

#[derive(Debug)]
enum Response {
    Action(Action),
    Reward(TetrominoShape),
}

/// A player running on its own worker thread.
#[derive(Debug)]
pub struct PlayerSeat {
    tx: Option<mpsc::Sender<Request>>,
    rx: mpsc::Receiver<(u64, Response)>,
    next_seq: u64,
    timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl PlayerSeat {
    /// Starts the worker thread for `player`. Each decision may take up to `timeout`.
    pub fn spawn(player: impl Player + 'static, timeout: Duration) -> Self {
        let (tx_request, rx_request) = mpsc::channel();
        let (tx_response, rx_response) = mpsc::channel();
        let handle = thread::spawn(move || player_thread(player, &rx_request, &tx_response));
        Self {
            tx: Some(tx_request),
            rx: rx_response,
            next_seq: 0,
            timeout,
            handle: Some(handle),
        }
    }

    /// Asks the player for its next action.
    pub fn decide_action(&mut self, snapshot: GameSnapshot) -> DecisionOutcome<Action> {
        let cancel = CancelToken::new();
        let seq = self.next_seq();
        let request = Request::Action {
            seq,
            snapshot,
            cancel: cancel.clone(),
        };
        let outcome = self.request(seq, request);
        if outcome.is_cancelled() {
            cancel.cancel();
        }
        match outcome {
            DecisionOutcome::Decided(Response::Action(action)) => DecisionOutcome::Decided(action),
            DecisionOutcome::Decided(Response::Reward(_)) | DecisionOutcome::Disconnected => {
                DecisionOutcome::Disconnected
            }
            DecisionOutcome::Cancelled => DecisionOutcome::Cancelled,
        }
    }

    /// Asks the player to choose one of `options` as a reward.
    pub fn decide_reward(
        &mut self,
        snapshot: GameSnapshot,
        options: &[TetrominoShape],
    ) -> DecisionOutcome<TetrominoShape> {
        let seq = self.next_seq();
        let request = Request::Reward {
            seq,
            snapshot,
            options: options.to_vec(),
        };
        match self.request(seq, request) {
            DecisionOutcome::Decided(Response::Reward(shape)) if options.contains(&shape) => {
                DecisionOutcome::Decided(shape)
            }
            DecisionOutcome::Cancelled => DecisionOutcome::Cancelled,
            DecisionOutcome::Decided(_) | DecisionOutcome::Disconnected => {
                DecisionOutcome::Disconnected
            }
        }
    }

    /// Like [`Self::decide_action`], but substitutes the default action of the
    /// current phase when no decision arrives.
    pub fn action_or_default(&mut self, snapshot: GameSnapshot) -> Action {
        let phase = snapshot.turn.phase;
        let player = snapshot.current_player;
        let outcome = self.decide_action(snapshot);
        if !outcome.is_decided() {
            tracing::warn!(%player, ?outcome, "no decision, using default action");
        }
        outcome.unwrap_or_else(|| default_action(phase))
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn request(&mut self, seq: u64, request: Request) -> DecisionOutcome<Response> {
        let Some(tx) = &self.tx else {
            return DecisionOutcome::Disconnected;
        };
        if tx.send(request).is_err() {
            return DecisionOutcome::Disconnected;
        }
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok((response_seq, response)) if response_seq == seq => {
                    return DecisionOutcome::Decided(response);
                }
                // Answer to a request that already timed out
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => return DecisionOutcome::Cancelled,
                Err(RecvTimeoutError::Disconnected) => return DecisionOutcome::Disconnected,
            }
        }
    }
}

impl Drop for PlayerSeat {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.tx = None;
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("player thread panicked");
        }
    }
}

fn player_thread(
    mut player: impl Player,
    rx: &mpsc::Receiver<Request>,
    tx: &mpsc::Sender<(u64, Response)>,
) {
    while let Ok(request) = rx.recv() {
        let (seq, response) = match request {
            Request::Action {
                seq,
                snapshot,
                cancel,
            } => (
                seq,
                Response::Action(player.choose_action(&snapshot, &cancel)),
            ),
            Request::Reward {
                seq,
                snapshot,
                options,
            } => (
                seq,
                Response::Reward(player.choose_reward(&snapshot, &options)),
            ),
        };
        if tx.send((seq, response)).is_err() {
            return;
        }
    }
}
