use std::{collections::VecDeque, fmt};

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
    seq::SliceRandom as _,
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{
    IdAllocator, Puzzle, PuzzleColor, PuzzleDefinition, PuzzleId, ShapeCounts, ShapeList,
    TetrominoShape,
};

use super::{
    action::Action,
    event::{GameEvent, GameObserver},
    player_state::{PlayerId, PlayerState},
    process::{ActionProcessor, FinishedPuzzle, InvariantViolation, ProcessOutcome, RewardGrant},
    shared_state::SharedState,
    turn::{GamePhase, Signal, TurnChange, TurnInfo, TurnManager},
    verify::{ActionVerifier, VerificationFailure},
};

/// Maximum number of players in one game.
pub const MAX_PLAYERS: usize = 4;

/// Seed for deterministic deck shuffling.
///
/// A 128-bit seed serialized as 32 hex digits. Two games set up from the same
/// seed and the same puzzle definitions deal the same decks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSeed([u8; 16]);

impl GameSeed {
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

impl fmt::Display for GameSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", u128::from_be_bytes(self.0))
    }
}

impl Serialize for GameSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GameSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 32 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u128::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self::from_u128(num))
    }
}

impl Distribution<GameSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> GameSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        GameSeed(seed)
    }
}

/// Game setup options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of pieces of each shape in the reserve at the start.
    pub initial_tetromino_count: u32,
    /// Pieces every player receives from the reserve before the first turn.
    pub starting_tetrominoes: Vec<TetrominoShape>,
    /// Number of white puzzles dealt into the game; `None` uses all of them.
    pub num_white_puzzles: Option<usize>,
    /// Number of black puzzles dealt into the game; `None` uses all of them.
    pub num_black_puzzles: Option<usize>,
    /// Seed for shuffling the decks; a random seed is drawn when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<GameSeed>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_tetromino_count: 15,
            starting_tetrominoes: vec![TetrominoShape::O1, TetrominoShape::I2],
            num_white_puzzles: None,
            num_black_puzzles: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SetupError {
    #[display("a game needs 1 to {MAX_PLAYERS} players, got {num_players}")]
    InvalidPlayerCount { num_players: usize },
    #[display("the reserve has not enough {shape} for the starting tetrominoes")]
    ReserveTooSmall { shape: TetrominoShape },
}

/// Error returned by [`Game::apply`] and [`Game::grant_reward`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ActionError {
    /// The action breaks a rule; the state is unchanged.
    #[display("action rejected: {_0}")]
    Rejected(VerificationFailure),
    /// The state is corrupted; the game cannot continue.
    #[display("invariant violated: {_0}")]
    Invariant(InvariantViolation),
    #[display("no reward is waiting to be chosen")]
    NoRewardPending,
    #[display("{shape} is not offered as reward")]
    RewardNotOffered { shape: TetrominoShape },
}

/// A finished puzzle whose reward shape the player still has to choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingReward {
    pub player: PlayerId,
    pub puzzle_id: PuzzleId,
    pub reward_shape: TetrominoShape,
}

impl PendingReward {
    /// Shapes that can be chosen with the current reserve.
    #[must_use]
    pub fn options(&self, reserve: &ShapeCounts) -> ShapeList {
        self.reward_shape.reward_options(reserve)
    }
}

/// Result of a successfully applied action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub signals: Vec<Signal>,
    pub finished_puzzles: Vec<FinishedPuzzle>,
    /// The reward choice the current player has to make before acting again.
    pub pending_reward: Option<(PendingReward, ShapeList)>,
    #[serde(skip)]
    pub turn_change: TurnChange,
}

/// Read-only copy of the whole game state handed to decision providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub shared: SharedState,
    pub players: Vec<PlayerState>,
    pub turn: TurnInfo,
    pub current_player: PlayerId,
}

impl GameSnapshot {
    #[must_use]
    pub fn current_player_state(&self) -> &PlayerState {
        &self.players[self.current_player.index()]
    }

    /// Checks `action` for the current player without a pending reward.
    pub fn verify(&self, action: &Action) -> Result<(), VerificationFailure> {
        ActionVerifier::new(&self.shared, self.current_player_state(), &self.turn).verify(action)
    }
}

/// Final placing of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerResult {
    pub player: PlayerId,
    /// 1-based; players with equal score, finished puzzles and tetrominoes share a rank.
    pub rank: usize,
    pub score: i32,
    pub finished_puzzles: usize,
    pub tetrominoes: u32,
}

/// A running game: state, turn order and the pending reward queue.
///
/// All mutations go through [`Game::apply`] and [`Game::grant_reward`], which
/// verify before they process.
pub struct Game {
    shared: SharedState,
    players: Vec<PlayerState>,
    turns: TurnManager,
    pending_rewards: VecDeque<PendingReward>,
    deferred_slot: Option<bool>,
    observers: Vec<Box<dyn GameObserver>>,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("shared", &self.shared)
            .field("players", &self.players)
            .field("turns", &self.turns)
            .field("pending_rewards", &self.pending_rewards)
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Sets up a game: shuffles and deals the decks, fills the rows and hands out
    /// the starting tetrominoes.
    ///
    /// Puzzle ids are allocated from `ids` in deck order, white deck first.
    pub fn new(
        config: &GameConfig,
        num_players: usize,
        definitions: impl IntoIterator<Item = PuzzleDefinition>,
        ids: &mut IdAllocator,
    ) -> Result<Self, SetupError> {
        if !(1..=MAX_PLAYERS).contains(&num_players) {
            return Err(SetupError::InvalidPlayerCount { num_players });
        }

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        tracing::debug!(%seed, num_players, "setting up game");
        let mut rng = Pcg32::from_seed(seed.0);

        let (mut white, mut black): (Vec<_>, Vec<_>) = definitions
            .into_iter()
            .partition(|definition| definition.color == PuzzleColor::White);
        white.shuffle(&mut rng);
        black.shuffle(&mut rng);
        white.truncate(config.num_white_puzzles.unwrap_or(usize::MAX));
        black.truncate(config.num_black_puzzles.unwrap_or(usize::MAX));
        let white: Vec<_> = white
            .iter()
            .map(|definition| Puzzle::new(ids.allocate(), definition))
            .collect();
        let black: Vec<_> = black
            .iter()
            .map(|definition| Puzzle::new(ids.allocate(), definition))
            .collect();

        let mut shared = SharedState::new(
            ShapeCounts::splat(config.initial_tetromino_count),
            white,
            black,
        );
        let mut players = Vec::with_capacity(num_players);
        for index in 0..num_players {
            let mut player = PlayerState::new(PlayerId::new(index));
            for &shape in &config.starting_tetrominoes {
                if !shared.take_tetromino(shape) {
                    return Err(SetupError::ReserveTooSmall { shape });
                }
                player.add_tetromino(shape);
            }
            players.push(player);
        }

        let mut turns = TurnManager::new(num_players);
        if shared.is_deck_empty(PuzzleColor::Black) {
            turns.receive_signal(Signal::BlackDeckEmpty);
        }

        Ok(Self {
            shared,
            players,
            turns,
            pending_rewards: VecDeque::new(),
            deferred_slot: None,
            observers: Vec::new(),
        })
    }

    /// Registers an observer that receives every event from now on.
    pub fn subscribe(&mut self, observer: impl GameObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    #[must_use]
    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    #[must_use]
    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    #[must_use]
    pub fn current_player(&self) -> PlayerId {
        self.turns.current_player()
    }

    #[must_use]
    pub fn turn_info(&self) -> &TurnInfo {
        self.turns.turn_info()
    }

    #[must_use]
    pub fn phase(&self) -> GamePhase {
        self.turns.phase()
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.phase().is_ended()
    }

    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            shared: self.shared.clone(),
            players: self.players.clone(),
            turn: *self.turns.turn_info(),
            current_player: self.current_player(),
        }
    }

    /// The reward choice that blocks the game, with the shapes currently offered.
    #[must_use]
    pub fn pending_reward(&self) -> Option<(PendingReward, ShapeList)> {
        self.pending_rewards
            .front()
            .map(|pending| (*pending, pending.options(self.shared.reserve())))
    }

    /// Checks `action` for the current player.
    pub fn verify(&self, action: &Action) -> Result<(), VerificationFailure> {
        if self.phase().is_ended() {
            return Err(VerificationFailure::GameEnded);
        }
        if !self.pending_rewards.is_empty() {
            return Err(VerificationFailure::RewardChoicePending);
        }
        let player = &self.players[self.current_player().index()];
        ActionVerifier::new(&self.shared, player, self.turns.turn_info()).verify(action)
    }

    /// Verifies and applies an action of the current player.
    pub fn apply(&mut self, action: &Action) -> Result<ActionOutcome, ActionError> {
        self.verify(action).map_err(ActionError::Rejected)?;

        let phase = self.phase();
        let current = self.turns.current_player();
        let player = &mut self.players[current.index()];
        let ProcessOutcome {
            signals,
            finished_puzzles,
            events,
        } = ActionProcessor::new(&mut self.shared, player, phase)
            .process(action)
            .map_err(ActionError::Invariant)?;
        self.notify(&events);

        let mut outcome = ActionOutcome::default();
        for &signal in &signals {
            let change = self.turns.receive_signal(signal);
            self.merge_turn_change(&mut outcome.turn_change, change);
        }
        for finished in &finished_puzzles {
            if matches!(finished.reward, RewardGrant::Pending { .. }) {
                self.pending_rewards.push_back(PendingReward {
                    player: current,
                    puzzle_id: finished.puzzle_id,
                    reward_shape: finished.reward_shape,
                });
            }
        }
        outcome.signals = signals;
        outcome.finished_puzzles = finished_puzzles;

        self.deferred_slot = Some(action.consumes_slot());
        self.settle(&mut outcome)?;
        Ok(outcome)
    }

    /// Resolves the first pending reward with the chosen shape.
    pub fn grant_reward(&mut self, shape: TetrominoShape) -> Result<ActionOutcome, ActionError> {
        let (pending, options) = self.pending_reward().ok_or(ActionError::NoRewardPending)?;
        if !options.contains(&shape) {
            return Err(ActionError::RewardNotOffered { shape });
        }
        self.pending_rewards.pop_front();
        self.grant(pending, shape)?;

        let mut outcome = ActionOutcome::default();
        self.settle(&mut outcome)?;
        Ok(outcome)
    }

    fn grant(&mut self, pending: PendingReward, shape: TetrominoShape) -> Result<(), ActionError> {
        tracing::debug!(player = %pending.player, puzzle_id = %pending.puzzle_id, %shape, "granting reward");
        let phase = self.phase();
        let player = &mut self.players[pending.player.index()];
        let ProcessOutcome { events, .. } = ActionProcessor::new(&mut self.shared, player, phase)
            .grant_reward(shape)
            .map_err(ActionError::Invariant)?;
        self.notify(&events);
        Ok(())
    }

    /// Resolves rewards that need no choice and completes the action once no
    /// reward is pending.
    fn settle(&mut self, outcome: &mut ActionOutcome) -> Result<(), ActionError> {
        while let Some((pending, options)) = self.pending_reward() {
            match options.as_slice() {
                [] => {
                    self.pending_rewards.pop_front();
                }
                [shape] => {
                    let shape = *shape;
                    self.pending_rewards.pop_front();
                    self.grant(pending, shape)?;
                }
                _ => {
                    outcome.pending_reward = Some((pending, options));
                    return Ok(());
                }
            }
        }
        if let Some(consumes_slot) = self.deferred_slot.take() {
            let change = self.turns.complete_action(consumes_slot);
            self.merge_turn_change(&mut outcome.turn_change, change);
        }
        Ok(())
    }

    fn merge_turn_change(&mut self, merged: &mut TurnChange, change: TurnChange) {
        if let Some(phase) = change.new_phase {
            merged.new_phase = Some(phase);
            self.notify(&[GameEvent::PhaseChanged { phase }]);
            if phase == GamePhase::Ended {
                self.apply_end_penalties();
            }
        }
        if let Some(player) = change.next_player {
            merged.next_player = Some(player);
            self.notify(&[GameEvent::TurnChanged { player }]);
        }
    }

    fn apply_end_penalties(&mut self) {
        let mut events = Vec::new();
        for player in &mut self.players {
            let penalty = player.unfinished_penalty();
            if penalty > 0 {
                player.add_score(-penalty);
                events.push(GameEvent::ScoreChanged {
                    player: player.id(),
                    score: player.score(),
                });
            }
        }
        self.notify(&events);
    }

    fn notify(&mut self, events: &[GameEvent]) {
        for event in events {
            for observer in &mut self.observers {
                observer.on_event(event);
            }
        }
    }

    /// Standings ordered by rank.
    #[must_use]
    pub fn results(&self) -> Vec<PlayerResult> {
        standings(&self.players)
    }
}

/// Ranks players by score, then finished puzzles, then owned tetrominoes.
fn standings(players: &[PlayerState]) -> Vec<PlayerResult> {
    let mut results: Vec<_> = players
        .iter()
        .map(|player| PlayerResult {
            player: player.id(),
            rank: 0,
            score: player.score(),
            finished_puzzles: player.finished_puzzles().len(),
            tetrominoes: player.tetrominoes().total(),
        })
        .collect();
    let key = |result: &PlayerResult| (result.score, result.finished_puzzles, result.tetrominoes);
    results.sort_by(|a, b| key(b).cmp(&key(a)).then(a.player.cmp(&b.player)));
    let mut previous = None;
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = match previous {
            Some((prev_key, rank)) if prev_key == key(result) => rank,
            _ => i + 1,
        };
        previous = Some((key(result), result.rank));
    }
    results
}
