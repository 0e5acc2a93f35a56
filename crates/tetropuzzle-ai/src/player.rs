use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tetropuzzle_engine::{Action, GamePhase, GameSnapshot, TetrominoShape};

use crate::puzzle_choice::{ChoiceOptions, PuzzleChoice, best_choice, evaluate_puzzles};

/// Shared flag asking a running decision to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn as_flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// A decision provider for one seat.
pub trait Player: Send {
    /// Picks the next action for the current player of `snapshot`.
    ///
    /// Implementations should return early once `cancel` is set; the returned
    /// action is then discarded.
    fn choose_action(&mut self, snapshot: &GameSnapshot, cancel: &CancelToken) -> Action;

    /// Picks one of `options` as the reward for a finished puzzle.
    fn choose_reward(
        &mut self,
        snapshot: &GameSnapshot,
        options: &[TetrominoShape],
    ) -> TetrominoShape;
}

/// The action that is always safe to substitute in `phase`.
#[must_use]
pub fn default_action(phase: GamePhase) -> Action {
    match phase {
        GamePhase::FinishingTouches => Action::EndFinishingTouches,
        GamePhase::Normal | GamePhase::LastRound | GamePhase::Ended => Action::DoNothing,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchPlayerConfig {
    /// Plans longer than this many actions are not considered.
    pub max_depth: Option<u32>,
    /// Time a decision may take before it is cancelled.
    pub decision_timeout_ms: u64,
}

impl Default for SearchPlayerConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(12),
            decision_timeout_ms: 2000,
        }
    }
}

impl SearchPlayerConfig {
    #[must_use]
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }
}

/// Plays by completing the puzzle with the best reward per action.
#[derive(Debug, Clone, Default)]
pub struct SearchPlayer {
    config: SearchPlayerConfig,
}

impl SearchPlayer {
    #[must_use]
    pub fn new(config: SearchPlayerConfig) -> Self {
        Self { config }
    }

    fn options<'a>(&self, cancel: &'a CancelToken) -> ChoiceOptions<'a> {
        ChoiceOptions {
            max_depth: self.config.max_depth,
            cancel: Some(cancel.as_flag()),
        }
    }

    fn play(&self, snapshot: &GameSnapshot, cancel: &CancelToken) -> Option<Action> {
        let choices = evaluate_puzzles(snapshot, self.options(cancel));
        let best = best_choice(&choices)?;
        if let Some(master) = master_action(snapshot, &choices, best) {
            return Some(master);
        }
        let action = best.plan.first()?.clone();
        snapshot.verify(&action).is_ok().then_some(action)
    }

    fn finishing_touches(&self, snapshot: &GameSnapshot, cancel: &CancelToken) -> Option<Action> {
        let choices = evaluate_puzzles(snapshot, self.options(cancel));
        let player = snapshot.current_player_state();
        // Each placement costs a point; finishing saves the unfinished penalty.
        let (_, choice) = choices
            .iter()
            .filter_map(|choice| {
                let reward = player.puzzle(choice.puzzle_id)?.reward_score();
                (choice.steps < reward).then_some((reward - choice.steps, choice))
            })
            .rev()
            .max_by_key(|(gain, _)| *gain)?;
        let action = choice.plan.first()?.clone();
        snapshot.verify(&action).is_ok().then_some(action)
    }

    fn fallback(snapshot: &GameSnapshot) -> Action {
        [Action::TakeBasicTetromino]
            .into_iter()
            .find(|action| snapshot.verify(action).is_ok())
            .unwrap_or_else(|| default_action(snapshot.turn.phase))
    }
}

/// Combines the next placements of several puzzles in progress into one
/// master action, when the best plan starts with a placement too.
fn master_action(
    snapshot: &GameSnapshot,
    choices: &[PuzzleChoice],
    best: &PuzzleChoice,
) -> Option<Action> {
    let starts_with_placement = matches!(best.plan.first(), Some(Action::PlaceTetromino(_)));
    if snapshot.turn.used_master_action || !starts_with_placement {
        return None;
    }
    let placements: Vec<_> = choices
        .iter()
        .filter(|choice| !choice.from_row)
        .filter_map(|choice| match choice.plan.first() {
            Some(Action::PlaceTetromino(placement)) => Some(*placement),
            _ => None,
        })
        .collect();
    if placements.len() < 2 {
        return None;
    }
    let action = Action::MasterAction(placements);
    snapshot.verify(&action).is_ok().then_some(action)
}

impl Player for SearchPlayer {
    fn choose_action(&mut self, snapshot: &GameSnapshot, cancel: &CancelToken) -> Action {
        let action = match snapshot.turn.phase {
            GamePhase::FinishingTouches => self.finishing_touches(snapshot, cancel),
            GamePhase::Normal | GamePhase::LastRound => self.play(snapshot, cancel),
            GamePhase::Ended => None,
        };
        let action = action.unwrap_or_else(|| Self::fallback(snapshot));
        tracing::debug!(player = %snapshot.current_player, %action, "decided");
        action
    }

    fn choose_reward(
        &mut self,
        _snapshot: &GameSnapshot,
        options: &[TetrominoShape],
    ) -> TetrominoShape {
        // All options share a level; prefer the one later in table order.
        options.last().copied().unwrap_or(TetrominoShape::BASIC)
    }
}

#[cfg(test)]
mod tests {
    use tetropuzzle_engine::{
        BinaryImage, Game, GameConfig, GameSeed, IdAllocator, Placement, PuzzleColor,
        PuzzleDefinition, PuzzleSource,
    };

    use super::*;

    const ONE_CELL: &str = "####.\n#####\n#####\n#####\n#####";

    fn game(reward_score: u32, count: usize) -> Game {
        let definitions = (0..count).map(|_| PuzzleDefinition {
            color: PuzzleColor::White,
            reward_score,
            reward_shape: TetrominoShape::I2,
            image: BinaryImage::from_ascii(ONE_CELL),
        });
        let config = GameConfig {
            seed: Some(GameSeed::from_u128(4)),
            ..GameConfig::default()
        };
        Game::new(&config, 1, definitions, &mut IdAllocator::new()).unwrap()
    }

    fn play_action(game: &mut Game, player: &mut SearchPlayer) -> Action {
        let action = player.choose_action(&game.snapshot(), &CancelToken::new());
        game.apply(&action).unwrap();
        action
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_default_action() {
        assert_eq!(default_action(GamePhase::Normal), Action::DoNothing);
        assert_eq!(
            default_action(GamePhase::FinishingTouches),
            Action::EndFinishingTouches
        );
    }

    #[test]
    fn test_takes_and_completes_puzzle() {
        let mut game = game(3, 4);
        let mut player = SearchPlayer::default();
        let first = play_action(&mut game, &mut player);
        assert!(matches!(first, Action::TakePuzzle(PuzzleSource::Row(_))));
        let second = play_action(&mut game, &mut player);
        assert!(matches!(second, Action::PlaceTetromino(_)));
        assert_eq!(game.players()[0].finished_puzzles().len(), 1);
        assert_eq!(game.players()[0].score(), 3);
    }

    #[test]
    fn test_master_action_for_several_puzzles() {
        let mut game = game(3, 8);
        let row: Vec<_> = game
            .shared()
            .row(PuzzleColor::White)
            .puzzles()
            .map(|puzzle| puzzle.id())
            .collect();
        game.apply(&Action::TakePuzzle(PuzzleSource::Row(row[0])))
            .unwrap();
        game.apply(&Action::TakePuzzle(PuzzleSource::Row(row[1])))
            .unwrap();
        game.apply(&Action::TakeBasicTetromino).unwrap();

        // Both puzzles in progress need a single O1, and two are owned
        let action = SearchPlayer::default().choose_action(&game.snapshot(), &CancelToken::new());
        let Action::MasterAction(placements) = &action else {
            panic!("expected master action, got {action}");
        };
        assert_eq!(placements.len(), 2);
        assert!(placements.iter().all(|p: &Placement| p.shape == TetrominoShape::O1));
        game.apply(&action).unwrap();
        assert_eq!(game.players()[0].finished_puzzles().len(), 2);
    }

    #[test]
    fn test_finishing_touches_only_when_worth_it() {
        let mut game = game(1, 4);
        let id = game.shared().row(PuzzleColor::White).puzzles().next().unwrap().id();
        game.apply(&Action::TakePuzzle(PuzzleSource::Row(id))).unwrap();
        let mut snapshot = game.snapshot();
        snapshot.turn.phase = GamePhase::FinishingTouches;

        // One placement for a reward of one point gains nothing
        let mut player = SearchPlayer::default();
        assert_eq!(
            player.choose_action(&snapshot, &CancelToken::new()),
            Action::EndFinishingTouches
        );
    }

    #[test]
    fn test_reward_choice() {
        let game = game(1, 0);
        let mut player = SearchPlayer::default();
        let choice = player.choose_reward(
            &game.snapshot(),
            &[TetrominoShape::I3, TetrominoShape::L2],
        );
        assert_eq!(choice, TetrominoShape::L2);
    }
}
