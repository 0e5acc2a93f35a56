use std::sync::atomic::AtomicBool;

use rayon::prelude::*;
use serde::Serialize;
use tetropuzzle_engine::{
    Action, GamePhase, GameSnapshot, Puzzle, PuzzleColor, PuzzleId, PuzzleSource,
};
use tetropuzzle_search::SearchOutcome;

use crate::puzzle_search::PuzzleSolver;

/// A puzzle worth pursuing, with the plan to complete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PuzzleChoice {
    pub puzzle_id: PuzzleId,
    /// Whether the puzzle has to be taken from a row first.
    pub from_row: bool,
    pub plan: Vec<Action>,
    /// Number of actions in the plan.
    pub steps: u32,
    /// `(reward score + reward shape level) / steps`, rounded down.
    pub value: u32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    puzzle: &'a Puzzle,
    from_row: bool,
}

/// Options for [`evaluate_puzzles`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChoiceOptions<'a> {
    pub max_depth: Option<u32>,
    pub cancel: Option<&'a AtomicBool>,
}

/// Solves every puzzle the current player could work on and returns the
/// solvable ones, in candidate order.
///
/// Candidates are the player's puzzles in progress and, outside of finishing
/// touches, the face-up row puzzles the player may take. Taking a row puzzle
/// adds one action to its plan.
#[must_use]
pub fn evaluate_puzzles(snapshot: &GameSnapshot, options: ChoiceOptions<'_>) -> Vec<PuzzleChoice> {
    let player = snapshot.current_player_state();
    let finishing_touches = snapshot.turn.phase == GamePhase::FinishingTouches;

    let mut candidates: Vec<_> = player
        .puzzles()
        .map(|puzzle| Candidate {
            puzzle,
            from_row: false,
        })
        .collect();
    if !finishing_touches && player.has_free_puzzle_slot() {
        let black_blocked = snapshot.turn.is_end_game() && snapshot.turn.took_black_puzzle;
        candidates.extend(
            snapshot
                .shared
                .row_puzzles()
                .filter(|puzzle| !(black_blocked && puzzle.color() == PuzzleColor::Black))
                .map(|puzzle| Candidate {
                    puzzle,
                    from_row: true,
                }),
        );
    }

    let mut solver =
        PuzzleSolver::new(*snapshot.shared.reserve()).owned_only(finishing_touches);
    let max_depth = options.max_depth;
    if let Some(cancel) = options.cancel {
        solver = solver.with_cancel(cancel);
    }

    let choices: Vec<_> = candidates
        .par_iter()
        .map(|candidate| {
            // Taking a row puzzle is one more action
            let take_cost = u32::from(candidate.from_row);
            let solver = solver
                .clone()
                .with_max_depth(max_depth.map(|depth| depth.saturating_sub(take_cost)));
            let outcome = solver.solve(
                candidate.puzzle.id(),
                candidate.puzzle.image(),
                player.tetrominoes(),
            );
            let SearchOutcome::Found { actions, cost } = outcome else {
                tracing::trace!(puzzle_id = %candidate.puzzle.id(), ?outcome, "no plan");
                return None;
            };
            let mut plan = Vec::with_capacity(actions.len() + 1);
            if candidate.from_row {
                plan.push(Action::TakePuzzle(PuzzleSource::Row(candidate.puzzle.id())));
            }
            plan.extend(actions);
            let steps = cost + take_cost;
            let reward = candidate.puzzle.reward_score() + candidate.puzzle.reward_shape().level();
            Some(PuzzleChoice {
                puzzle_id: candidate.puzzle.id(),
                from_row: candidate.from_row,
                plan,
                steps,
                value: reward / steps.max(1),
            })
        })
        .collect();
    choices.into_iter().flatten().collect()
}

/// The choice with the highest value; the first one wins ties.
#[must_use]
pub fn best_choice(choices: &[PuzzleChoice]) -> Option<&PuzzleChoice> {
    let mut best: Option<&PuzzleChoice> = None;
    for choice in choices {
        if best.is_none_or(|b| choice.value > b.value) {
            best = Some(choice);
        }
    }
    best
}

/// Picks the puzzle with the best reward per action for the current player.
#[must_use]
pub fn choose_puzzle(snapshot: &GameSnapshot, options: ChoiceOptions<'_>) -> Option<PuzzleChoice> {
    let choices = evaluate_puzzles(snapshot, options);
    let best = best_choice(&choices)?.clone();
    tracing::debug!(
        player = %snapshot.current_player,
        puzzle_id = %best.puzzle_id,
        steps = best.steps,
        value = best.value,
        candidates = choices.len(),
        "chose puzzle"
    );
    Some(best)
}

#[cfg(test)]
mod tests {
    use tetropuzzle_engine::{
        BinaryImage, Game, GameConfig, GameSeed, IdAllocator, PuzzleDefinition, TetrominoShape,
    };

    use super::*;

    fn choice(id: u32, value: u32) -> PuzzleChoice {
        PuzzleChoice {
            puzzle_id: PuzzleId::new(id),
            from_row: false,
            plan: Vec::new(),
            steps: 1,
            value,
        }
    }

    #[test]
    fn test_first_maximum_wins() {
        let choices = [choice(0, 1), choice(1, 3), choice(2, 3), choice(3, 2)];
        assert_eq!(best_choice(&choices).unwrap().puzzle_id, PuzzleId::new(1));
        assert!(best_choice(&[]).is_none());
    }

    fn definition(color: PuzzleColor, reward_score: u32, art: &str) -> PuzzleDefinition {
        PuzzleDefinition {
            color,
            reward_score,
            reward_shape: TetrominoShape::O1,
            image: BinaryImage::from_ascii(art),
        }
    }

    #[test]
    fn test_ranking_uses_integer_division() {
        let one_cell = "####.\n#####\n#####\n#####\n#####";
        let four_cells = "#....\n#####\n#####\n#####\n#####";
        let definitions = vec![
            // (2 + 1) / 2 = 1 with an owned O1: take the puzzle, place
            definition(PuzzleColor::White, 2, one_cell),
            // (5 + 1) / steps: the owned O1 has to be upgraded to fill four cells
            definition(PuzzleColor::White, 5, four_cells),
        ];
        let config = GameConfig {
            seed: Some(GameSeed::from_u128(1)),
            starting_tetrominoes: vec![TetrominoShape::O1],
            ..GameConfig::default()
        };
        let game = Game::new(&config, 1, definitions, &mut IdAllocator::new()).unwrap();
        let snapshot = game.snapshot();

        let choices = evaluate_puzzles(&snapshot, ChoiceOptions::default());
        assert_eq!(choices.len(), 2);
        let by_score = |score| {
            choices
                .iter()
                .find(|c| {
                    snapshot.shared.find_in_rows(c.puzzle_id).unwrap().reward_score() == score
                })
                .unwrap()
        };
        let small = by_score(2);
        assert_eq!((small.steps, small.value), (2, 1));
        assert!(small.from_row);
        assert_eq!(
            small.plan[0],
            Action::TakePuzzle(PuzzleSource::Row(small.puzzle_id))
        );

        let large = by_score(5);
        assert!(large.steps >= 3);
        assert_eq!(large.value, 6 / large.steps);

        let best = choose_puzzle(&snapshot, ChoiceOptions::default()).unwrap();
        let expected = if large.value > small.value { large } else { small };
        assert_eq!(best.value, expected.value);
    }

    #[test]
    fn test_max_depth_discards_long_plans() {
        let empty = ".....\n.....\n.....\n.....\n.....";
        let game = Game::new(
            &GameConfig {
                seed: Some(GameSeed::from_u128(2)),
                ..GameConfig::default()
            },
            1,
            vec![definition(PuzzleColor::White, 9, empty)],
            &mut IdAllocator::new(),
        )
        .unwrap();
        let options = ChoiceOptions {
            max_depth: Some(4),
            cancel: None,
        };
        assert!(choose_puzzle(&game.snapshot(), options).is_none());
    }
}
