use std::time::Instant;

use tetropuzzle_ai::PuzzleSolver;
use tetropuzzle_engine::{BinaryImage, PuzzleId, ShapeCounts, TetrominoShape};
use tetropuzzle_search::SearchOutcome;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SolveArg {
    /// Puzzle pattern as five '/'-separated rows, '#' for cells outside the puzzle
    pattern: BinaryImage,
    /// Tetrominoes the player owns, comma separated (e.g. O1,I2)
    #[arg(long, value_delimiter = ',')]
    owned: Vec<TetrominoShape>,
    /// Number of pieces of each shape in the reserve
    #[arg(long, default_value_t = 15)]
    reserve: u32,
    /// Only place owned tetrominoes, as during finishing touches
    #[arg(long)]
    owned_only: bool,
    /// Longest plan to look for
    #[arg(long)]
    max_depth: Option<u32>,
}

pub(crate) fn run(arg: &SolveArg) -> anyhow::Result<()> {
    let SolveArg {
        pattern,
        owned,
        reserve,
        owned_only,
        max_depth,
    } = arg;
    let owned: ShapeCounts = owned.iter().copied().collect();

    println!("{pattern}");
    println!();

    let solver = PuzzleSolver::new(ShapeCounts::splat(*reserve))
        .owned_only(*owned_only)
        .with_max_depth(*max_depth);
    let start = Instant::now();
    let outcome = solver.solve(PuzzleId::new(0), *pattern, &owned);
    tracing::info!(elapsed = ?start.elapsed(), "search finished");

    match outcome {
        SearchOutcome::Found { actions, cost } => {
            println!("Solved in {cost} actions:");
            for (step, action) in actions.iter().enumerate() {
                println!("  {:2}: {action}", step + 1);
            }
        }
        SearchOutcome::NotFound | SearchOutcome::Cancelled => println!("No solution"),
    }
    Ok(())
}
