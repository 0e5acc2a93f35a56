use std::path::Path;

use anyhow::Context;
use tetropuzzle_engine::{PuzzleColor, PuzzleDefinition};

use crate::util::read_json_file;

const BUILTIN_PUZZLES: &str = include_str!("../assets/puzzles.json");

/// Puzzle definitions from `path`, or the built-in set when no path is given.
pub fn load_puzzles(path: Option<&Path>) -> anyhow::Result<Vec<PuzzleDefinition>> {
    let definitions: Vec<PuzzleDefinition> = match path {
        Some(path) => read_json_file("puzzle set", path)?,
        None => builtin_puzzles()?,
    };
    let num_white = definitions
        .iter()
        .filter(|definition| definition.color == PuzzleColor::White)
        .count();
    tracing::info!(
        white = num_white,
        black = definitions.len() - num_white,
        "loaded puzzles"
    );
    Ok(definitions)
}

fn builtin_puzzles() -> anyhow::Result<Vec<PuzzleDefinition>> {
    serde_json::from_str(BUILTIN_PUZZLES).context("Failed to parse built-in puzzle set")
}
