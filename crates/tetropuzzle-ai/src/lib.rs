//! Computer players for the puzzle game.
//!
//! [`SearchPlayer`] solves every puzzle it could work on with
//! [`PuzzleSolver`] and pursues the one with the best reward per action.
//! [`PlayerSeat`] runs any [`Player`] on a worker thread with a decision
//! timeout.

pub use self::{decision::*, player::*, puzzle_choice::*, puzzle_search::*, upgrade_path::*};

mod decision;
mod player;
mod puzzle_choice;
mod puzzle_search;
mod upgrade_path;
