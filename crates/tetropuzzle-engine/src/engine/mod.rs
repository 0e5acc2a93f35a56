//! Rule engine: game state, turn order and the action pipeline.
//!
//! - [`SharedState`] - tetromino reserve, puzzle decks and face-up rows
//! - [`PlayerState`] - score, owned tetrominoes and puzzles of one player
//! - [`TurnManager`] - action slots per turn and the phase state machine
//! - [`ActionVerifier`] - checks an [`Action`] against the rules
//! - [`ActionProcessor`] - applies a verified [`Action`] to the state
//! - [`Game`] - setup, snapshots, reward choices and final standings
//!
//! # Game Flow
//!
//! 1. Set up a [`Game`] from a [`GameConfig`] and puzzle definitions
//! 2. Hand a [`GameSnapshot`] to the current player to get an [`Action`]
//! 3. Apply it with [`Game::apply`]; resolve a pending reward with [`Game::grant_reward`]
//! 4. Repeat until the phase is [`GamePhase::Ended`], then read [`Game::results`]
//!
//! # Example
//!
//! ```
//! use tetropuzzle_engine::{Action, Game, GameConfig, IdAllocator};
//!
//! let mut game = Game::new(&GameConfig::default(), 2, Vec::new(), &mut IdAllocator::new())?;
//! game.apply(&Action::TakeBasicTetromino)?;
//! assert_eq!(game.turn_info().num_actions_left, 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use self::{
    action::*, event::*, game::*, player_state::*, process::*, shared_state::*, turn::*,
    verify::*,
};

mod action;
mod event;
mod game;
mod player_state;
mod process;
mod shared_state;
mod turn;
mod verify;
