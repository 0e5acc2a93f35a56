use serde::{Deserialize, Serialize};

use super::player_state::PlayerId;

/// Number of action slots each player gets per turn.
pub const ACTIONS_PER_TURN: u32 = 3;

/// Lifecycle phase of a game. Phases only ever move forward.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
pub enum GamePhase {
    /// Regular play.
    Normal,
    /// One more full round after the black deck ran out.
    LastRound,
    /// Players place their remaining pieces at 1 point each, without rewards.
    FinishingTouches,
    /// The game is over.
    Ended,
}

/// Notifications raised by action processing that drive the turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum Signal {
    /// The black deck has no puzzles left.
    BlackDeckEmpty,
    /// The current player used the master action.
    MasterActionUsed,
    /// The current player took a black puzzle.
    BlackPuzzleTaken,
    /// The current player has finished their finishing touches.
    PhaseEnded,
}

/// Per-turn information handed to players together with the game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnInfo {
    pub num_actions_left: u32,
    pub phase: GamePhase,
    pub used_master_action: bool,
    pub took_black_puzzle: bool,
    pub last_round: bool,
    pub black_deck_emptied: bool,
}

impl TurnInfo {
    /// Checks if the game has entered its end phase, where only one black puzzle
    /// may be taken per turn.
    #[must_use]
    pub fn is_end_game(&self) -> bool {
        self.black_deck_emptied
    }
}

/// What changed when an action was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnChange {
    /// The player whose turn it is now, if it changed.
    pub next_player: Option<PlayerId>,
    /// The phase the game moved to, if it changed.
    pub new_phase: Option<GamePhase>,
}

/// Tracks whose turn it is and advances the game through its phases.
///
/// # Phase transitions
///
/// ```text
/// Normal --(round boundary after BlackDeckEmpty)--> LastRound
/// LastRound --(next round boundary)--> FinishingTouches
/// FinishingTouches --(every player sent PhaseEnded)--> Ended
/// ```
///
/// A round boundary is reached when the last player's turn ends.
#[derive(Debug, Clone)]
pub struct TurnManager {
    num_players: usize,
    current: usize,
    info: TurnInfo,
    finished_touches: usize,
}

impl TurnManager {
    /// Creates a turn manager for `num_players` players, starting with player 0.
    #[must_use]
    pub fn new(num_players: usize) -> Self {
        assert!(num_players > 0, "a game needs at least one player");
        Self {
            num_players,
            current: 0,
            info: TurnInfo {
                num_actions_left: ACTIONS_PER_TURN,
                phase: GamePhase::Normal,
                used_master_action: false,
                took_black_puzzle: false,
                last_round: false,
                black_deck_emptied: false,
            },
            finished_touches: 0,
        }
    }

    #[must_use]
    pub fn num_players(&self) -> usize {
        self.num_players
    }

    #[must_use]
    pub fn current_player(&self) -> PlayerId {
        PlayerId::new(self.current)
    }

    #[must_use]
    pub fn turn_info(&self) -> &TurnInfo {
        &self.info
    }

    #[must_use]
    pub fn phase(&self) -> GamePhase {
        self.info.phase
    }

    /// Records a signal raised while processing an action of the current player.
    pub fn receive_signal(&mut self, signal: Signal) -> TurnChange {
        match signal {
            Signal::BlackDeckEmpty => {
                self.info.black_deck_emptied = true;
                TurnChange::default()
            }
            Signal::MasterActionUsed => {
                self.info.used_master_action = true;
                TurnChange::default()
            }
            Signal::BlackPuzzleTaken => {
                self.info.took_black_puzzle = true;
                TurnChange::default()
            }
            Signal::PhaseEnded => self.end_finishing_touches(),
        }
    }

    /// Completes an action of the current player.
    ///
    /// Outside of finishing touches, an action that consumes a slot decrements the
    /// remaining actions, and the turn passes to the next player once none are left.
    pub fn complete_action(&mut self, consumes_slot: bool) -> TurnChange {
        match self.info.phase {
            GamePhase::Normal | GamePhase::LastRound if consumes_slot => {
                self.info.num_actions_left = self.info.num_actions_left.saturating_sub(1);
                if self.info.num_actions_left == 0 {
                    return self.next_turn();
                }
                TurnChange::default()
            }
            _ => TurnChange::default(),
        }
    }

    fn next_turn(&mut self) -> TurnChange {
        let mut change = TurnChange::default();
        self.current = (self.current + 1) % self.num_players;
        if self.current == 0 {
            change.new_phase = self.round_boundary();
        }
        self.reset_turn();
        change.next_player = Some(self.current_player());
        change
    }

    fn round_boundary(&mut self) -> Option<GamePhase> {
        let next = match self.info.phase {
            GamePhase::Normal if self.info.black_deck_emptied => GamePhase::LastRound,
            GamePhase::LastRound => GamePhase::FinishingTouches,
            _ => return None,
        };
        tracing::info!(from = %self.info.phase, to = %next, "phase transition");
        self.info.phase = next;
        self.info.last_round = next == GamePhase::LastRound;
        Some(next)
    }

    fn end_finishing_touches(&mut self) -> TurnChange {
        if self.info.phase != GamePhase::FinishingTouches {
            return TurnChange::default();
        }
        self.finished_touches += 1;
        if self.finished_touches >= self.num_players {
            tracing::info!("all players finished their finishing touches");
            self.info.phase = GamePhase::Ended;
            self.reset_turn();
            return TurnChange {
                next_player: None,
                new_phase: Some(GamePhase::Ended),
            };
        }
        self.current = (self.current + 1) % self.num_players;
        self.reset_turn();
        TurnChange {
            next_player: Some(self.current_player()),
            new_phase: None,
        }
    }

    fn reset_turn(&mut self) {
        self.info.num_actions_left = ACTIONS_PER_TURN;
        self.info.used_master_action = false;
        self.info.took_black_puzzle = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_turn(turns: &mut TurnManager) -> TurnChange {
        let mut last = TurnChange::default();
        for _ in 0..ACTIONS_PER_TURN {
            last = turns.complete_action(true);
        }
        last
    }

    #[test]
    fn test_three_actions_per_turn() {
        let mut turns = TurnManager::new(2);
        assert_eq!(turns.complete_action(true), TurnChange::default());
        assert_eq!(turns.turn_info().num_actions_left, 2);
        turns.complete_action(true);
        let change = turns.complete_action(true);
        assert_eq!(change.next_player, Some(PlayerId::new(1)));
        assert_eq!(turns.turn_info().num_actions_left, ACTIONS_PER_TURN);
    }

    #[test]
    fn test_turn_flags_reset() {
        let mut turns = TurnManager::new(2);
        turns.receive_signal(Signal::MasterActionUsed);
        turns.receive_signal(Signal::BlackPuzzleTaken);
        assert!(turns.turn_info().used_master_action);
        play_turn(&mut turns);
        assert!(!turns.turn_info().used_master_action);
        assert!(!turns.turn_info().took_black_puzzle);
    }

    #[test]
    fn test_last_round_starts_at_round_boundary() {
        let mut turns = TurnManager::new(3);
        play_turn(&mut turns);
        turns.receive_signal(Signal::BlackDeckEmpty);
        assert!(turns.turn_info().is_end_game());
        play_turn(&mut turns);
        assert_eq!(turns.phase(), GamePhase::Normal);

        let change = play_turn(&mut turns);
        assert_eq!(change.new_phase, Some(GamePhase::LastRound));
        assert!(turns.turn_info().last_round);
        assert_eq!(turns.current_player(), PlayerId::new(0));

        for _ in 0..2 {
            play_turn(&mut turns);
            assert_eq!(turns.phase(), GamePhase::LastRound);
        }
        let change = play_turn(&mut turns);
        assert_eq!(change.new_phase, Some(GamePhase::FinishingTouches));
        assert!(!turns.turn_info().last_round);
    }

    #[test]
    fn test_finishing_touches_until_ended() {
        let mut turns = TurnManager::new(2);
        turns.receive_signal(Signal::BlackDeckEmpty);
        play_turn(&mut turns);
        play_turn(&mut turns);
        play_turn(&mut turns);
        play_turn(&mut turns);
        assert_eq!(turns.phase(), GamePhase::FinishingTouches);

        // Placements do not consume slots during finishing touches
        for _ in 0..10 {
            turns.complete_action(true);
        }
        assert_eq!(turns.current_player(), PlayerId::new(0));

        let change = turns.receive_signal(Signal::PhaseEnded);
        assert_eq!(change.next_player, Some(PlayerId::new(1)));
        let change = turns.receive_signal(Signal::PhaseEnded);
        assert_eq!(change.new_phase, Some(GamePhase::Ended));
        assert_eq!(turns.phase(), GamePhase::Ended);
    }

    #[test]
    fn test_single_player_rounds() {
        let mut turns = TurnManager::new(1);
        turns.receive_signal(Signal::BlackDeckEmpty);
        let mut phases = vec![turns.phase()];
        for _ in 0..3 {
            play_turn(&mut turns);
            phases.push(turns.phase());
        }
        turns.receive_signal(Signal::PhaseEnded);
        phases.push(turns.phase());
        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(
            phases,
            [
                GamePhase::Normal,
                GamePhase::LastRound,
                GamePhase::FinishingTouches,
                GamePhase::FinishingTouches,
                GamePhase::Ended
            ]
        );
    }
}
