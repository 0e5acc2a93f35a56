use std::path::PathBuf;

use anyhow::Context;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use tetropuzzle_ai::{PlayerSeat, SearchPlayer, SearchPlayerConfig, default_action};
use tetropuzzle_engine::{
    ActionError, Game, GameConfig, GameEvent, GameSeed, IdAllocator, PlayerResult, PuzzleDefinition,
};

use crate::{
    puzzles::load_puzzles,
    util::{Output, read_json_file},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct SimulateArg {
    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: usize,
    /// Number of players per game
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=4))]
    players: u8,
    /// Puzzle set JSON file (built-in set if omitted)
    #[arg(long)]
    puzzles: Option<PathBuf>,
    /// Game and player configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed of the first game; game `i` uses `seed + i`
    #[arg(long)]
    seed: Option<u128>,
    /// Games still running after this many actions are stopped
    #[arg(long, default_value_t = 5000)]
    max_actions: usize,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
struct SimulationConfig {
    game: GameConfig,
    player: SearchPlayerConfig,
}

#[derive(Debug, Clone, Serialize)]
struct GameReport {
    index: usize,
    seed: GameSeed,
    /// False when the game was stopped at the action limit.
    completed: bool,
    actions: usize,
    results: Vec<PlayerResult>,
}

#[derive(Debug, Clone, Serialize)]
struct SimulationReport {
    num_players: usize,
    /// Number of first places per seat, over completed games.
    wins: Vec<usize>,
    games: Vec<GameReport>,
}

pub(crate) fn run(arg: &SimulateArg) -> anyhow::Result<()> {
    let config: SimulationConfig = match &arg.config {
        Some(path) => read_json_file("simulation config", path)?,
        None => SimulationConfig::default(),
    };
    let definitions = load_puzzles(arg.puzzles.as_deref())?;
    let num_players = usize::from(arg.players);

    let mut rng = rand::rng();
    let mut games = Vec::with_capacity(arg.games);
    for index in 0..arg.games {
        let seed = arg
            .seed
            .map(|seed| GameSeed::from_u128(seed.wrapping_add(index as u128)))
            .or(config.game.seed)
            .unwrap_or_else(|| rng.random());
        let report = play_game(index, seed, &config, num_players, &definitions, arg.max_actions)
            .with_context(|| format!("Game #{index} (seed {seed}) failed"))?;
        eprintln!(
            "Game #{index}: {} actions, scores {:?}",
            report.actions,
            report
                .results
                .iter()
                .map(|result| result.score)
                .collect::<Vec<_>>()
        );
        games.push(report);
    }

    let mut wins = vec![0; num_players];
    for result in games
        .iter()
        .filter(|game| game.completed)
        .flat_map(|game| &game.results)
        .filter(|result| result.rank == 1)
    {
        wins[result.player.index()] += 1;
    }

    let report = SimulationReport {
        num_players,
        wins,
        games,
    };
    Output::save_json(&report, arg.output.clone())?;
    Ok(())
}

fn play_game(
    index: usize,
    seed: GameSeed,
    config: &SimulationConfig,
    num_players: usize,
    definitions: &[PuzzleDefinition],
    max_actions: usize,
) -> anyhow::Result<GameReport> {
    let game_config = GameConfig {
        seed: Some(seed),
        ..config.game.clone()
    };
    let mut game = Game::new(
        &game_config,
        num_players,
        definitions.iter().cloned(),
        &mut IdAllocator::new(),
    )?;
    game.subscribe(|event: &GameEvent| tracing::trace!(?event, "game event"));

    let timeout = config.player.decision_timeout();
    let mut seats: Vec<_> = (0..num_players)
        .map(|_| PlayerSeat::spawn(SearchPlayer::new(config.player.clone()), timeout))
        .collect();

    tracing::info!(index, %seed, num_players, "game started");
    let mut actions = 0;
    while !game.is_ended() {
        if let Some((pending, options)) = game.pending_reward() {
            let seat = &mut seats[pending.player.index()];
            let shape = seat
                .decide_reward(game.snapshot(), &options)
                .unwrap_or_else(|| options[0]);
            game.grant_reward(shape)?;
            continue;
        }
        if actions >= max_actions {
            tracing::warn!(index, actions, "action limit reached, stopping game");
            break;
        }

        let player = game.current_player();
        let action = seats[player.index()].action_or_default(game.snapshot());
        match game.apply(&action) {
            Ok(_) => {}
            Err(ActionError::Rejected(failure)) => {
                let fallback = default_action(game.phase());
                tracing::warn!(%player, %action, %failure, %fallback, "action rejected");
                game.apply(&fallback)?;
            }
            Err(err) => return Err(err.into()),
        }
        actions += 1;
    }

    Ok(GameReport {
        index,
        seed,
        completed: game.is_ended(),
        actions,
        results: game.results(),
    })
}
