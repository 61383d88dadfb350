use std::error::Error;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use unobot::bots::create_bot_from_spec;
use unobot::{ActionSpace, Bot, Game, TurnEvent, describe_action, render_state};

const DEFAULT_SEED: u64 = 0xDEC0_1DED_5EED_F00D;

#[derive(Parser, Debug)]
#[command(about = "Play a single Uno game between bots", version)]
struct SimulateArgs {
    /// Bot specs, one per seat (2-4): random[:seed], greedy, agent:<checkpoint>[:easy|medium|hard].
    #[arg(default_values_t = [String::from("greedy"), String::from("random")])]
    bots: Vec<String>,
    /// Show the game state and chosen actions each turn.
    #[arg(long)]
    visualize: bool,
    /// Seed for shuffling.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// Stop after the specified number of turns.
    #[arg(long)]
    max_turns: Option<usize>,
    /// Optional JSON action-space file (defaults to the standard layout).
    #[arg(long)]
    action_space: Option<std::path::PathBuf>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = SimulateArgs::parse();
    let action_space = Arc::new(match &args.action_space {
        Some(path) => ActionSpace::load(path)?,
        None => ActionSpace::standard(),
    });

    let num_players = args.bots.len();
    let mut game = Game::builder(num_players)?
        .with_seed(args.seed)
        .with_action_space(Arc::clone(&action_space))
        .build()?;

    let mut bots: Vec<Box<dyn Bot>> = Vec::with_capacity(num_players);
    for (index, spec) in args.bots.iter().enumerate() {
        let bot = create_bot_from_spec(spec, index, args.seed, &action_space)?;
        bot.check_action_space(&action_space)?;
        bots.push(bot);
    }

    println!("Starting Uno simulation with {num_players} players.\n");
    let (mut state, mut current) = game.init_game();
    let mut turns = 0usize;
    while !game.game_over() {
        if let Some(limit) = args.max_turns {
            if turns >= limit {
                println!("Max turn limit {limit} reached. Stopping simulation.");
                break;
            }
        }
        if args.visualize {
            println!("{}", render_state(&state, &action_space));
        }
        let legal_actions = state.legal_actions.clone();
        let action = bots[current].select_action(&state, &legal_actions);
        let outcome = game.step(action)?;
        if args.visualize {
            let note = match outcome.event {
                TurnEvent::FallbackDraw { .. } => " (not playable, drew instead)",
                _ => "",
            };
            println!(
                "Player {current} ({}): {}{note}\n",
                bots[current].name(),
                describe_action(&action_space, action)
            );
        }
        state = outcome.state;
        current = outcome.current_player;
        turns += 1;
    }

    match game.winner() {
        Some(winner) => println!(
            "Game finished after {turns} turns. Winner: Player {winner} ({}).",
            bots[winner].name()
        ),
        None => println!("Simulation stopped before completion."),
    }
    Ok(())
}
