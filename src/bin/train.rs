use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_train::logger::{FileMetricLogger, MetricLogger};
use burn_train::metric::MetricEntry;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use unobot::bots::create_bot_from_spec;
use unobot::ml::{EpisodeStats, read_checkpoint_metadata, run_episode};
use unobot::{
    ActionSpace, AgentBot, AgentConfig, Bot, Difficulty, DqnAgent, EvaluationConfig, UnoEnv,
    evaluate_agent,
};

type TrainBackend = Autodiff<NdArray<f32>>;

#[derive(Parser, Debug)]
#[command(about = "Train a DQN Uno agent through play against bots", version)]
struct TrainArgs {
    /// Number of players per game (the learner sits in seat 0).
    #[arg(long, default_value_t = 2)]
    players: usize,
    /// Number of training episodes (games).
    #[arg(long, default_value_t = 20_000)]
    episodes: usize,
    /// Safety cap on steps per episode.
    #[arg(long, default_value_t = 2_000)]
    max_steps: usize,
    /// Spec for every opponent seat: random[:seed], greedy or agent:<checkpoint>[:level].
    #[arg(long, default_value = "random")]
    opponent: String,
    /// JSON file with agent hyper-parameters; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Optional JSON action-space file (defaults to the standard layout).
    #[arg(long)]
    action_space: Option<PathBuf>,
    /// Resume from a previously saved checkpoint.
    #[arg(long)]
    resume: Option<PathBuf>,
    /// Directory for checkpoints and metric logs.
    #[arg(long, default_value = "checkpoints")]
    output_dir: PathBuf,
    /// Save a checkpoint every N episodes.
    #[arg(long, default_value_t = 1_000)]
    checkpoint_every: usize,
    /// Run a greedy evaluation every N episodes (0 disables).
    #[arg(long, default_value_t = 1_000)]
    eval_every: usize,
    /// Games per periodic evaluation.
    #[arg(long, default_value_t = 50)]
    eval_games: usize,
    /// Seed for shuffling and exploration.
    #[arg(long, default_value_t = 0xA11C_E5EE_D00Du64)]
    seed: u64,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = TrainArgs::parse();
    validate_args(&args)?;

    let action_space = Arc::new(match &args.action_space {
        Some(path) => ActionSpace::load(path)?,
        None => ActionSpace::standard(),
    });
    let mut config = match &args.config {
        Some(path) => AgentConfig::from_json(&fs::read_to_string(path)?)?,
        None => AgentConfig::default(),
    };
    config.seed = args.seed;
    if let Some(path) = &args.resume {
        config.hidden = read_checkpoint_metadata(path)?.hidden;
    }

    let mut agent =
        DqnAgent::<TrainBackend>::new(config, Arc::clone(&action_space), Default::default());
    if let Some(path) = &args.resume {
        let metadata = agent.load_model(path)?;
        println!(
            "Resumed from {} (train steps {}, epsilon {:.3})",
            display_path(path),
            metadata.train_steps,
            metadata.epsilon
        );
    }

    let mut env = UnoEnv::with_action_space(args.players, args.seed, Arc::clone(&action_space))?;
    let mut opponents = build_opponents(&args, &action_space)?;

    let log_dir = args.output_dir.join("train");
    fs::create_dir_all(&log_dir)?;
    let mut logger = FileMetricLogger::new_train(&log_dir);

    println!(
        "Training on {} players for {} episodes (opponent: {})",
        args.players, args.episodes, args.opponent
    );
    let mut window = TrainingWindow::default();
    for episode in 1..=args.episodes {
        let stats = run_episode(&mut env, &mut agent, &mut opponents, args.max_steps)?;
        window.record(&stats);
        log_episode(&mut logger, episode, &stats);

        if episode % 100 == 0 {
            println!(
                "episode {episode:>6}  win rate {:.2}  avg reward {:>6.3}  avg loss {}  epsilon {:.3}",
                window.win_rate(),
                window.average_reward(),
                window
                    .average_loss()
                    .map(|loss| format!("{loss:.5}"))
                    .unwrap_or_else(|| String::from("--")),
                agent.epsilon()
            );
            window = TrainingWindow::default();
        }
        if args.eval_every > 0 && episode % args.eval_every == 0 {
            agent = evaluate_greedy(agent, &args, &action_space, episode)?;
        }
        if episode % args.checkpoint_every == 0 || episode == args.episodes {
            let path = args.output_dir.join(format!("uno_model_{episode}.bin"));
            agent.save(&path)?;
            println!("  checkpoint saved -> {}", display_path(&path));
        }
    }
    Ok(())
}

fn validate_args(args: &TrainArgs) -> Result<(), Box<dyn Error>> {
    if !(2..=4).contains(&args.players) {
        return Err("players must be between 2 and 4".into());
    }
    if args.episodes == 0 {
        return Err("episodes must be positive".into());
    }
    if args.checkpoint_every == 0 {
        return Err("checkpoint-every must be positive".into());
    }
    if args.max_steps == 0 {
        return Err("max-steps must be positive".into());
    }
    Ok(())
}

fn build_opponents(
    args: &TrainArgs,
    action_space: &Arc<ActionSpace>,
) -> Result<Vec<Box<dyn Bot>>, Box<dyn Error>> {
    (1..args.players)
        .map(|seat| create_bot_from_spec(&args.opponent, seat, args.seed, action_space))
        .collect()
}

/// Plays evaluation games with exploration switched off, then hands the agent back.
fn evaluate_greedy(
    mut agent: DqnAgent<TrainBackend>,
    args: &TrainArgs,
    action_space: &Arc<ActionSpace>,
    episode: usize,
) -> Result<DqnAgent<TrainBackend>, Box<dyn Error>> {
    let epsilon = agent.epsilon();
    agent.set_epsilon(0.0);
    let mut bot = AgentBot::new(agent, Difficulty::Hard, args.seed);
    let mut opponents = build_opponents(args, action_space)?;
    let report = evaluate_agent(
        &mut bot,
        &mut opponents,
        action_space,
        EvaluationConfig {
            num_players: args.players,
            games: args.eval_games,
            seed: args.seed ^ episode as u64,
            max_steps: args.max_steps,
        },
    )?;
    println!(
        "  eval after {episode}: win rate {:.2}, avg steps {:.1}, avg cards drawn {:.1}",
        report.win_rate(),
        report.average_steps(),
        report.average_cards_drawn()
    );
    let mut agent = bot.into_agent();
    agent.set_epsilon(epsilon);
    Ok(agent)
}

fn log_episode(logger: &mut FileMetricLogger, episode: usize, stats: &EpisodeStats) {
    if let Some(loss) = stats.mean_loss() {
        let entry = MetricEntry::new(
            "Loss".to_string().into(),
            format!("{loss:.6} (updates {})", stats.losses.len()),
            format!("{:.8},{}", loss as f64, stats.losses.len()),
        );
        logger.log(&entry);
    }
    let entry = MetricEntry::new(
        "Reward".to_string().into(),
        format!("{:.3} (steps {})", stats.reward, stats.steps),
        format!("{:.8},1", stats.reward as f64),
    );
    logger.log(&entry);
    logger.end_epoch(episode);
}

#[derive(Default)]
struct TrainingWindow {
    episodes: usize,
    wins: usize,
    reward: f32,
    loss_sum: f32,
    loss_count: usize,
}

impl TrainingWindow {
    fn record(&mut self, stats: &EpisodeStats) {
        self.episodes += 1;
        if stats.winner == Some(0) {
            self.wins += 1;
        }
        self.reward += stats.reward;
        self.loss_sum += stats.losses.iter().sum::<f32>();
        self.loss_count += stats.losses.len();
    }

    fn win_rate(&self) -> f32 {
        self.wins as f32 / self.episodes.max(1) as f32
    }

    fn average_reward(&self) -> f32 {
        self.reward / self.episodes.max(1) as f32
    }

    fn average_loss(&self) -> Option<f32> {
        (self.loss_count > 0).then(|| self.loss_sum / self.loss_count as f32)
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
