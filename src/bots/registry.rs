use std::error::Error;
use std::sync::Arc;

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::action::ActionSpace;
use crate::bot::Bot;
use crate::bots::{AgentBot, GreedyBot, RandomBot};
use crate::ml::{AgentConfig, Difficulty, DqnAgent, read_checkpoint_metadata};

/// Backend used when a checkpoint is loaded from a bot spec.
pub type PlayBackend = Autodiff<NdArray<f32>>;

/// Returns a normalized label for a bot spec (the head token before any ':').
pub fn label_for_spec(spec: &str) -> String {
    spec.split(':')
        .next()
        .unwrap_or(spec)
        .trim()
        .to_ascii_lowercase()
}

/// Create a bot instance from a CLI-style spec.
/// Supported specs:
/// - random[:seed]
/// - greedy
/// - agent:<checkpoint>[:easy|medium|hard]
pub fn create_bot_from_spec(
    spec: &str,
    index: usize,
    seed: u64,
    action_space: &Arc<ActionSpace>,
) -> Result<Box<dyn Bot>, Box<dyn Error>> {
    match label_for_spec(spec).as_str() {
        "random" => {
            let custom_seed = spec
                .split_once(':')
                .and_then(|(_, value)| value.trim().parse::<u64>().ok())
                .unwrap_or(seed ^ ((index as u64 + 1) * 0x9E37_79B9));
            Ok(Box::new(RandomBot::new(StdRng::seed_from_u64(custom_seed))))
        }
        "greedy" => Ok(Box::new(GreedyBot::new(Arc::clone(action_space)))),
        "agent" => {
            let rest = spec
                .split_once(':')
                .map(|(_, rest)| rest.trim())
                .filter(|rest| !rest.is_empty())
                .ok_or("agent spec requires a checkpoint path: agent:<path>[:difficulty]")?;
            let (path, difficulty) = match rest.rsplit_once(':') {
                Some((path, level)) => match level.parse::<Difficulty>() {
                    Ok(difficulty) => (path, difficulty),
                    Err(_) => (rest, Difficulty::default()),
                },
                None => (rest, Difficulty::default()),
            };
            let agent = load_agent(path, action_space)?;
            let bot_seed = seed ^ ((index as u64 + 1) * 0x2545_F491);
            Ok(Box::new(AgentBot::new(agent, difficulty, bot_seed)))
        }
        _ => Err(format!("unrecognized bot spec: {spec}").into()),
    }
}

/// Loads a greedy (epsilon 0) agent from `path`, sized from the checkpoint metadata.
pub fn load_agent(
    path: &str,
    action_space: &Arc<ActionSpace>,
) -> Result<DqnAgent<PlayBackend>, Box<dyn Error>> {
    let metadata = read_checkpoint_metadata(path)?;
    let config = AgentConfig {
        hidden: metadata.hidden,
        ..AgentConfig::default()
    };
    let mut agent = DqnAgent::<PlayBackend>::new(config, Arc::clone(action_space), Default::default());
    agent.load_model(path)?;
    agent.set_epsilon(0.0);
    Ok(agent)
}
