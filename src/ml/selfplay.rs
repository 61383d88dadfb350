use burn::tensor::backend::AutodiffBackend;

use crate::action::{ActionIndex, PlayerId};
use crate::bot::Bot;
use crate::env::UnoEnv;
use crate::error::GameError;

use super::agent::DqnAgent;
use super::encoding::{STATE_FEATURES, StateEncoder};
use super::replay::Transition;

/// Summary of one training episode.
#[derive(Clone, Debug, Default)]
pub struct EpisodeStats {
    pub steps: usize,
    pub learner_steps: usize,
    /// Sum of rewards credited to the learner.
    pub reward: f32,
    pub winner: Option<PlayerId>,
    pub losses: Vec<f32>,
    pub truncated: bool,
}

impl EpisodeStats {
    pub fn mean_loss(&self) -> Option<f32> {
        if self.losses.is_empty() {
            None
        } else {
            Some(self.losses.iter().sum::<f32>() / self.losses.len() as f32)
        }
    }
}

/// Learner decision waiting for the learner's next turn (or the end of the game).
struct PendingTransition {
    state: [f32; STATE_FEATURES],
    action: ActionIndex,
    reward: f32,
}

impl PendingTransition {
    fn complete(self, next_state: [f32; STATE_FEATURES], done: bool) -> Transition {
        Transition {
            state: self.state,
            action: self.action,
            reward: self.reward,
            next_state,
            done,
        }
    }
}

/// Plays one game with `agent` in the environment's learner seat and
/// `opponents` in the remaining seats, in seat order.
///
/// Rewards produced while opponents act are credited to the learner's last
/// decision. Every completed transition is stored and followed by a train call.
pub fn run_episode<B: AutodiffBackend>(
    env: &mut UnoEnv,
    agent: &mut DqnAgent<B>,
    opponents: &mut [Box<dyn Bot>],
    max_steps: usize,
) -> Result<EpisodeStats, GameError> {
    let learner = env.learner();
    let seats = env.game().settings().num_players;
    if opponents.len() + 1 < seats {
        return Err(GameError::InvalidConfiguration(
            "not enough opponents for every seat",
        ));
    }
    let engine_space = env.action_space();
    agent
        .action_space()
        .ensure_compatible(engine_space.fingerprint())
        .map_err(|source| GameError::ActionSpaceMismatch {
            seat: learner,
            source,
        })?;
    for (slot, opponent) in opponents.iter().enumerate().take(seats - 1) {
        let seat = if slot < learner { slot } else { slot + 1 };
        opponent
            .check_action_space(engine_space)
            .map_err(|source| GameError::ActionSpaceMismatch { seat, source })?;
    }

    let (mut state, mut player) = env.reset()?;
    let mut stats = EpisodeStats::default();
    let mut pending: Option<PendingTransition> = None;
    let mut done = false;

    while !done && stats.steps < max_steps {
        let legal = state.legal_actions.clone();
        let result = if player == learner {
            let encoded = StateEncoder::encode(&state);
            if let Some(previous) = pending.take() {
                agent.remember(previous.complete(encoded, false));
                stats.losses.extend(agent.train());
            }
            let action = agent.select_action(&state, &legal);
            let result = env.step(action, false)?;
            pending = Some(PendingTransition {
                state: encoded,
                action,
                reward: result.reward,
            });
            stats.learner_steps += 1;
            result
        } else {
            let slot = if player < learner { player } else { player - 1 };
            let action = opponents[slot].select_action(&state, &legal);
            let result = env.step(action, false)?;
            if let Some(previous) = pending.as_mut() {
                previous.reward += result.reward;
            }
            result
        };
        stats.reward += result.reward;
        stats.steps += 1;
        done = result.done;
        player = result.current_player;
        state = result.state;
    }

    if let Some(previous) = pending.take() {
        let final_view = env.game().state_for_player(learner)?;
        agent.remember(previous.complete(StateEncoder::encode(&final_view), done));
        stats.losses.extend(agent.train());
    }
    stats.winner = env.game().winner();
    stats.truncated = !done;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::action::ActionSpace;
    use crate::bots::{GreedyBot, RandomBot};
    use crate::ml::AgentConfig;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn episode_fills_replay_memory() -> Result<(), GameError> {
        let mut env = UnoEnv::new(2, 21)?;
        let mut agent = DqnAgent::<TestBackend>::new(
            AgentConfig {
                hidden: vec![16],
                batch_size: 8,
                ..AgentConfig::default()
            },
            Arc::clone(env.action_space()),
            Default::default(),
        );
        let mut opponents: Vec<Box<dyn Bot>> =
            vec![Box::new(RandomBot::new(StdRng::seed_from_u64(4)))];
        let stats = run_episode(&mut env, &mut agent, &mut opponents, 60)?;
        assert!(stats.learner_steps > 0);
        assert_eq!(agent.memory().len(), stats.learner_steps);
        assert!(stats.steps <= 60);
        if stats.truncated {
            assert!(stats.winner.is_none());
        }
        Ok(())
    }

    #[test]
    fn rejects_missing_opponents() -> Result<(), GameError> {
        let mut env = UnoEnv::new(3, 1)?;
        let mut agent = DqnAgent::<TestBackend>::new(
            AgentConfig {
                hidden: vec![8],
                ..AgentConfig::default()
            },
            Arc::clone(env.action_space()),
            Default::default(),
        );
        let mut opponents: Vec<Box<dyn Bot>> =
            vec![Box::new(RandomBot::new(StdRng::seed_from_u64(4)))];
        assert!(run_episode(&mut env, &mut agent, &mut opponents, 10).is_err());
        Ok(())
    }

    #[test]
    fn rejects_agent_with_a_different_action_space() -> Result<(), GameError> {
        let standard = ActionSpace::standard();
        let swapped = Arc::new(standard.with_swapped(0, standard.draw_index()));
        let mut env = UnoEnv::with_action_space(2, 3, swapped)?;
        let mut agent = DqnAgent::<TestBackend>::new(
            AgentConfig {
                hidden: vec![8],
                ..AgentConfig::default()
            },
            Arc::new(standard),
            Default::default(),
        );
        let mut opponents: Vec<Box<dyn Bot>> =
            vec![Box::new(RandomBot::new(StdRng::seed_from_u64(4)))];
        let result = run_episode(&mut env, &mut agent, &mut opponents, 10);
        assert!(matches!(
            result,
            Err(GameError::ActionSpaceMismatch { seat: 0, .. })
        ));
        assert!(agent.memory().is_empty());
        Ok(())
    }

    #[test]
    fn rejects_opponent_with_a_different_action_space() -> Result<(), GameError> {
        let standard = ActionSpace::standard();
        let swapped = Arc::new(standard.with_swapped(3, 7));
        let mut env = UnoEnv::with_action_space(2, 3, Arc::clone(&swapped))?;
        let mut agent = DqnAgent::<TestBackend>::new(
            AgentConfig {
                hidden: vec![8],
                ..AgentConfig::default()
            },
            swapped,
            Default::default(),
        );
        let mut opponents: Vec<Box<dyn Bot>> = vec![Box::new(GreedyBot::new(Arc::new(standard)))];
        let result = run_episode(&mut env, &mut agent, &mut opponents, 10);
        assert!(matches!(
            result,
            Err(GameError::ActionSpaceMismatch { seat: 1, .. })
        ));
        Ok(())
    }
}
