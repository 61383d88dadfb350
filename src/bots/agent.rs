use burn::tensor::backend::AutodiffBackend;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::action::{ActionIndex, ActionSpace};
use crate::bot::Bot;
use crate::ml::{Difficulty, DqnAgent};
use crate::state::GameStateView;

/// Bot driven by a trained [`DqnAgent`], weakened according to a [`Difficulty`].
pub struct AgentBot<B: AutodiffBackend> {
    agent: DqnAgent<B>,
    difficulty: Difficulty,
    rng: StdRng,
}

impl<B: AutodiffBackend> AgentBot<B> {
    pub fn new(agent: DqnAgent<B>, difficulty: Difficulty, seed: u64) -> Self {
        Self {
            agent,
            difficulty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn agent(&self) -> &DqnAgent<B> {
        &self.agent
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn into_agent(self) -> DqnAgent<B> {
        self.agent
    }
}

impl<B: AutodiffBackend> Bot for AgentBot<B> {
    fn select_action(
        &mut self,
        state: &GameStateView,
        legal_actions: &[ActionIndex],
    ) -> ActionIndex {
        let chosen = self.agent.select_action(state, legal_actions);
        self.difficulty.adjust(chosen, legal_actions, &mut self.rng)
    }

    fn name(&self) -> &str {
        "agent"
    }

    fn action_space(&self) -> Option<&ActionSpace> {
        Some(self.agent.action_space().as_ref())
    }
}
