use rand::Rng;
use rand::seq::SliceRandom;

use crate::action::ActionIndex;
use crate::bot::Bot;
use crate::state::GameStateView;

/// Baseline bot that samples uniformly from the legal action set.
pub struct RandomBot<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomBot<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Bot for RandomBot<R> {
    fn select_action(
        &mut self,
        state: &GameStateView,
        legal_actions: &[ActionIndex],
    ) -> ActionIndex {
        legal_actions
            .choose(&mut self.rng)
            .copied()
            .or_else(|| state.legal_actions.first().copied())
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        "random"
    }
}
