use std::sync::Arc;

use crate::action::{ActionIndex, ActionSpace};
use crate::bot::Bot;
use crate::state::GameStateView;

/// Plays whenever it can, preferring skip, reverse and draw-two cards, and
/// draws only as a last resort.
pub struct GreedyBot {
    action_space: Arc<ActionSpace>,
}

impl GreedyBot {
    pub fn new(action_space: Arc<ActionSpace>) -> Self {
        Self { action_space }
    }

    fn rank(&self, index: ActionIndex) -> u8 {
        match self.action_space.action(index).and_then(|a| a.card()) {
            Some(card) if card.is_action() => 0,
            Some(card) if card.is_wild() => 2,
            Some(_) => 1,
            None => 3,
        }
    }
}

impl Default for GreedyBot {
    fn default() -> Self {
        Self::new(Arc::new(ActionSpace::standard()))
    }
}

impl Bot for GreedyBot {
    fn select_action(
        &mut self,
        _state: &GameStateView,
        legal_actions: &[ActionIndex],
    ) -> ActionIndex {
        legal_actions
            .iter()
            .copied()
            .min_by_key(|index| self.rank(*index))
            .unwrap_or_else(|| self.action_space.draw_index())
    }

    fn name(&self) -> &str {
        "greedy"
    }

    fn action_space(&self) -> Option<&ActionSpace> {
        Some(self.action_space.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameBuilder;

    #[test]
    fn prefers_action_cards_over_numbers_and_draw() {
        let space = Arc::new(ActionSpace::standard());
        let mut bot = GreedyBot::new(Arc::clone(&space));
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let view = game.state_for_player(0).expect("view");
        let idx = |id: &str| space.index_of_identifier(id).expect("known id");
        let legal = [space.draw_index(), idx("r-5"), idx("r-skip"), idx("g-wild")];
        assert_eq!(bot.select_action(&view, &legal), idx("r-skip"));
        let legal = [space.draw_index(), idx("g-wild"), idx("r-5")];
        assert_eq!(bot.select_action(&view, &legal), idx("r-5"));
        assert_eq!(bot.select_action(&view, &[space.draw_index()]), space.draw_index());
    }
}
