use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::{ActionIndex, ActionSpace, PlayerId};
use crate::card::Card;
use crate::error::GameError;
use crate::game::{Game, GameBuilder, TurnEvent};
use crate::state::{GameSettings, GameStateView};

/// Reward shaping applied by [`UnoEnv::step`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewardConfig {
    pub win: f32,
    pub loss: f32,
    /// Bonus for playing a skip, reverse or draw-two card.
    pub action_bonus: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            win: 1.0,
            loss: -1.0,
            action_bonus: 0.2,
        }
    }
}

/// Result of a single environment transition.
#[derive(Clone, Debug)]
pub struct StepResult {
    /// View for the player who acts next.
    pub state: GameStateView,
    /// Reward from the learner seat's point of view.
    pub reward: f32,
    pub done: bool,
    pub current_player: PlayerId,
    /// Only populated when requested by the caller.
    pub drawn_card: Option<Card>,
    pub event: TurnEvent,
}

/// Reset/step wrapper around [`Game`] with a fixed reward function.
pub struct UnoEnv {
    settings: GameSettings,
    seed: u64,
    episodes: u64,
    learner: PlayerId,
    rewards: RewardConfig,
    action_space: Arc<ActionSpace>,
    fixed_deck: Option<Vec<Card>>,
    game: Game,
}

impl UnoEnv {
    pub fn new(num_players: usize, seed: u64) -> Result<Self, GameError> {
        Self::with_action_space(num_players, seed, Arc::new(ActionSpace::standard()))
    }

    pub fn with_action_space(
        num_players: usize,
        seed: u64,
        action_space: Arc<ActionSpace>,
    ) -> Result<Self, GameError> {
        let settings = GameSettings::new(num_players)?;
        let game = Self::build_game(num_players, seed, &action_space, None)?;
        Ok(Self {
            settings,
            seed,
            episodes: 0,
            learner: 0,
            rewards: RewardConfig::default(),
            action_space,
            fixed_deck: None,
            game,
        })
    }

    /// Deals every episode from `deck` instead of a shuffled one.
    pub fn with_deck(mut self, deck: Vec<Card>) -> Result<Self, GameError> {
        self.game = Self::build_game(
            self.settings.num_players,
            self.seed,
            &self.action_space,
            Some(deck.clone()),
        )?;
        self.fixed_deck = Some(deck);
        Ok(self)
    }

    pub fn with_rewards(mut self, rewards: RewardConfig) -> Self {
        self.rewards = rewards;
        self
    }

    /// Seat whose outcome the rewards describe.
    pub fn with_learner(mut self, learner: PlayerId) -> Result<Self, GameError> {
        if learner >= self.settings.num_players {
            return Err(GameError::InvalidPlayer(learner));
        }
        self.learner = learner;
        Ok(self)
    }

    pub fn learner(&self) -> PlayerId {
        self.learner
    }

    pub fn rewards(&self) -> RewardConfig {
        self.rewards
    }

    pub fn action_space(&self) -> &Arc<ActionSpace> {
        &self.action_space
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn current_player(&self) -> PlayerId {
        self.game.current_player()
    }

    pub fn legal_actions(&self) -> Result<Vec<ActionIndex>, GameError> {
        self.game.legal_actions(self.game.current_player())
    }

    pub fn is_done(&self) -> bool {
        self.game.game_over()
    }

    /// Starts a new game; every episode gets its own shuffle.
    pub fn reset(&mut self) -> Result<(GameStateView, PlayerId), GameError> {
        self.episodes += 1;
        let seed = self.seed.wrapping_add(self.episodes);
        self.game = Self::build_game(
            self.settings.num_players,
            seed,
            &self.action_space,
            self.fixed_deck.clone(),
        )?;
        Ok(self.game.init_game())
    }

    pub fn step(
        &mut self,
        action: ActionIndex,
        return_drawn_card: bool,
    ) -> Result<StepResult, GameError> {
        let actor = self.game.current_player();
        let outcome = self.game.step(action)?;
        let reward = self.reward_for(actor, &outcome.event);
        let drawn_card = if return_drawn_card {
            outcome.event.drawn_card()
        } else {
            None
        };
        let mut state = outcome.state;
        state.drawn_card = drawn_card;
        Ok(StepResult {
            state,
            reward,
            done: self.game.game_over(),
            current_player: outcome.current_player,
            drawn_card,
            event: outcome.event,
        })
    }

    fn reward_for(&self, actor: PlayerId, event: &TurnEvent) -> f32 {
        match self.game.winner() {
            Some(winner) if winner == self.learner => self.rewards.win,
            Some(_) => self.rewards.loss,
            None if actor == self.learner
                && event.played_card().is_some_and(|card| card.is_action()) =>
            {
                self.rewards.action_bonus
            }
            None => 0.0,
        }
    }

    fn build_game(
        num_players: usize,
        seed: u64,
        action_space: &Arc<ActionSpace>,
        deck: Option<Vec<Card>>,
    ) -> Result<Game, GameError> {
        let mut builder = GameBuilder::new(num_players)?
            .with_seed(seed)
            .with_action_space(Arc::clone(action_space));
        if let Some(deck) = deck {
            builder = builder.with_deck(deck);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_produces_fresh_game() -> Result<(), GameError> {
        let mut env = UnoEnv::new(3, 5)?;
        let (state, player) = env.reset()?;
        assert_eq!(player, 0);
        assert_eq!(state.hand.len(), 7);
        assert_eq!(state.opponent_hand_sizes, vec![7, 7]);
        assert_eq!(state.deck_size, 108 - 21 - 1);
        assert!(!env.is_done());
        Ok(())
    }

    #[test]
    fn drawn_card_is_only_reported_on_request() -> Result<(), GameError> {
        let mut env = UnoEnv::new(2, 9)?;
        env.reset()?;
        let draw = env.action_space().draw_index();
        let silent = env.step(draw, false)?;
        assert_eq!(silent.drawn_card, None);
        assert_eq!(silent.state.drawn_card, None);
        let loud = env.step(draw, true)?;
        assert!(loud.drawn_card.is_some());
        assert_eq!(loud.state.drawn_card, loud.drawn_card);
        assert_eq!(loud.reward, 0.0);
        Ok(())
    }

    #[test]
    fn learner_must_be_seated() {
        let env = UnoEnv::new(2, 1).expect("env");
        assert!(matches!(
            env.with_learner(2),
            Err(GameError::InvalidPlayer(2))
        ));
    }
}
