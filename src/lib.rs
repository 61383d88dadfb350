//! Uno turn engine and DQN training core for reinforcement learning experiments.

pub mod action;
pub mod bot;
pub mod bots;
pub mod card;
pub mod env;
pub mod error;
pub mod eval;
pub mod game;
pub mod ml;
pub mod state;
pub mod visualize;

pub use crate::action::{Action, ActionIndex, ActionSpace, PlayerId};
pub use crate::bot::Bot;
pub use crate::bots::{AgentBot, GreedyBot, RandomBot};
pub use crate::card::{Card, CardType, Color, Trait, full_deck};
pub use crate::env::{RewardConfig, StepResult, UnoEnv};
pub use crate::error::{ActionSpaceError, AgentError, GameError};
pub use crate::eval::{EvaluationConfig, EvaluationReport, evaluate_agent};
pub use crate::game::{Game, GameBuilder, GameConfig, Player, StepOutcome, TurnEvent};
pub use crate::ml::{
    AgentConfig, DEFAULT_HIDDEN, Difficulty, DqnAgent, PrioritizedReplayBuffer, QNetwork,
    STATE_FEATURES, StateEncoder, Transition,
};
pub use crate::state::{Direction, GameSettings, GameStateView};
pub use crate::visualize::{VisualOptions, describe_action, render_state};
