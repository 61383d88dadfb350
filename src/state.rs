use serde::{Deserialize, Serialize};

use crate::action::{ActionIndex, PlayerId};
use crate::card::{Card, Color, HAND_SIZE, MAX_PLAYERS, MIN_PLAYERS};
use crate::error::GameError;

/// Global constants for a running game.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSettings {
    pub num_players: usize,
    pub hand_size: usize,
}

impl GameSettings {
    pub fn new(num_players: usize) -> Result<Self, GameError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players) {
            return Err(GameError::InvalidConfiguration(
                "players must be between 2 and 4",
            ));
        }
        Ok(Self {
            num_players,
            hand_size: HAND_SIZE,
        })
    }
}

/// Direction in which turns rotate around the table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    #[inline]
    pub fn sign(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    #[inline]
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Game state snapshot tailored for bots and learning agents.
///
/// `hand` holds the cards of `self_player`. Views produced for training carry
/// the full hand; player-facing views leave it empty unless the viewer is the
/// seat being described. `legal_actions` always contains the draw action.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameStateView {
    pub self_player: PlayerId,
    pub current_player: PlayerId,
    pub target: Card,
    pub current_color: Color,
    pub direction: Direction,
    pub hand: Vec<Card>,
    pub opponent_hand_sizes: Vec<usize>,
    pub legal_actions: Vec<ActionIndex>,
    pub deck_size: usize,
    pub discard_size: usize,
    pub drawn_card: Option<Card>,
}
