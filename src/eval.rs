use std::sync::Arc;

use serde::Serialize;

use crate::action::{ActionSpace, PlayerId};
use crate::bot::Bot;
use crate::error::GameError;
use crate::game::GameBuilder;

/// Seat the evaluated bot always occupies.
pub const EVALUATED_SEAT: PlayerId = 0;

#[derive(Clone, Copy, Debug)]
pub struct EvaluationConfig {
    pub num_players: usize,
    pub games: usize,
    pub seed: u64,
    /// Games still running after this many steps count as not won.
    pub max_steps: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            num_players: 2,
            games: 100,
            seed: 0,
            max_steps: 2_000,
        }
    }
}

/// Aggregated results of [`evaluate_agent`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct EvaluationReport {
    pub games: usize,
    pub wins: usize,
    pub unfinished: usize,
    /// Decisions taken by the evaluated bot, summed over all games.
    pub total_steps: usize,
    /// Draw actions chosen by the evaluated bot, summed over all games.
    pub total_cards_drawn: usize,
    /// Wins per seat, including the evaluated one.
    pub seat_wins: Vec<usize>,
}

impl EvaluationReport {
    pub fn win_rate(&self) -> f64 {
        ratio(self.wins, self.games)
    }

    pub fn average_steps(&self) -> f64 {
        ratio(self.total_steps, self.games)
    }

    pub fn average_cards_drawn(&self) -> f64 {
        ratio(self.total_cards_drawn, self.games)
    }
}

fn ratio(value: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 / total as f64
    }
}

/// Plays `config.games` games with `agent` in seat 0 and `opponents` in the
/// remaining seats.
pub fn evaluate_agent(
    agent: &mut dyn Bot,
    opponents: &mut [Box<dyn Bot>],
    action_space: &Arc<ActionSpace>,
    config: EvaluationConfig,
) -> Result<EvaluationReport, GameError> {
    if opponents.len() + 1 < config.num_players {
        return Err(GameError::InvalidConfiguration(
            "not enough opponents for every seat",
        ));
    }
    agent
        .check_action_space(action_space)
        .map_err(|source| GameError::ActionSpaceMismatch {
            seat: EVALUATED_SEAT,
            source,
        })?;
    for (offset, opponent) in opponents.iter().enumerate() {
        opponent
            .check_action_space(action_space)
            .map_err(|source| GameError::ActionSpaceMismatch {
                seat: offset + 1,
                source,
            })?;
    }
    let draw = action_space.draw_index();
    let mut report = EvaluationReport {
        games: config.games,
        seat_wins: vec![0; config.num_players],
        ..EvaluationReport::default()
    };

    for game_index in 0..config.games {
        let mut game = GameBuilder::new(config.num_players)?
            .with_seed(config.seed.wrapping_add(game_index as u64))
            .with_action_space(Arc::clone(action_space))
            .build()?;
        let (mut state, mut player) = game.init_game();
        let mut steps = 0usize;
        while !game.game_over() && steps < config.max_steps {
            let legal = state.legal_actions.clone();
            let action = if player == EVALUATED_SEAT {
                let action = agent.select_action(&state, &legal);
                report.total_steps += 1;
                if action == draw {
                    report.total_cards_drawn += 1;
                }
                action
            } else {
                opponents[player - 1].select_action(&state, &legal)
            };
            let outcome = game.step(action)?;
            state = outcome.state;
            player = outcome.current_player;
            steps += 1;
        }
        match game.winner() {
            Some(winner) => {
                report.seat_wins[winner] += 1;
                if winner == EVALUATED_SEAT {
                    report.wins += 1;
                }
            }
            None => report.unfinished += 1,
        }
        tracing::debug!(game = game_index, steps, winner = ?game.winner(), "evaluation game finished");
    }
    Ok(report)
}
