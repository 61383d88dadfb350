use std::fmt::Write;

use crate::action::{Action, ActionIndex, ActionSpace};
use crate::card::Card;
use crate::state::{Direction, GameStateView};

/// Customize state rendering for CLI visualization.
#[derive(Clone, Copy, Debug)]
pub struct VisualOptions {
    pub show_legal_actions: bool,
    pub show_pile_sizes: bool,
}

impl Default for VisualOptions {
    fn default() -> Self {
        Self {
            show_legal_actions: true,
            show_pile_sizes: true,
        }
    }
}

pub fn render_state(state: &GameStateView, action_space: &ActionSpace) -> String {
    render_state_with_options(state, action_space, VisualOptions::default())
}

pub fn render_state_with_options(
    state: &GameStateView,
    action_space: &ActionSpace,
    options: VisualOptions,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Current player: {}{}",
        state.current_player,
        if state.current_player == state.self_player {
            " (You)"
        } else {
            ""
        }
    );
    let direction = match state.direction {
        Direction::Forward => "clockwise",
        Direction::Backward => "counter-clockwise",
    };
    let _ = writeln!(
        out,
        "Top card: {}  |  Color: {}  |  Direction: {direction}",
        format_card(state.target),
        state.current_color
    );
    if options.show_pile_sizes {
        let _ = writeln!(
            out,
            "Deck: {}  |  Discard: {}",
            state.deck_size, state.discard_size
        );
    }
    let opponents = state
        .opponent_hand_sizes
        .iter()
        .map(|size| size.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Opponent hand sizes: [{opponents}]");
    if state.hand.is_empty() {
        let _ = writeln!(out, "Hand: (hidden or empty)");
    } else {
        let hand = state
            .hand
            .iter()
            .map(|card| format_card(*card))
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(out, "Hand: {hand}");
    }
    if let Some(card) = state.drawn_card {
        let _ = writeln!(out, "Drew: {}", format_card(card));
    }
    if options.show_legal_actions {
        let legal = state
            .legal_actions
            .iter()
            .map(|index| {
                let label = action_space
                    .identifier(*index)
                    .unwrap_or_else(|| String::from("?"));
                format!("{index}:{label}")
            })
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(out, "Legal: {legal}");
    }
    out
}

pub fn describe_action(action_space: &ActionSpace, index: ActionIndex) -> String {
    match action_space.action(index) {
        Some(Action::DrawCard) => String::from("Draw a card"),
        Some(Action::Play(card)) => format!("Play {}", format_card(card)),
        Some(Action::PlayWild { card, color }) => {
            format!("Play {} and choose {color}", format_card(card))
        }
        None => format!("Unknown action {index}"),
    }
}

fn format_card(card: Card) -> String {
    match card.color() {
        Some(color) => format!("{color} {}", card.card_trait().label()),
        None => card.card_trait().label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameBuilder;

    #[test]
    fn render_and_describe_include_expected_phrases() {
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let space = game.action_space().clone();
        let view = game.state_for_player(0).expect("state view");
        let text = render_state(&view, &space);
        assert!(text.contains("Current player: 0 (You)"));
        assert!(text.contains("Hand:"));
        assert!(text.contains("60:draw_card"));

        let hidden = game.player_view(0, 1).expect("view");
        assert!(render_state(&hidden, &space).contains("hidden"));

        assert_eq!(describe_action(&space, space.draw_index()), "Draw a card");
        let wild = space.index_of_identifier("b-wild_draw_4").expect("known");
        assert_eq!(
            describe_action(&space, wild),
            "Play wild_draw_4 and choose Blue"
        );
        let five = space.index_of_identifier("r-5").expect("known");
        assert_eq!(describe_action(&space, five), "Play Red 5");
        assert!(describe_action(&space, 999).contains("Unknown"));
    }
}
