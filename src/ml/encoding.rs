use burn::tensor::{Tensor, TensorData, backend::Backend};

use crate::card::{COLOR_COUNT, Card, Color, DECK_SIZE, HAND_SIZE, MAX_PLAYERS, TRAIT_COUNT, Trait};
use crate::state::{Direction, GameStateView};

pub const CARD_FEATURES: usize = COLOR_COUNT + TRAIT_COUNT;
pub const TARGET_FEATURES: usize = CARD_FEATURES;
pub const COLOR_FEATURES: usize = COLOR_COUNT;
pub const HAND_FEATURES: usize = CARD_FEATURES * HAND_SIZE;
pub const OPPONENT_FEATURES: usize = MAX_PLAYERS - 1;
pub const STATE_FEATURES: usize =
    TARGET_FEATURES + COLOR_FEATURES + HAND_FEATURES + OPPONENT_FEATURES + 1 + 1;

#[inline]
fn normalize(value: usize, max: usize) -> f32 {
    if max == 0 {
        0.0
    } else {
        value as f32 / max as f32
    }
}

pub struct StateEncoder;

impl StateEncoder {
    /// Color one-hot followed by trait one-hot. Wild cards leave the color block empty.
    pub fn card_features(card: &Card) -> [f32; CARD_FEATURES] {
        let mut out = [0.0; CARD_FEATURES];
        if let Some(color) = card.color() {
            out[color.index()] = 1.0;
        }
        out[COLOR_COUNT + card.card_trait().index()] = 1.0;
        out
    }

    /// Same layout as [`StateEncoder::card_features`], driven by raw labels
    /// such as `("r", "draw_2")`. Unknown labels leave their block at zero.
    pub fn identifier_features(color: &str, card_trait: &str) -> [f32; CARD_FEATURES] {
        let mut out = [0.0; CARD_FEATURES];
        if let Some(color) = Color::from_code(color) {
            out[color.index()] = 1.0;
        }
        if let Some(card_trait) = Trait::from_label(card_trait) {
            out[COLOR_COUNT + card_trait.index()] = 1.0;
        }
        out
    }

    pub fn encode(state: &GameStateView) -> [f32; STATE_FEATURES] {
        let mut out = [0.0; STATE_FEATURES];
        let mut offset = 0;

        out[offset..offset + CARD_FEATURES].copy_from_slice(&Self::card_features(&state.target));
        offset += TARGET_FEATURES;

        out[offset + state.current_color.index()] = 1.0;
        offset += COLOR_FEATURES;

        for (slot, card) in state.hand.iter().take(HAND_SIZE).enumerate() {
            let start = offset + slot * CARD_FEATURES;
            out[start..start + CARD_FEATURES].copy_from_slice(&Self::card_features(card));
        }
        offset += HAND_FEATURES;

        for (slot, size) in state
            .opponent_hand_sizes
            .iter()
            .take(OPPONENT_FEATURES)
            .enumerate()
        {
            out[offset + slot] = normalize(*size, HAND_SIZE);
        }
        offset += OPPONENT_FEATURES;

        out[offset] = match state.direction {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        };
        offset += 1;

        out[offset] = normalize(state.deck_size, DECK_SIZE);
        offset += 1;

        debug_assert_eq!(offset, STATE_FEATURES);
        out
    }

    pub fn encode_tensor<B>(state: &GameStateView, device: &B::Device) -> Tensor<B, 2>
    where
        B: Backend,
    {
        let features = Self::encode(state);
        Tensor::<B, 2>::from_data(TensorData::from([features]), device)
    }

    /// Stacks already-encoded states into a `[batch, STATE_FEATURES]` tensor.
    pub fn batch_tensor<'a, B, I>(states: I, device: &B::Device) -> Tensor<B, 2>
    where
        B: Backend,
        I: IntoIterator<Item = &'a [f32; STATE_FEATURES]>,
    {
        let mut flat = Vec::new();
        let mut rows = 0;
        for state in states {
            flat.extend_from_slice(state);
            rows += 1;
        }
        Tensor::<B, 2>::from_data(TensorData::new(flat, [rows, STATE_FEATURES]), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameBuilder;
    use burn_ndarray::NdArray;

    #[test]
    fn feature_count_matches_layout() {
        assert_eq!(STATE_FEATURES, 161);
    }

    #[test]
    fn encodes_initial_state() {
        let game = GameBuilder::new(2)
            .expect("builder")
            .with_seed(3)
            .build()
            .expect("game");
        let view = game.state_for_player(0).expect("view");
        let encoded = StateEncoder::encode(&view);

        let top_block = &encoded[..TARGET_FEATURES];
        assert_eq!(top_block.iter().sum::<f32>(), 2.0);
        let color_block = &encoded[TARGET_FEATURES..TARGET_FEATURES + COLOR_FEATURES];
        assert_eq!(color_block[view.current_color.index()], 1.0);

        let hand_start = TARGET_FEATURES + COLOR_FEATURES;
        for slot in 0..HAND_SIZE {
            let block = &encoded[hand_start + slot * CARD_FEATURES..][..CARD_FEATURES];
            let ones = block.iter().filter(|v| **v == 1.0).count();
            assert!(ones == 1 || ones == 2, "slot {slot} should hold a card");
        }

        let opponents = hand_start + HAND_FEATURES;
        assert_eq!(&encoded[opponents..opponents + 3], &[1.0, 0.0, 0.0]);
        assert_eq!(encoded[STATE_FEATURES - 2], 1.0);
        assert!((encoded[STATE_FEATURES - 1] - 93.0 / 108.0).abs() < 1e-6);
    }

    #[test]
    fn short_hands_are_zero_padded() {
        let game = GameBuilder::new(4).expect("builder").build().expect("game");
        let mut view = game.state_for_player(1).expect("view");
        view.hand.truncate(2);
        view.direction = Direction::Backward;
        let encoded = StateEncoder::encode(&view);
        let hand_start = TARGET_FEATURES + COLOR_FEATURES;
        let padding = &encoded[hand_start + 2 * CARD_FEATURES..hand_start + HAND_FEATURES];
        assert!(padding.iter().all(|v| *v == 0.0));
        assert_eq!(encoded[STATE_FEATURES - 2], -1.0);
    }

    #[test]
    fn malformed_identifiers_degrade_to_zero() {
        let valid = StateEncoder::identifier_features("b", "reverse");
        assert_eq!(valid, StateEncoder::card_features(&Card::Reverse(Color::Blue)));
        let unknown_color = StateEncoder::identifier_features("purple", "5");
        assert_eq!(unknown_color[..COLOR_COUNT], [0.0; COLOR_COUNT]);
        assert_eq!(unknown_color[COLOR_COUNT + 5], 1.0);
        let garbage = StateEncoder::identifier_features("", "draw_17");
        assert!(garbage.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn tensor_has_batch_dimension() {
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let view = game.state_for_player(0).expect("view");
        let device = Default::default();
        let tensor = StateEncoder::encode_tensor::<NdArray<f32>>(&view, &device);
        assert_eq!(tensor.dims(), [1, STATE_FEATURES]);
    }
}
