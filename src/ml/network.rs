use burn::module::{Module, ParamId};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::tensor::Tensor;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;

use crate::state::GameStateView;

use super::encoding::{STATE_FEATURES, StateEncoder};

pub const DEFAULT_HIDDEN: [usize; 3] = [512, 256, 128];

/// Fully connected Q-value network: one output per action index.
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    stack: Vec<Linear<B>>,
    output: Linear<B>,
}

impl<B: Backend> QNetwork<B> {
    pub fn new(input: usize, hidden: &[usize], actions: usize, device: &B::Device) -> Self {
        let mut stack = Vec::with_capacity(hidden.len());
        let mut input_size = input;
        for &width in hidden {
            stack.push(Self::layer(input_size, width, device));
            input_size = width;
        }
        let output = Self::layer(input_size, actions, device);
        Self { stack, output }
    }

    /// Network sized for the standard state encoding.
    pub fn for_actions(actions: usize, device: &B::Device) -> Self {
        Self::new(STATE_FEATURES, &DEFAULT_HIDDEN, actions, device)
    }

    fn layer(input: usize, output: usize, device: &B::Device) -> Linear<B> {
        LinearConfig::new(input, output)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device)
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut activations = input;
        for layer in &self.stack {
            activations = relu(layer.forward(activations));
        }
        self.output.forward(activations)
    }

    pub fn forward_state(&self, state: &GameStateView, device: &B::Device) -> Tensor<B, 1> {
        let batch = StateEncoder::encode_tensor::<B>(state, device);
        let actions = self.output_size();
        self.forward(batch).reshape([actions])
    }

    /// `[input, output]` of every linear layer, output layer last.
    pub fn layer_shapes(&self) -> Vec<[usize; 2]> {
        self.stack
            .iter()
            .chain(std::iter::once(&self.output))
            .map(|layer| layer.weight.val().dims())
            .collect()
    }

    /// Ids of every weight matrix and every bias vector, in layer order.
    pub fn parameter_ids(&self) -> (Vec<ParamId>, Vec<ParamId>) {
        let layers = || self.stack.iter().chain(std::iter::once(&self.output));
        let weights = layers().map(|layer| layer.weight.id).collect();
        let biases = layers()
            .filter_map(|layer| layer.bias.as_ref().map(|bias| bias.id))
            .collect();
        (weights, biases)
    }

    pub fn input_size(&self) -> usize {
        self.layer_shapes().first().map(|shape| shape[0]).unwrap_or(0)
    }

    pub fn output_size(&self) -> usize {
        self.output.weight.val().dims()[1]
    }
}
