use std::fs;
use std::path::Path;
use std::sync::Arc;

use burn::module::{AutodiffModule, Module};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{Adam, AdamConfig, GradientsParams, LearningRate, Optimizer};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Int, Tensor, TensorData};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::action::{ActionIndex, ActionSpace};
use crate::error::AgentError;
use crate::state::GameStateView;

use super::encoding::{STATE_FEATURES, StateEncoder};
use super::network::{DEFAULT_HIDDEN, QNetwork};
use super::replay::{PrioritizedReplayBuffer, ReplayConfig, Transition};

type NetworkRecord<B> = <QNetwork<B> as Module<B>>::Record;

/// Hyper-parameters of the DQN learner.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub hidden: Vec<usize>,
    pub learning_rate: f64,
    pub weight_decay: f32,
    pub batch_size: usize,
    pub gamma: f32,
    pub epsilon: f64,
    pub epsilon_min: f64,
    pub epsilon_decay: f64,
    /// Epsilon decays once every this many train calls.
    pub epsilon_decay_every: usize,
    /// Target network is hard-synced once every this many train calls.
    pub target_update_every: usize,
    /// Upper bound on the combined L2 norm of all gradients in one update.
    pub grad_clip_norm: f32,
    pub replay: ReplayConfig,
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hidden: DEFAULT_HIDDEN.to_vec(),
            learning_rate: 1.0e-4,
            weight_decay: 1.0e-5,
            batch_size: 128,
            gamma: 0.99,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.999,
            epsilon_decay_every: 20,
            target_update_every: 10,
            grad_clip_norm: 1.0,
            replay: ReplayConfig::default(),
            seed: 0xD0_0D1E,
        }
    }
}

impl AgentConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Everything needed to check a checkpoint against the agent before touching its weights.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMetadata {
    pub state_features: usize,
    pub action_count: usize,
    pub hidden: Vec<usize>,
    pub action_space_fingerprint: u64,
    pub epsilon: f64,
    pub train_steps: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AgentCheckpoint {
    metadata: CheckpointMetadata,
    weights: Vec<u8>,
}

/// Double-network Q-learner with prioritized replay and action masking.
pub struct DqnAgent<B: AutodiffBackend> {
    config: AgentConfig,
    action_space: Arc<ActionSpace>,
    device: B::Device,
    policy: QNetwork<B>,
    target: QNetwork<B::InnerBackend>,
    optimizer: OptimizerAdaptor<Adam, QNetwork<B>, B>,
    memory: PrioritizedReplayBuffer<Transition>,
    epsilon: f64,
    train_steps: usize,
    rng: StdRng,
}

impl<B: AutodiffBackend> DqnAgent<B> {
    pub fn new(config: AgentConfig, action_space: Arc<ActionSpace>, device: B::Device) -> Self {
        let policy = QNetwork::<B>::new(STATE_FEATURES, &config.hidden, action_space.len(), &device);
        let target = policy.valid();
        let optimizer = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay)))
            .init();
        Self {
            memory: PrioritizedReplayBuffer::new(config.replay),
            epsilon: config.epsilon.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(config.seed),
            train_steps: 0,
            config,
            action_space,
            device,
            policy,
            target,
            optimizer,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn action_space(&self) -> &Arc<ActionSpace> {
        &self.action_space
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    pub fn memory(&self) -> &PrioritizedReplayBuffer<Transition> {
        &self.memory
    }

    pub fn policy(&self) -> &QNetwork<B> {
        &self.policy
    }

    pub fn target(&self) -> &QNetwork<B::InnerBackend> {
        &self.target
    }

    pub fn metadata(&self) -> CheckpointMetadata {
        CheckpointMetadata {
            state_features: STATE_FEATURES,
            action_count: self.action_space.len(),
            hidden: self.config.hidden.clone(),
            action_space_fingerprint: self.action_space.fingerprint(),
            epsilon: self.epsilon,
            train_steps: self.train_steps,
        }
    }

    /// Q-values of the policy network for every action index.
    pub fn q_values(&self, state: &GameStateView) -> Vec<f32> {
        let values = self.policy.forward_state(state, &self.device);
        values
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap_or_else(|err| {
                tracing::warn!(?err, "q-values could not be read back, treating every action as zero");
                vec![0.0; self.action_space.len()]
            })
    }

    /// Epsilon-greedy choice restricted to `legal_actions`.
    pub fn select_action(
        &mut self,
        state: &GameStateView,
        legal_actions: &[ActionIndex],
    ) -> ActionIndex {
        let fallback = self.action_space.draw_index();
        if legal_actions.is_empty() {
            return fallback;
        }
        if self.rng.gen_bool(self.epsilon) {
            return legal_actions
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(fallback);
        }
        self.greedy_action(state, legal_actions)
    }

    /// Highest-valued legal action; illegal indices are masked to negative infinity.
    pub fn greedy_action(&self, state: &GameStateView, legal_actions: &[ActionIndex]) -> ActionIndex {
        let q_values = self.q_values(state);
        let mask = self.action_space.mask(legal_actions);
        let best = q_values
            .iter()
            .zip(&mask)
            .map(|(q, m)| q + m)
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (idx, value)| match best {
                Some((_, best_value)) if best_value >= value => best,
                _ if value.is_nan() => best,
                _ => Some((idx, value)),
            })
            .map(|(idx, _)| idx);
        match best {
            Some(idx) if legal_actions.contains(&idx) => idx,
            _ => legal_actions
                .first()
                .copied()
                .unwrap_or_else(|| self.action_space.draw_index()),
        }
    }

    pub fn remember(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    /// One gradient step on a prioritized batch. Returns `None` until the
    /// buffer holds a full batch.
    pub fn train(&mut self) -> Option<f32> {
        let batch = self.memory.sample(self.config.batch_size, &mut self.rng)?;
        let size = batch.len();
        let device = self.device.clone();

        let states = StateEncoder::batch_tensor::<B, _>(batch.items.iter().map(|t| &t.state), &device);
        let next_states = StateEncoder::batch_tensor::<B::InnerBackend, _>(
            batch.items.iter().map(|t| &t.next_state),
            &device,
        );
        let actions: Vec<i64> = batch.items.iter().map(|t| t.action as i64).collect();
        let rewards: Vec<f32> = batch.items.iter().map(|t| t.reward).collect();
        let continues: Vec<f32> = batch
            .items
            .iter()
            .map(|t| if t.done { 0.0 } else { 1.0 })
            .collect();

        let actions = Tensor::<B, 2, Int>::from_data(TensorData::new(actions, [size, 1]), &device);
        let predicted = self
            .policy
            .forward(states)
            .gather(1, actions)
            .reshape([size]);

        let next_best = self.target.forward(next_states).max_dim(1).reshape([size]);
        let rewards = Tensor::<B::InnerBackend, 1>::from_data(TensorData::new(rewards, [size]), &device);
        let continues =
            Tensor::<B::InnerBackend, 1>::from_data(TensorData::new(continues, [size]), &device);
        let targets = rewards + next_best.mul(continues).mul_scalar(self.config.gamma);
        let targets = Tensor::<B, 1>::from_inner(targets);

        let weights = Tensor::<B, 1>::from_data(TensorData::new(batch.weights, [size]), &device);
        let td_errors = predicted - targets;
        let loss = (td_errors.clone().powf_scalar(2.0) * weights).mean();

        let td_values = td_errors
            .detach()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap_or_default();
        let loss_value = Self::tensor_to_f32(loss.clone());

        let grads = loss.backward();
        let mut grads = GradientsParams::from_grads(grads, &self.policy);
        let grad_norm = clip_grad_norm(&self.policy, &mut grads, self.config.grad_clip_norm);
        tracing::trace!(grad_norm, "gradient norm before clipping");
        let learning_rate: LearningRate = self.config.learning_rate;
        self.policy = self
            .optimizer
            .step(learning_rate, self.policy.clone(), grads);

        self.memory.update_priorities(&batch.indices, &td_values);
        self.train_steps += 1;
        if self.train_steps % self.config.target_update_every.max(1) == 0 {
            self.update_target();
        }
        if self.train_steps % self.config.epsilon_decay_every.max(1) == 0
            && self.epsilon > self.config.epsilon_min
        {
            self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
            tracing::debug!(epsilon = self.epsilon, "exploration decayed");
        }
        Some(loss_value)
    }

    /// Hard copy of the policy weights into the target network.
    pub fn update_target(&mut self) {
        self.target = self.policy.valid();
        tracing::debug!(train_steps = self.train_steps, "target network synced");
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AgentError> {
        let path = path.as_ref();
        let record: NetworkRecord<B::InnerBackend> = self.policy.valid().into_record();
        let weights = BinBytesRecorder::<FullPrecisionSettings>::new().record(record, ())?;
        let checkpoint = AgentCheckpoint {
            metadata: self.metadata(),
            weights,
        };
        let bytes = bincode::serde::encode_to_vec(&checkpoint, bincode::config::standard())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        tracing::info!(path = %path.display(), "checkpoint saved");
        Ok(())
    }

    /// Replaces policy and target weights with the checkpoint at `path`.
    ///
    /// On any error the agent keeps its current weights.
    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<CheckpointMetadata, AgentError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let (checkpoint, _): (AgentCheckpoint, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        let metadata = checkpoint.metadata;
        self.check_compatible(&metadata)?;

        let record = BinBytesRecorder::<FullPrecisionSettings>::new()
            .load::<NetworkRecord<B>>(checkpoint.weights, &self.device)?;
        let loaded = self.policy.clone().load_record(record);
        if loaded.layer_shapes() != self.policy.layer_shapes() {
            return Err(AgentError::IncompatibleCheckpoint(format!(
                "layer shapes {:?} do not match {:?}",
                loaded.layer_shapes(),
                self.policy.layer_shapes()
            )));
        }
        self.policy = loaded;
        self.update_target();
        self.train_steps = metadata.train_steps;
        self.epsilon = metadata.epsilon.clamp(0.0, 1.0);
        tracing::info!(path = %path.display(), "checkpoint loaded");
        Ok(metadata)
    }

    fn check_compatible(&self, metadata: &CheckpointMetadata) -> Result<(), AgentError> {
        if metadata.state_features != STATE_FEATURES {
            return Err(AgentError::IncompatibleCheckpoint(format!(
                "expected {STATE_FEATURES} state features, checkpoint has {}",
                metadata.state_features
            )));
        }
        if metadata.action_count != self.action_space.len() {
            return Err(AgentError::IncompatibleCheckpoint(format!(
                "expected {} actions, checkpoint has {}",
                self.action_space.len(),
                metadata.action_count
            )));
        }
        if metadata.hidden != self.config.hidden {
            return Err(AgentError::IncompatibleCheckpoint(format!(
                "hidden layers {:?} do not match {:?}",
                metadata.hidden, self.config.hidden
            )));
        }
        self.action_space
            .ensure_compatible(metadata.action_space_fingerprint)?;
        Ok(())
    }

    fn tensor_to_f32(tensor: Tensor<B, 1>) -> f32 {
        tensor
            .detach()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map(|mut values| values.pop().unwrap_or_default())
            .unwrap_or_default()
    }
}

/// Rescales `grads` in place so that their combined L2 norm is at most
/// `max_norm`. Returns the norm measured before rescaling.
fn clip_grad_norm<B: AutodiffBackend>(
    network: &QNetwork<B>,
    grads: &mut GradientsParams,
    max_norm: f32,
) -> f32 {
    let (weights, biases) = network.parameter_ids();
    let mut squared = 0.0;
    for id in &weights {
        if let Some(grad) = grads.get::<B::InnerBackend, 2>(*id) {
            squared += squared_sum(grad);
        }
    }
    for id in &biases {
        if let Some(grad) = grads.get::<B::InnerBackend, 1>(*id) {
            squared += squared_sum(grad);
        }
    }
    let norm = squared.sqrt();
    if !norm.is_finite() || norm <= max_norm {
        return norm;
    }

    let scale = max_norm / (norm + 1.0e-6);
    for id in weights {
        if let Some(grad) = grads.remove::<B::InnerBackend, 2>(id) {
            grads.register(id, grad.mul_scalar(scale));
        }
    }
    for id in biases {
        if let Some(grad) = grads.remove::<B::InnerBackend, 1>(id) {
            grads.register(id, grad.mul_scalar(scale));
        }
    }
    norm
}

fn squared_sum<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f32 {
    tensor
        .powf_scalar(2.0)
        .sum()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .ok()
        .and_then(|values| values.first().copied())
        .unwrap_or_default()
}

/// Reads only the metadata block of a checkpoint.
pub fn read_checkpoint_metadata(path: impl AsRef<Path>) -> Result<CheckpointMetadata, AgentError> {
    let bytes = fs::read(path)?;
    let (checkpoint, _): (AgentCheckpoint, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
    Ok(checkpoint.metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    use crate::game::GameBuilder;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn small_config() -> AgentConfig {
        AgentConfig {
            hidden: vec![16, 8],
            batch_size: 4,
            ..AgentConfig::default()
        }
    }

    fn agent(config: AgentConfig) -> DqnAgent<TestBackend> {
        DqnAgent::new(config, Arc::new(ActionSpace::standard()), Default::default())
    }

    #[test]
    fn defaults_follow_reference_hyper_parameters() {
        let config = AgentConfig::default();
        assert_eq!(config.hidden, vec![512, 256, 128]);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.replay.capacity, 100_000);
        assert_eq!(config.target_update_every, 10);
        assert_eq!(config.epsilon_decay_every, 20);
    }

    #[test]
    fn config_accepts_partial_json() {
        let config = AgentConfig::from_json(r#"{"batch_size": 32, "hidden": [64]}"#).expect("json");
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.hidden, vec![64]);
        assert_eq!(config.gamma, 0.99);
    }

    #[test]
    fn greedy_choice_is_legal() {
        let agent = agent(small_config());
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let view = game.state_for_player(0).expect("view");
        let action = agent.greedy_action(&view, &view.legal_actions);
        assert!(view.legal_actions.contains(&action));
    }

    #[test]
    fn epsilon_floor_is_respected() {
        let mut agent = agent(AgentConfig {
            epsilon: 0.0105,
            epsilon_decay: 0.5,
            epsilon_decay_every: 1,
            ..small_config()
        });
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let view = game.state_for_player(0).expect("view");
        let state = StateEncoder::encode(&view);
        for action in [0, 5, 60, 60] {
            agent.remember(Transition {
                state,
                action,
                reward: 0.0,
                next_state: state,
                done: false,
            });
        }
        assert!(agent.train().is_some());
        assert_eq!(agent.epsilon(), 0.01);
        assert!(agent.train().is_some());
        assert_eq!(agent.epsilon(), 0.01);
    }

    fn rewarded_transitions(agent: &mut DqnAgent<TestBackend>, view: &GameStateView) {
        let state = StateEncoder::encode(view);
        for action in [0, 5, 60, 60] {
            agent.remember(Transition {
                state,
                action,
                reward: 1.0,
                next_state: state,
                done: true,
            });
        }
    }

    fn max_gap(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max)
    }

    fn target_q_values(agent: &DqnAgent<TestBackend>, view: &GameStateView) -> Vec<f32> {
        agent
            .target()
            .forward_state(view, &Default::default())
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .expect("f32 values")
    }

    #[test]
    fn target_network_syncs_every_k_updates() {
        let mut agent = agent(AgentConfig {
            target_update_every: 2,
            learning_rate: 1.0e-2,
            ..small_config()
        });
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let view = game.state_for_player(0).expect("view");
        rewarded_transitions(&mut agent, &view);
        assert!(max_gap(&agent.q_values(&view), &target_q_values(&agent, &view)) < 1.0e-6);

        assert!(agent.train().is_some());
        assert!(max_gap(&agent.q_values(&view), &target_q_values(&agent, &view)) > 1.0e-6);

        assert!(agent.train().is_some());
        assert!(max_gap(&agent.q_values(&view), &target_q_values(&agent, &view)) < 1.0e-6);
    }

    #[test]
    fn training_rewrites_sampled_priorities() {
        let mut agent = agent(small_config());
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let view = game.state_for_player(0).expect("view");
        rewarded_transitions(&mut agent, &view);
        assert!((0..4).all(|slot| agent.memory().priority(slot) == Some(1.0)));

        assert!(agent.train().is_some());
        let moved = (0..4)
            .filter(|&slot| agent.memory().priority(slot) != Some(1.0))
            .count();
        assert!(moved >= 1);
        let epsilon = agent.config().replay.epsilon;
        assert!((0..4).all(|slot| agent.memory().priority(slot).is_some_and(|p| p >= epsilon)));
    }

    #[test]
    fn gradient_clipping_bounds_the_combined_norm() {
        let device = Default::default();
        let network = QNetwork::<TestBackend>::new(STATE_FEATURES, &[16, 8], 61, &device);
        let input = Tensor::<TestBackend, 2>::ones([4, STATE_FEATURES], &device);
        let loss = network.forward(input).sum().mul_scalar(1000.0);
        let mut grads = GradientsParams::from_grads(loss.backward(), &network);

        let before = clip_grad_norm(&network, &mut grads, 1.0);
        assert!(before > 1.0);
        let after = clip_grad_norm(&network, &mut grads, f32::INFINITY);
        assert!((after - 1.0).abs() < 1.0e-3, "norm after clipping: {after}");
    }

    #[test]
    fn double_precision_backends_report_real_q_values() {
        type DoubleBackend = Autodiff<NdArray<f64>>;
        let agent = DqnAgent::<DoubleBackend>::new(
            small_config(),
            Arc::new(ActionSpace::standard()),
            Default::default(),
        );
        let game = GameBuilder::new(2).expect("builder").build().expect("game");
        let view = game.state_for_player(0).expect("view");
        let q_values = agent.q_values(&view);
        assert_eq!(q_values.len(), 61);
        assert!(q_values.iter().any(|value| *value != 0.0));
        assert!(q_values.iter().all(|value| value.is_finite()));
    }
}
