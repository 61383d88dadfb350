pub mod agent;
pub mod difficulty;
pub mod encoding;
pub mod network;
pub mod replay;
pub mod selfplay;

pub use agent::{AgentConfig, CheckpointMetadata, DqnAgent, read_checkpoint_metadata};
pub use difficulty::Difficulty;
pub use encoding::{CARD_FEATURES, STATE_FEATURES, StateEncoder};
pub use network::{DEFAULT_HIDDEN, QNetwork};
pub use replay::{PrioritizedReplayBuffer, ReplayConfig, SampledBatch, Transition};
pub use selfplay::{EpisodeStats, run_episode};
