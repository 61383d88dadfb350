pub mod agent;
pub mod greedy;
pub mod random;
pub mod registry;

pub use agent::AgentBot;
pub use greedy::GreedyBot;
pub use random::RandomBot;
pub use registry::{create_bot_from_spec, label_for_spec, load_agent};
