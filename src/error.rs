use thiserror::Error;

use crate::action::{ActionIndex, PlayerId};

/// Errors that can occur when manipulating the game state.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("player index {0} is out of range")]
    InvalidPlayer(PlayerId),
    #[error("action index {0} is not part of the action space")]
    UnknownAction(ActionIndex),
    #[error("game is already over")]
    GameOver,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("seat {seat} decodes actions differently from the engine: {source}")]
    ActionSpaceMismatch {
        seat: PlayerId,
        #[source]
        source: ActionSpaceError,
    },
}

/// Problems found while loading or validating an action-space mapping.
#[derive(Debug, Error)]
pub enum ActionSpaceError {
    #[error("failed to read action space: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed action space JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown action identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("index {index} is outside the dense range 0..{size}")]
    IndexOutOfRange { index: usize, size: usize },
    #[error("index {0} is assigned to more than one action")]
    DuplicateIndex(usize),
    #[error("required action '{0}' is missing")]
    MissingAction(String),
    #[error("action space fingerprint mismatch (expected {expected:#018x}, found {found:#018x})")]
    FingerprintMismatch { expected: u64, found: u64 },
}

/// Failures raised by the learning agent, mostly around checkpoints.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode checkpoint: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to (de)serialize network weights: {0}")]
    Recorder(#[from] burn::record::RecorderError),
    #[error("incompatible checkpoint: {0}")]
    IncompatibleCheckpoint(String),
    #[error(transparent)]
    ActionSpace(#[from] ActionSpaceError),
}
