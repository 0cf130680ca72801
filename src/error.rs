// Error types - one enum per subsystem, wrapped by SessionError at the API surface

use crate::params::{ModuleId, TrackId};

/// Failures reported by the audio engine collaborator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Node {0} has been disposed")]
    NodeDisposed(u64),

    #[error("Connection {from} -> {to} would create a cycle")]
    Cycle { from: u64, to: u64 },

    #[error("Options do not apply to node kind {0}")]
    OptionsMismatch(String),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Chain Builder precondition violations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("Global output node does not exist yet")]
    OutputMissing,

    #[error("Track {0} has no live source voice")]
    SourceMissing(TrackId),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Errors raised while editing the declarative parameter tree
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    #[error("Unknown module {module} on track {track}")]
    UnknownModule { track: TrackId, module: ModuleId },

    #[error("Unknown field path: {0}")]
    UnknownField(String),

    #[error("Field {0} cannot be edited")]
    ImmutableField(String),

    #[error("Invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("Unknown scale: {0}")]
    UnknownScale(String),
}

/// Rejections of a decoded external parameter tree
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Malformed parameter tree: {0}")]
    Malformed(String),

    #[error("Track {0} has no scale name")]
    MissingScale(String),

    #[error("Track {0} is missing its timing bases")]
    MissingTiming(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Top-level error for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub type SessionResult<T> = Result<T, SessionError>;
