// Drone Sequencer - Library exports

pub mod audio;
pub mod composition;
pub mod config;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod params;
pub mod session;

// Re-export commonly used types for convenience
pub use audio::{ModuleSynchronizer, SyncReport, TrackAudioState};
pub use composition::{CompositionScheduler, ScaleLibrary, ScaleResolver, calc_max, calc_min, resolve};
pub use config::SessionConfig;
pub use engine::{AudioEngine, HeadlessEngine, Transport, TransportState};
pub use error::{ChainError, EngineError, ParamError, PersistError, SessionError, SessionResult};
pub use messaging::{Notification, NotificationCategory, NotificationConsumer, NotificationLevel};
pub use params::{EffectKind, ModuleId, ParamsState, SignalChain, TrackId, TrackParams};
pub use session::Session;
