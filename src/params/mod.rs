// Declarative parameter model
//
// Serializable description of every track: the signal chain (one source plus
// an append-only effects tail), the composition settings, and the global
// play/volume state. The live audio graph mirrors this tree through
// `crate::audio`.

pub mod bounds;
pub mod chain;
pub mod path;
pub mod persistence;
pub mod track;
pub mod types;

pub use chain::SignalChain;
pub use track::{
    CompositionParams, CompositionState, GlobalState, NotesParams, ParamsState, TrackParams,
};
pub use types::{
    AutoFilterOptions, DelayOptions, EffectKind, EffectModule, Envelope, FilterType, Module,
    ModuleId, ModuleName, ModuleType, ModulationOptions, NodeOptions, PolySynthOptions,
    ReverbOptions, SourceModule, TrackId, Waveform,
};
