// Live audio side - Engine handles mirroring the declarative chains
//
// `builder` is the only code that changes topology; `sync` only pushes
// parameters into nodes that already exist.

pub mod builder;
pub mod module;
pub mod sync;

pub use module::{AudioModule, AudioModuleKind, LiveHandle, SourceSlot, TrackAudioState};
pub use sync::{ModuleSynchronizer, SyncReport};
