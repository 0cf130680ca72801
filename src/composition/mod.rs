// Composition - What to play and when
//
// Randomized timing values, scale resolution and the per-track pattern
// state machine that triggers the source voice.

pub mod randomize;
pub mod scale;
pub mod scheduler;

pub use randomize::{calc_max, calc_min, resolve};
pub use scale::{IntervalScaleLibrary, ScaleLibrary, ScaleResolver};
pub use scheduler::{CompositionScheduler, NoteTick, PatternInputs, SchedulerState};
