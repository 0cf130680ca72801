// Composition scheduler - Per-track pattern lifecycle
//
// States: Unbuilt -> Stopped (built) <-> Started.
// A rebuild always disposes the previous pattern before creating the next
// one, so a track never has two patterns firing. Rebuilding a started track
// restarts the new pattern right away.

use super::randomize;
use crate::audio::SourceSlot;
use crate::engine::{AudioEngine, PatternHandle, PatternSpec, TickCallback, Transport};
use crate::error::EngineError;
use crate::messaging::{Notification, NotificationCategory, Notifier};
use crate::params::{CompositionState, TrackId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Unbuilt,
    Stopped,
    Started,
}

/// Everything a pattern captures when it is built
#[derive(Debug, Clone, PartialEq)]
pub struct PatternInputs {
    pub composition: CompositionState,
    /// Source detune base in cents
    pub detune: f64,
    pub detune_rand_fraction: f64,
}

/// One resolved note event
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTick {
    pub note: String,
    pub length: f64,
    /// Offset from the tick time to the note-on
    pub interval: f64,
    pub detune: f64,
}

impl NoteTick {
    /// Resolve a tick; `value` is the note the pattern picked, if any
    ///
    /// Returns `None` when there is no note to play.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, inputs: &PatternInputs, value: &str) -> Option<Self> {
        let compo = &inputs.composition;
        let note = if value.is_empty() {
            compo.scale.choose(rng)?.clone()
        } else {
            value.to_string()
        };

        Some(Self {
            note,
            length: randomize::resolve_with(
                rng,
                compo.base_note_length,
                compo.note_length_rand_fraction,
            ),
            interval: randomize::resolve_with(
                rng,
                compo.base_interval,
                compo.interval_rand_fraction,
            ),
            detune: randomize::resolve_with(rng, inputs.detune, inputs.detune_rand_fraction),
        })
    }
}

fn tick_callback(
    track: TrackId,
    inputs: PatternInputs,
    source: SourceSlot,
    notifier: Notifier,
) -> TickCallback {
    let mut rng = StdRng::from_entropy();

    Box::new(move |time, value| {
        let voice = match source.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let Some(voice) = voice else {
            tracing::warn!(track = %track, "tick skipped, no live source voice");
            notifier.send(Notification::warning(
                NotificationCategory::Scheduling,
                format!("Track {}: tick skipped, source not built", track),
            ));
            return;
        };

        let Some(tick) = NoteTick::draw(&mut rng, &inputs, value) else {
            tracing::debug!(track = %track, "tick skipped, empty scale");
            return;
        };

        tracing::debug!(
            track = %track,
            note = %tick.note,
            detune = tick.detune,
            interval = tick.interval,
            length = tick.length,
            "tick"
        );

        let played = voice
            .set_detune(tick.detune)
            .and_then(|_| voice.trigger_attack_release(&tick.note, tick.length, time + tick.interval));
        if let Err(e) = played {
            tracing::warn!(track = %track, error = %e, "tick failed");
            notifier.send(Notification::warning(
                NotificationCategory::Scheduling,
                format!("Track {}: {}", track, e),
            ));
        }
    })
}

/// Owns the single active pattern of one track
pub struct CompositionScheduler {
    track: TrackId,
    source: SourceSlot,
    notifier: Notifier,
    inputs: Option<PatternInputs>,
    pattern: Option<Box<dyn PatternHandle>>,
    state: SchedulerState,
}

impl CompositionScheduler {
    pub fn new(track: TrackId, source: SourceSlot, notifier: Notifier) -> Self {
        Self {
            track,
            source,
            notifier,
            inputs: None,
            pattern: None,
            state: SchedulerState::Unbuilt,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn inputs(&self) -> Option<&PatternInputs> {
        self.inputs.as_ref()
    }

    /// Firing interval of the active pattern
    pub fn pattern_interval(&self) -> Option<f64> {
        self.pattern.as_ref().map(|p| p.interval())
    }

    /// Dispose the current pattern and build a new one from `inputs`
    pub fn rebuild(
        &mut self,
        engine: &dyn AudioEngine,
        inputs: PatternInputs,
    ) -> Result<(), EngineError> {
        let was_started = self.state == SchedulerState::Started;
        self.teardown();

        let compo = &inputs.composition;
        let interval = randomize::resolve(compo.base_interval, compo.interval_rand_fraction);
        let spec = PatternSpec {
            interval,
            values: compo.scale.clone(),
        };
        let callback = tick_callback(
            self.track,
            inputs.clone(),
            self.source.clone(),
            self.notifier.clone(),
        );

        self.pattern = Some(engine.create_pattern(spec, callback)?);
        self.inputs = Some(inputs);
        self.state = SchedulerState::Stopped;
        tracing::debug!(track = %self.track, interval, "pattern built");

        if was_started {
            self.start(engine.transport().as_ref())?;
        }
        Ok(())
    }

    /// Rebuild only if `inputs` differ from the ones the pattern captured
    ///
    /// Returns true when a rebuild happened.
    pub fn refresh(
        &mut self,
        engine: &dyn AudioEngine,
        inputs: PatternInputs,
    ) -> Result<bool, EngineError> {
        if self.state != SchedulerState::Unbuilt && self.inputs.as_ref() == Some(&inputs) {
            return Ok(false);
        }

        let scale_changed = self
            .inputs
            .as_ref()
            .is_some_and(|old| old.composition.scale != inputs.composition.scale);
        if scale_changed {
            if let Some(pattern) = self.pattern.as_ref() {
                pattern.set(None, Some(inputs.composition.scale.clone()))?;
            }
        }

        self.rebuild(engine, inputs)?;
        Ok(true)
    }

    /// Start the shared transport and this track's pattern
    pub fn start(&mut self, transport: &dyn Transport) -> Result<(), EngineError> {
        let Some(pattern) = self.pattern.as_ref() else {
            return Ok(());
        };

        transport.start();
        pattern.start()?;
        self.state = SchedulerState::Started;
        Ok(())
    }

    /// Stop the pattern, release every note, pause the transport
    pub fn stop(&mut self, transport: &dyn Transport) -> Result<(), EngineError> {
        if self.state != SchedulerState::Started {
            return Ok(());
        }

        if let Some(pattern) = self.pattern.as_ref() {
            pattern.stop()?;
        }
        self.release_notes();
        transport.pause();
        self.state = SchedulerState::Stopped;
        Ok(())
    }

    pub fn set_playing(&mut self, playing: bool, transport: &dyn Transport) -> Result<(), EngineError> {
        if playing {
            self.start(transport)
        } else {
            self.stop(transport)
        }
    }

    /// Stop and dispose the pattern; the scheduler returns to Unbuilt
    pub fn dispose(&mut self) {
        self.teardown();
        self.release_notes();
        self.inputs = None;
    }

    fn teardown(&mut self) {
        if let Some(pattern) = self.pattern.take() {
            if let Err(e) = pattern.stop() {
                tracing::warn!(track = %self.track, error = %e, "pattern stop failed");
            }
            pattern.dispose();
        }
        self.state = SchedulerState::Unbuilt;
    }

    fn release_notes(&self) {
        let voice = match self.source.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(voice) = voice {
            if let Err(e) = voice.release_all() {
                tracing::warn!(track = %self.track, error = %e, "release failed");
            }
        }
    }
}

impl std::fmt::Debug for CompositionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionScheduler")
            .field("track", &self.track)
            .field("state", &self.state)
            .field("interval", &self.pattern_interval())
            .finish()
    }
}
