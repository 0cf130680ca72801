//! End-to-end session scenarios on the headless engine
//!
//! Each test drives a `Session` the way the UI would and checks the live
//! graph, the scheduled notes and the notification channel.

use drone_sequencer::config::CompositionDefaults;
use drone_sequencer::engine::{
    AudioEngine, NodeKind, NodeRef, PatternHandle, PatternSpec, TickCallback, Transport, VoiceRef,
};
use drone_sequencer::params::{ModulationOptions, PolySynthOptions};
use drone_sequencer::{
    ChainError, EffectKind, EngineError, HeadlessEngine, NotificationCategory,
    NotificationConsumer, ParamError, Session, SessionConfig, SessionError, TrackId, resolve,
};
use ringbuf::traits::Consumer;
use serde_json::json;
use std::sync::Arc;

fn session_with(config: SessionConfig) -> (Session, HeadlessEngine, NotificationConsumer) {
    let engine = HeadlessEngine::with_seed(7);
    let (session, rx) = Session::new(Arc::new(engine.clone()), config);
    (session, engine, rx)
}

fn fixed_config() -> SessionConfig {
    SessionConfig {
        detune_rand_fraction: 0.0,
        composition: CompositionDefaults {
            note_length: 2.0,
            rand_note_length: 0.0,
            interval: 1.0,
            rand_interval: 0.0,
        },
        ..SessionConfig::default()
    }
}

fn voice_of(session: &Session, track: TrackId) -> VoiceRef {
    session.audio(track).and_then(|a| a.voice()).unwrap()
}

/// Resolving base 10 with 20% randomization stays inside [8, 12]
#[test]
fn test_randomized_value_stays_in_range() {
    for _ in 0..1000 {
        let value = resolve(10.0, 0.2);
        assert!((8.0..=12.0).contains(&value), "{} out of range", value);
        assert_eq!(value, (value * 100.0).round() / 100.0);
    }
}

/// Fixed composition: one note per second, each two seconds long, played one
/// interval after its tick
#[test]
fn test_fixed_composition_schedules_notes() {
    let (mut session, engine, _rx) = session_with(fixed_config());
    let track = session.add_track().unwrap();
    session.set_playing(true).unwrap();

    engine.advance(4.5);

    let voice = voice_of(&session, track);
    let notes = engine.notes(voice.id());
    let scale = &session.track(track).unwrap().composition.notes.scale;

    assert_eq!(notes.len(), 5);
    for (i, note) in notes.iter().enumerate() {
        assert_eq!(note.start, i as f64 + 1.0);
        assert_eq!(note.end - note.start, 2.0);
        assert_eq!(note.detune, 2.0);
        assert!(scale.contains(&note.note));
    }
}

/// Delay added after an auto filter lands between the filter and the output
#[test]
fn test_delay_after_auto_filter_routing() {
    let (mut session, engine, _rx) = session_with(SessionConfig::default());
    let track = session.add_track().unwrap();
    session.add_effect(track, EffectKind::AutoFilter).unwrap();
    session.add_effect(track, EffectKind::Delay).unwrap();

    let voice = voice_of(&session, track);
    assert_eq!(
        engine.chain_kinds(voice.id()),
        vec![
            NodeKind::Voice,
            NodeKind::Modulation,
            NodeKind::Effect(EffectKind::AutoFilter),
            NodeKind::Effect(EffectKind::Delay),
            NodeKind::Output,
        ]
    );

    let params = session.track(track).unwrap();
    let audio = session.audio(track).unwrap();
    assert_eq!(audio.declarative_ids(), params.signal_chain.ids());
}

/// Editing the filter rate reaches the filter node once and nothing else
#[test]
fn test_filter_edit_is_pushed_once() {
    let (mut session, engine, _rx) = session_with(SessionConfig::default());
    let track = session.add_track().unwrap();
    let filter = session.add_effect(track, EffectKind::AutoFilter).unwrap();

    let audio = session.audio(track).unwrap();
    let filter_node = audio.module(&filter).unwrap().node().id();
    let modulation_node = audio.modulation().unwrap().node().id();
    let voice = voice_of(&session, track);
    let before = engine.set_calls(filter_node);

    let report = session
        .set_module_field(track, &filter, "options.frequency", 0.25)
        .unwrap();

    assert_eq!(report.pushed, vec![filter.clone()]);
    assert_eq!(engine.set_calls(filter_node), before + 1);
    assert_eq!(engine.set_calls(voice.id()), 0);
    assert_eq!(engine.set_calls(modulation_node), 0);
}

/// Stopping releases every note, pending ones included
#[test]
fn test_stop_leaves_nothing_sounding() {
    let (mut session, engine, _rx) = session_with(fixed_config());
    let a = session.add_track().unwrap();
    let b = session.add_track().unwrap();
    session.set_playing(true).unwrap();
    engine.advance(3.2);

    session.set_playing(false).unwrap();
    assert!(!engine.transport_state().is_started());
    for track in [a, b] {
        assert_eq!(voice_of(&session, track).sounding_notes(), 0);
    }

    // no ticks while stopped
    let count = engine.notes(voice_of(&session, a).id()).len();
    engine.advance(10.0);
    assert_eq!(engine.notes(voice_of(&session, a).id()).len(), count);
}

/// Restarting resumes ticking from the current time
#[test]
fn test_restart_after_stop() {
    let (mut session, engine, _rx) = session_with(fixed_config());
    let track = session.add_track().unwrap();

    session.set_playing(true).unwrap();
    engine.advance(1.5);
    session.set_playing(false).unwrap();
    engine.advance(5.0);
    session.set_playing(true).unwrap();
    engine.advance(0.5);

    let notes = engine.notes(voice_of(&session, track).id());
    let last = notes.last().unwrap();
    assert!(last.start >= 6.5);
}

/// A timing edit while playing rebuilds the pattern and keeps it running
#[test]
fn test_timing_edit_while_playing() {
    let (mut session, engine, _rx) = session_with(fixed_config());
    let track = session.add_track().unwrap();
    session.set_playing(true).unwrap();
    engine.advance(2.5);

    session.set_track_field(track, "interval", 3.0).unwrap();
    assert_eq!(engine.live_pattern_count(), 1);

    let before = engine.notes(voice_of(&session, track).id()).len();
    engine.advance(6.5);
    let after = engine.notes(voice_of(&session, track).id()).len();
    assert_eq!(after - before, 3);
}

#[test]
fn test_delete_track_disposes_nodes() {
    let (mut session, engine, _rx) = session_with(SessionConfig::default());
    let keep = session.add_track().unwrap();
    let gone = session.add_track().unwrap();
    session.add_effect(gone, EffectKind::Reverb).unwrap();
    assert_eq!(engine.live_node_count(), 1 + 2 + 3);

    session.delete_track(gone).unwrap();
    assert_eq!(engine.live_node_count(), 1 + 2);
    assert_eq!(engine.live_pattern_count(), 1);
    assert!(session.audio(gone).is_none());
    assert_eq!(session.track_ids(), vec![keep]);

    let next = session.add_track().unwrap();
    assert_eq!(next, TrackId(2));
}

#[test]
fn test_volume_is_clamped() {
    let (mut session, engine, _rx) = session_with(SessionConfig::default());
    let output = session.output().unwrap().id();

    session.set_volume(-4.0).unwrap();
    assert_eq!(session.global().volume, 0.0);
    session.set_volume(0.3).unwrap();
    assert_eq!(session.global().volume, 0.3);
    assert_eq!(engine.set_calls(output), 2);
}

#[test]
fn test_rejected_edit_is_notified() {
    let (mut session, _engine, mut rx) = session_with(SessionConfig::default());
    let track = session.add_track().unwrap();
    let source = session.track(track).unwrap().signal_chain.source().id.clone();

    let result = session.set_module_field(track, &source, "options.detune", json!("sharp"));
    assert!(matches!(
        result,
        Err(SessionError::Param(ParamError::InvalidValue { .. }))
    ));

    let notification = rx.try_pop().unwrap();
    assert_eq!(notification.category, NotificationCategory::Params);
}

/// Engine whose output node cannot be created
struct NoOutputEngine(HeadlessEngine);

impl AudioEngine for NoOutputEngine {
    fn create_output(&self, _gain: f64) -> Result<NodeRef, EngineError> {
        Err(EngineError::Unavailable("no audio device".to_string()))
    }

    fn create_voice(&self, options: &PolySynthOptions) -> Result<VoiceRef, EngineError> {
        self.0.create_voice(options)
    }

    fn create_modulation(&self, options: &ModulationOptions) -> Result<NodeRef, EngineError> {
        self.0.create_modulation(options)
    }

    fn create_effect(&self, kind: EffectKind) -> Result<NodeRef, EngineError> {
        self.0.create_effect(kind)
    }

    fn create_pattern(
        &self,
        spec: PatternSpec,
        callback: TickCallback,
    ) -> Result<Box<dyn PatternHandle>, EngineError> {
        self.0.create_pattern(spec, callback)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.0.transport()
    }
}

#[test]
fn test_missing_output_rejects_tracks() {
    let engine = HeadlessEngine::new();
    let (mut session, mut rx) = Session::new(
        Arc::new(NoOutputEngine(engine.clone())),
        SessionConfig::default(),
    );
    assert!(session.output().is_none());
    assert_eq!(
        rx.try_pop().map(|n| n.category),
        Some(NotificationCategory::Routing)
    );

    let result = session.add_track();
    assert!(matches!(
        result,
        Err(SessionError::Chain(ChainError::OutputMissing))
    ));
    assert!(session.track_ids().is_empty());
    assert_eq!(engine.live_node_count(), 0);
    assert_eq!(engine.live_pattern_count(), 0);
}
