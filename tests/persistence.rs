//! Save / load of the tracks tree through a live session

use drone_sequencer::engine::{
    AudioEngine, NodeKind, NodeRef, PatternHandle, PatternSpec, TickCallback, Transport, VoiceRef,
};
use drone_sequencer::params::{ModulationOptions, PolySynthOptions};
use drone_sequencer::{
    EffectKind, EngineError, HeadlessEngine, NotificationCategory, PersistError, Session,
    SessionConfig, SessionError, TrackId,
};
use ringbuf::traits::Consumer;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn session() -> (Session, HeadlessEngine) {
    let engine = HeadlessEngine::new();
    let (session, _rx) = Session::new(Arc::new(engine.clone()), SessionConfig::default());
    (session, engine)
}

fn populated() -> (Session, HeadlessEngine, String) {
    let (mut session, engine) = session();
    let a = session.add_track().unwrap();
    let b = session.add_track().unwrap();
    let filter = session.add_effect(a, EffectKind::AutoFilter).unwrap();
    session.add_effect(a, EffectKind::Delay).unwrap();
    session.set_scale(b, "E", 2, "dorian").unwrap();
    session
        .set_module_field(a, &filter, "options.depth", 0.4)
        .unwrap();

    let encoded = session.encode_tracks().unwrap();
    (session, engine, encoded)
}

#[test]
fn test_load_rebuilds_live_graph() {
    let (_source, _engine, encoded) = populated();
    let (mut session, engine) = session();
    session.load_tracks(&encoded).unwrap();

    assert_eq!(session.track_ids(), vec![TrackId(0), TrackId(1)]);
    assert_eq!(session.encode_tracks().unwrap(), encoded);

    let voice = session.audio(TrackId(0)).and_then(|a| a.voice()).unwrap();
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

    // live and declarative chains share ids after a load
    for id in session.track_ids() {
        let params = session.track(id).unwrap();
        let audio = session.audio(id).unwrap();
        assert_eq!(audio.declarative_ids(), params.signal_chain.ids());
    }

    // new tracks never collide with loaded ids
    assert_eq!(session.add_track().unwrap(), TrackId(2));
}

#[test]
fn test_load_replaces_previous_tracks() {
    let (_source, _engine, encoded) = populated();
    let (mut session, engine) = session();
    for _ in 0..3 {
        session.add_track().unwrap();
    }

    session.load_tracks(&encoded).unwrap();
    assert_eq!(session.track_ids().len(), 2);
    // output + (voice, modulation, filter, delay) + (voice, modulation)
    assert_eq!(engine.live_node_count(), 7);
    assert_eq!(engine.live_pattern_count(), 2);
}

#[test]
fn test_loaded_effect_options_reach_nodes() {
    let (_source, _engine, encoded) = populated();
    let (mut session, engine) = session();
    session.load_tracks(&encoded).unwrap();

    let params = session.track(TrackId(0)).unwrap();
    let filter = params.signal_chain.effects()[0].id().clone();
    let node = session
        .audio(TrackId(0))
        .and_then(|a| a.module(&filter))
        .unwrap()
        .node()
        .id();

    let snapshot = engine.node(node).unwrap();
    assert_eq!(snapshot.set_calls, 1);
    assert_eq!(
        snapshot.last_options,
        Some(params.signal_chain.effects()[0].node_options())
    );
}

#[test]
fn test_rejected_load_keeps_state() {
    let (_source, _engine, encoded) = populated();
    let (mut session, engine) = session();
    session.load_tracks(&encoded).unwrap();
    let before = session.encode_tracks().unwrap();
    let nodes_before = engine.live_node_count();

    let mut tree: Value = serde_json::from_str(&encoded).unwrap();
    tree["1"]["composition"]["notes"]
        .as_object_mut()
        .unwrap()
        .remove("scaleName");
    let result = session.load_tracks(&tree.to_string());

    assert!(matches!(
        result,
        Err(SessionError::Persist(PersistError::MissingScale(_)))
    ));
    assert_eq!(session.encode_tracks().unwrap(), before);
    assert_eq!(engine.live_node_count(), nodes_before);
}

#[test]
fn test_empty_tree_clears_tracks() {
    let (_source, _engine, encoded) = populated();
    let (mut session, engine) = session();
    session.load_tracks(&encoded).unwrap();
    session.set_playing(true).unwrap();

    session.load_tracks("{}").unwrap();
    assert!(session.track_ids().is_empty());
    assert_eq!(session.encode_tracks().unwrap(), "{}");
    // only the output survives
    assert_eq!(engine.live_node_count(), 1);
    assert_eq!(engine.live_pattern_count(), 0);

    // ids stay unique after the clear
    assert_eq!(session.add_track().unwrap(), TrackId(2));
}

#[test]
fn test_missing_timing_is_rejected() {
    let (_source, _engine, encoded) = populated();
    let (mut session, _engine) = session();

    let mut tree: Value = serde_json::from_str(&encoded).unwrap();
    tree["0"]["composition"]
        .as_object_mut()
        .unwrap()
        .remove("interval");

    assert!(matches!(
        session.load_tracks(&tree.to_string()),
        Err(SessionError::Persist(PersistError::MissingTiming(_)))
    ));
    assert!(session.track_ids().is_empty());
}

#[test]
fn test_garbage_is_rejected_and_notified() {
    let engine = HeadlessEngine::new();
    let (mut session, mut rx) = Session::new(Arc::new(engine), SessionConfig::default());

    assert!(matches!(
        session.load_tracks("not json"),
        Err(SessionError::Persist(PersistError::Json(_)))
    ));
    assert_eq!(
        rx.try_pop().map(|n| n.category),
        Some(NotificationCategory::Persistence)
    );
}

/// Headless engine that tracks the peak number of live patterns and can
/// refuse the next pattern creations
struct PatternWatch {
    engine: HeadlessEngine,
    peak: AtomicUsize,
    refuse: AtomicUsize,
}

impl PatternWatch {
    fn new(engine: HeadlessEngine) -> Self {
        Self {
            engine,
            peak: AtomicUsize::new(0),
            refuse: AtomicUsize::new(0),
        }
    }
}

impl AudioEngine for PatternWatch {
    fn create_output(&self, gain: f64) -> Result<NodeRef, EngineError> {
        self.engine.create_output(gain)
    }

    fn create_voice(&self, options: &PolySynthOptions) -> Result<VoiceRef, EngineError> {
        self.engine.create_voice(options)
    }

    fn create_modulation(&self, options: &ModulationOptions) -> Result<NodeRef, EngineError> {
        self.engine.create_modulation(options)
    }

    fn create_effect(&self, kind: EffectKind) -> Result<NodeRef, EngineError> {
        self.engine.create_effect(kind)
    }

    fn create_pattern(
        &self,
        spec: PatternSpec,
        callback: TickCallback,
    ) -> Result<Box<dyn PatternHandle>, EngineError> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(EngineError::Unavailable("pattern refused".to_string()));
        }

        let pattern = self.engine.create_pattern(spec, callback)?;
        self.peak
            .fetch_max(self.engine.live_pattern_count(), Ordering::SeqCst);
        Ok(pattern)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.engine.transport()
    }
}

/// Reloading while playing never runs two patterns for one track
#[test]
fn test_reload_while_playing_keeps_one_pattern_per_track() {
    let engine = HeadlessEngine::new();
    let watch = Arc::new(PatternWatch::new(engine.clone()));
    let (mut session, _rx) = Session::new(watch.clone(), SessionConfig::default());
    session.add_track().unwrap();
    session.add_track().unwrap();
    session.set_playing(true).unwrap();
    engine.advance(3.0);

    let encoded = session.encode_tracks().unwrap();
    watch.peak.store(0, Ordering::SeqCst);
    session.load_tracks(&encoded).unwrap();

    assert_eq!(watch.peak.load(Ordering::SeqCst), 2);
    assert_eq!(engine.live_pattern_count(), 2);
    assert!(engine.transport_state().is_started());

    // the reloaded patterns keep ticking
    let voice = session.audio(TrackId(0)).and_then(|a| a.voice()).unwrap();
    engine.advance(2.5);
    assert!(!engine.notes(voice.id()).is_empty());
}

/// A pattern failure during a load rebuilds the previous tracks
#[test]
fn test_failed_pattern_during_load_restores_tracks() {
    let (_source, _engine, encoded) = populated();

    let engine = HeadlessEngine::new();
    let watch = Arc::new(PatternWatch::new(engine.clone()));
    let (mut session, _rx) = Session::new(watch.clone(), SessionConfig::default());
    let kept = session.add_track().unwrap();
    session.add_effect(kept, EffectKind::Reverb).unwrap();
    session.set_playing(true).unwrap();
    let before = session.encode_tracks().unwrap();
    let nodes_before = engine.live_node_count();

    watch.refuse.store(1, Ordering::SeqCst);
    assert!(matches!(
        session.load_tracks(&encoded),
        Err(SessionError::Engine(EngineError::Unavailable(_)))
    ));

    assert_eq!(session.track_ids(), vec![kept]);
    assert_eq!(session.encode_tracks().unwrap(), before);
    assert_eq!(engine.live_node_count(), nodes_before);
    assert_eq!(engine.live_pattern_count(), 1);

    let audio = session.audio(kept).unwrap();
    let params = session.track(kept).unwrap();
    assert_eq!(audio.declarative_ids(), params.signal_chain.ids());
}
