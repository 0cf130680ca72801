// Headless engine - In-process audio engine on a virtual clock
//
// Implements every engine trait without producing sound:
// - Nodes record each options push, their connections and disposal
// - Voices record the notes they were asked to play
// - Patterns fire their callback at start + k * interval while the
//   transport is started, as the clock is moved with `advance`
//
// Used by the demo binary and by tests to observe what the core does to the
// live graph.

use super::routing::RoutingGraph;
use super::transport::{SharedTransportState, Transport, TransportState};
use super::{
    AudioEngine, LiveNode, NodeId, NodeKind, NodeRef, PatternHandle, PatternSpec, PatternState,
    TickCallback, VoiceNode, VoiceRef,
};
use crate::error::EngineError;
use crate::params::{EffectKind, ModulationOptions, NodeOptions, PolySynthOptions};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// A note a voice was asked to play
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNote {
    pub note: String,
    pub start: f64,
    pub end: f64,
    /// Voice detune in cents when the note was triggered
    pub detune: f64,
}

impl ScheduledNote {
    /// Sounding now, or scheduled to sound later
    pub fn is_active(&self, now: f64) -> bool {
        self.end > now
    }
}

/// Everything the engine recorded about a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub set_calls: usize,
    pub last_options: Option<NodeOptions>,
    pub detune: f64,
    pub disposed: bool,
    pub outputs: Vec<NodeId>,
}

#[derive(Debug)]
struct NodeRecord {
    kind: NodeKind,
    set_calls: usize,
    last_options: Option<NodeOptions>,
    detune: f64,
    disposed: bool,
    notes: Vec<ScheduledNote>,
}

impl NodeRecord {
    fn new(kind: NodeKind, options: Option<NodeOptions>) -> Self {
        let detune = match options {
            Some(NodeOptions::PolySynth(o)) => o.detune,
            _ => 0.0,
        };
        Self {
            kind,
            set_calls: 0,
            last_options: options,
            detune,
            disposed: false,
            notes: Vec::new(),
        }
    }
}

struct PatternCore {
    id: u64,
    interval: f64,
    values: Vec<String>,
    state: PatternState,
    next_fire: Option<f64>,
    /// Taken out while the callback runs
    callback: Option<TickCallback>,
}

impl PatternCore {
    fn due_at(&self) -> Option<f64> {
        if self.state != PatternState::Started || self.interval.is_nan() || self.interval <= 0.0 {
            return None;
        }
        self.next_fire
    }
}

type PatternSlot = Arc<Mutex<PatternCore>>;

struct EngineInner {
    now: f64,
    next_id: u64,
    graph: RoutingGraph,
    nodes: HashMap<NodeId, NodeRecord>,
    patterns: BTreeMap<u64, PatternSlot>,
    rng: StdRng,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Engine handle; clones share the same graph and clock
#[derive(Clone)]
pub struct HeadlessEngine {
    inner: Arc<Mutex<EngineInner>>,
    transport: Arc<SharedTransportState>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Engine whose pattern value picks are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                now: 0.0,
                next_id: 1,
                graph: RoutingGraph::new(),
                nodes: HashMap::new(),
                patterns: BTreeMap::new(),
                rng,
            })),
            transport: Arc::new(SharedTransportState::new()),
        }
    }

    /// Current virtual time in seconds
    pub fn now(&self) -> f64 {
        lock(&self.inner).now
    }

    /// Move the clock forward, firing every due pattern in time order
    pub fn advance(&self, seconds: f64) {
        if seconds.is_nan() || seconds <= 0.0 {
            return;
        }
        let target = lock(&self.inner).now + seconds;

        loop {
            let fired = self.fire_next(target);
            if !fired {
                break;
            }
        }

        let mut inner = lock(&self.inner);
        if !self.transport.state().is_started() {
            // clock frozen for patterns while the transport is not running
            let frozen = target - inner.now;
            for slot in inner.patterns.values() {
                let mut core = lock(slot);
                if let Some(at) = core.next_fire {
                    core.next_fire = Some(at + frozen);
                }
            }
        }
        let elapsed = target - inner.now;
        inner.now = target;
        drop(inner);
        self.transport.advance_position(elapsed);
    }

    /// Fire the earliest pattern due at or before `target`
    fn fire_next(&self, target: f64) -> bool {
        if !self.transport.state().is_started() {
            return false;
        }

        let (slot, at, value) = {
            let mut inner = lock(&self.inner);

            let mut earliest: Option<(PatternSlot, f64)> = None;
            for slot in inner.patterns.values() {
                let Some(at) = lock(slot).due_at() else {
                    continue;
                };
                let best = earliest.as_ref().map(|(_, best)| *best);
                if at <= target && best.is_none_or(|best| at < best) {
                    earliest = Some((slot.clone(), at));
                }
            }

            let (slot, at) = match earliest {
                Some(found) => found,
                None => return false,
            };

            let elapsed = at - inner.now;
            if elapsed > 0.0 {
                inner.now = at;
                self.transport.advance_position(elapsed);
            }

            let mut core = lock(&slot);
            let value = core
                .values
                .choose(&mut inner.rng)
                .cloned()
                .unwrap_or_default();
            core.next_fire = Some(at + core.interval);
            drop(core);

            (slot, at, value)
        };

        let callback = lock(&slot).callback.take();
        if let Some(mut callback) = callback {
            callback(at, value.as_str());

            let mut core = lock(&slot);
            if core.state != PatternState::Disposed && core.callback.is_none() {
                core.callback = Some(callback);
            }
        }

        true
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn node(&self, id: NodeId) -> Option<NodeSnapshot> {
        let inner = lock(&self.inner);
        inner.nodes.get(&id).map(|record| NodeSnapshot {
            id,
            kind: record.kind,
            set_calls: record.set_calls,
            last_options: record.last_options,
            detune: record.detune,
            disposed: record.disposed,
            outputs: inner.graph.connections_from(id),
        })
    }

    /// Number of `set` calls the node has received
    pub fn set_calls(&self, id: NodeId) -> usize {
        self.node(id).map(|n| n.set_calls).unwrap_or(0)
    }

    /// Serial chain reachable from `start`
    pub fn chain_from(&self, start: NodeId) -> Vec<NodeId> {
        lock(&self.inner).graph.chain_from(start)
    }

    /// Kinds along the serial chain from `start`
    pub fn chain_kinds(&self, start: NodeId) -> Vec<NodeKind> {
        let inner = lock(&self.inner);
        inner
            .graph
            .chain_from(start)
            .iter()
            .filter_map(|id| inner.nodes.get(id).map(|r| r.kind))
            .collect()
    }

    /// Nodes with an edge into `id`
    pub fn inputs_of(&self, id: NodeId) -> Vec<NodeId> {
        lock(&self.inner).graph.connections_to(id)
    }

    /// Every note a voice was asked to play
    pub fn notes(&self, voice: NodeId) -> Vec<ScheduledNote> {
        lock(&self.inner)
            .nodes
            .get(&voice)
            .map(|r| r.notes.clone())
            .unwrap_or_default()
    }

    pub fn live_node_count(&self) -> usize {
        lock(&self.inner)
            .nodes
            .values()
            .filter(|r| !r.disposed)
            .count()
    }

    /// Patterns created and not yet disposed
    pub fn live_pattern_count(&self) -> usize {
        lock(&self.inner).patterns.len()
    }

    fn create_node(&self, kind: NodeKind, options: Option<NodeOptions>) -> Arc<HeadlessNode> {
        let mut inner = lock(&self.inner);
        let id = NodeId(inner.next_id);
        inner.next_id += 1;
        inner.graph.add_node(id);
        inner.nodes.insert(id, NodeRecord::new(kind, options));

        Arc::new(HeadlessNode {
            id,
            kind,
            inner: self.inner.clone(),
        })
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeadlessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("HeadlessEngine")
            .field("now", &inner.now)
            .field("nodes", &inner.nodes.len())
            .field("connections", &inner.graph.connection_count())
            .field("patterns", &inner.patterns.len())
            .finish()
    }
}

impl AudioEngine for HeadlessEngine {
    fn create_output(&self, gain: f64) -> Result<NodeRef, EngineError> {
        Ok(self.create_node(NodeKind::Output, Some(NodeOptions::Gain(gain))))
    }

    fn create_voice(&self, options: &PolySynthOptions) -> Result<VoiceRef, EngineError> {
        Ok(self.create_node(NodeKind::Voice, Some(NodeOptions::PolySynth(*options))))
    }

    fn create_modulation(&self, options: &ModulationOptions) -> Result<NodeRef, EngineError> {
        Ok(self.create_node(NodeKind::Modulation, Some(NodeOptions::Modulation(*options))))
    }

    fn create_effect(&self, kind: EffectKind) -> Result<NodeRef, EngineError> {
        Ok(self.create_node(NodeKind::Effect(kind), None))
    }

    fn create_pattern(
        &self,
        spec: PatternSpec,
        callback: TickCallback,
    ) -> Result<Box<dyn PatternHandle>, EngineError> {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;

        let core = Arc::new(Mutex::new(PatternCore {
            id,
            interval: spec.interval,
            values: spec.values,
            state: PatternState::Stopped,
            next_fire: None,
            callback: Some(callback),
        }));
        inner.patterns.insert(id, core.clone());

        Ok(Box::new(HeadlessPattern {
            core,
            inner: self.inner.clone(),
        }))
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }
}

/// Live node handle of the headless engine
pub struct HeadlessNode {
    id: NodeId,
    kind: NodeKind,
    inner: Arc<Mutex<EngineInner>>,
}

impl HeadlessNode {
    fn with_record<T>(
        &self,
        f: impl FnOnce(&mut NodeRecord, f64) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut inner = lock(&self.inner);
        let now = inner.now;
        match inner.nodes.get_mut(&self.id) {
            Some(record) if !record.disposed => f(record, now),
            _ => Err(EngineError::NodeDisposed(self.id.0)),
        }
    }

    fn require_voice(&self) -> Result<(), EngineError> {
        if self.kind == NodeKind::Voice {
            Ok(())
        } else {
            Err(EngineError::OptionsMismatch(self.kind.to_string()))
        }
    }
}

impl LiveNode for HeadlessNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn set(&self, options: &NodeOptions) -> Result<(), EngineError> {
        if !self.kind.accepts(options) {
            return Err(EngineError::OptionsMismatch(self.kind.to_string()));
        }
        self.with_record(|record, _| {
            record.set_calls += 1;
            record.last_options = Some(*options);
            if let NodeOptions::PolySynth(o) = options {
                record.detune = o.detune;
            }
            Ok(())
        })
    }

    fn connect(&self, target: &dyn LiveNode) -> Result<(), EngineError> {
        let mut inner = lock(&self.inner);
        for id in [self.id, target.id()] {
            match inner.nodes.get(&id) {
                Some(record) if !record.disposed => {}
                _ => return Err(EngineError::NodeDisposed(id.0)),
            }
        }
        inner.graph.connect(self.id, target.id())
    }

    fn disconnect(&self) -> Result<(), EngineError> {
        let mut inner = lock(&self.inner);
        if !inner.graph.contains(self.id) {
            return Err(EngineError::NodeDisposed(self.id.0));
        }
        inner.graph.disconnect(self.id);
        Ok(())
    }

    fn dispose(&self) {
        let mut inner = lock(&self.inner);
        let now = inner.now;
        inner.graph.remove_node(self.id);
        if let Some(record) = inner.nodes.get_mut(&self.id) {
            record.disposed = true;
            release_notes(&mut record.notes, now);
        }
    }
}

/// Drop pending notes and cut sounding ones at `now`
fn release_notes(notes: &mut Vec<ScheduledNote>, now: f64) {
    notes.retain(|n| n.start <= now);
    for note in notes.iter_mut() {
        if note.end > now {
            note.end = now;
        }
    }
}

impl VoiceNode for HeadlessNode {
    fn as_node(&self) -> &dyn LiveNode {
        self
    }

    fn set_detune(&self, cents: f64) -> Result<(), EngineError> {
        self.require_voice()?;
        self.with_record(|record, _| {
            record.detune = cents;
            Ok(())
        })
    }

    fn trigger_attack_release(
        &self,
        note: &str,
        duration: f64,
        time: f64,
    ) -> Result<(), EngineError> {
        self.require_voice()?;
        self.with_record(|record, _| {
            record.notes.push(ScheduledNote {
                note: note.to_string(),
                start: time,
                end: time + duration.max(0.0),
                detune: record.detune,
            });
            Ok(())
        })
    }

    fn release_all(&self) -> Result<(), EngineError> {
        self.require_voice()?;
        self.with_record(|record, now| {
            release_notes(&mut record.notes, now);
            Ok(())
        })
    }

    fn sounding_notes(&self) -> usize {
        let inner = lock(&self.inner);
        let now = inner.now;
        inner
            .nodes
            .get(&self.id)
            .map(|r| r.notes.iter().filter(|n| n.is_active(now)).count())
            .unwrap_or(0)
    }
}

/// Pattern handle of the headless engine
pub struct HeadlessPattern {
    core: PatternSlot,
    inner: Arc<Mutex<EngineInner>>,
}

impl PatternHandle for HeadlessPattern {
    fn start(&self) -> Result<(), EngineError> {
        let now = lock(&self.inner).now;
        let mut core = lock(&self.core);
        match core.state {
            PatternState::Disposed => Err(EngineError::Unavailable(format!(
                "pattern {} disposed",
                core.id
            ))),
            PatternState::Started => Ok(()),
            PatternState::Stopped => {
                core.state = PatternState::Started;
                core.next_fire = Some(now);
                Ok(())
            }
        }
    }

    fn stop(&self) -> Result<(), EngineError> {
        let mut core = lock(&self.core);
        if core.state == PatternState::Started {
            core.state = PatternState::Stopped;
            core.next_fire = None;
        }
        Ok(())
    }

    fn set(&self, interval: Option<f64>, values: Option<Vec<String>>) -> Result<(), EngineError> {
        let mut core = lock(&self.core);
        if core.state == PatternState::Disposed {
            return Err(EngineError::Unavailable(format!(
                "pattern {} disposed",
                core.id
            )));
        }
        if let Some(interval) = interval {
            core.interval = interval;
        }
        if let Some(values) = values {
            core.values = values;
        }
        Ok(())
    }

    fn dispose(&self) {
        let id = {
            let mut core = lock(&self.core);
            core.state = PatternState::Disposed;
            core.next_fire = None;
            core.callback = None;
            core.id
        };
        lock(&self.inner).patterns.remove(&id);
    }

    fn state(&self) -> PatternState {
        lock(&self.core).state
    }

    fn interval(&self) -> f64 {
        lock(&self.core).interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_pattern(
        engine: &HeadlessEngine,
        interval: f64,
    ) -> (Box<dyn PatternHandle>, Arc<Mutex<Vec<(f64, String)>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let pattern = engine
            .create_pattern(
                PatternSpec {
                    interval,
                    values: vec!["C4".to_string(), "E4".to_string()],
                },
                Box::new(move |time, value| sink.lock().unwrap().push((time, value.to_string()))),
            )
            .unwrap();
        (pattern, fired)
    }

    #[test]
    fn test_pattern_fires_on_interval_while_started() {
        let engine = HeadlessEngine::with_seed(1);
        let (pattern, fired) = counting_pattern(&engine, 1.0);

        engine.transport().start();
        pattern.start().unwrap();
        engine.advance(3.5);

        let times: Vec<f64> = fired.lock().unwrap().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(fired
            .lock()
            .unwrap()
            .iter()
            .all(|(_, v)| v == "C4" || v == "E4"));
        assert_eq!(engine.now(), 3.5);
    }

    #[test]
    fn test_pattern_silent_without_transport() {
        let engine = HeadlessEngine::new();
        let (pattern, fired) = counting_pattern(&engine, 1.0);

        pattern.start().unwrap();
        engine.advance(5.0);
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stopped_and_disposed_patterns_do_not_fire() {
        let engine = HeadlessEngine::new();
        let (pattern, fired) = counting_pattern(&engine, 1.0);
        engine.transport().start();
        pattern.start().unwrap();
        engine.advance(1.5);
        assert_eq!(fired.lock().unwrap().len(), 2);

        pattern.stop().unwrap();
        engine.advance(3.0);
        assert_eq!(fired.lock().unwrap().len(), 2);

        pattern.dispose();
        assert_eq!(pattern.state(), PatternState::Disposed);
        assert!(pattern.start().is_err());
        assert_eq!(engine.live_pattern_count(), 0);
    }

    #[test]
    fn test_zero_interval_never_fires() {
        let engine = HeadlessEngine::new();
        let (pattern, fired) = counting_pattern(&engine, 0.0);
        engine.transport().start();
        pattern.start().unwrap();
        engine.advance(10.0);
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_connect_and_chain() {
        let engine = HeadlessEngine::new();
        let voice = engine.create_voice(&PolySynthOptions::default()).unwrap();
        let modulation = engine.create_modulation(&ModulationOptions::default()).unwrap();
        let output = engine.create_output(0.5).unwrap();

        voice.connect(modulation.as_ref()).unwrap();
        modulation.connect(output.as_ref()).unwrap();

        assert_eq!(
            engine.chain_kinds(voice.id()),
            vec![NodeKind::Voice, NodeKind::Modulation, NodeKind::Output]
        );
        assert!(output.connect(voice.as_node()).is_err());

        let debug = format!("{:?}", engine);
        assert!(debug.contains(&format!("nodes: {}", engine.live_node_count())));
        assert!(debug.contains("connections: 2"));
    }

    #[test]
    fn test_set_records_calls_and_rejects_mismatch() {
        let engine = HeadlessEngine::new();
        let delay = engine.create_effect(EffectKind::Delay).unwrap();

        let options = NodeOptions::Delay(crate::params::DelayOptions::default());
        delay.set(&options).unwrap();
        assert_eq!(engine.set_calls(delay.id()), 1);
        assert_eq!(engine.node(delay.id()).unwrap().last_options, Some(options));

        assert!(matches!(
            delay.set(&NodeOptions::Gain(1.0)),
            Err(EngineError::OptionsMismatch(_))
        ));
        assert_eq!(engine.set_calls(delay.id()), 1);
    }

    #[test]
    fn test_disposed_node_rejects_calls() {
        let engine = HeadlessEngine::new();
        let output = engine.create_output(1.0).unwrap();
        let reverb = engine.create_effect(EffectKind::Reverb).unwrap();
        reverb.connect(output.as_ref()).unwrap();

        reverb.dispose();
        assert!(engine.node(reverb.id()).unwrap().disposed);
        assert!(engine.inputs_of(output.id()).is_empty());
        assert_eq!(
            reverb.set(&NodeOptions::Reverb(Default::default())),
            Err(EngineError::NodeDisposed(reverb.id().0))
        );
        assert_eq!(engine.live_node_count(), 1);
    }

    #[test]
    fn test_release_all_truncates_notes() {
        let engine = HeadlessEngine::new();
        let voice = engine.create_voice(&PolySynthOptions::default()).unwrap();

        voice.set_detune(4.0).unwrap();
        voice.trigger_attack_release("C4", 3.0, 0.0).unwrap();
        voice.trigger_attack_release("D4", 3.0, 5.0).unwrap();
        engine.advance(1.0);
        assert_eq!(voice.sounding_notes(), 2);

        voice.release_all().unwrap();
        assert_eq!(voice.sounding_notes(), 0);

        let notes = engine.notes(voice.id());
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].end, 1.0);
        assert_eq!(notes[0].detune, 4.0);
    }

    #[test]
    fn test_callback_can_drive_voice() {
        let engine = HeadlessEngine::with_seed(9);
        let voice = engine.create_voice(&PolySynthOptions::default()).unwrap();
        let target = voice.clone();
        let pattern = engine
            .create_pattern(
                PatternSpec {
                    interval: 2.0,
                    values: vec!["A3".to_string()],
                },
                Box::new(move |time, value| {
                    target.trigger_attack_release(value, 1.0, time).unwrap();
                }),
            )
            .unwrap();

        engine.transport().start();
        pattern.start().unwrap();
        engine.advance(4.5);

        let starts: Vec<f64> = engine.notes(voice.id()).iter().map(|n| n.start).collect();
        assert_eq!(starts, vec![0.0, 2.0, 4.0]);
    }
}
