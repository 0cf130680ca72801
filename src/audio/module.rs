// Live modules - Engine handles paired with the declarative chain
//
// The live chain of a track is [voice, modulation, effect...]. The voice and
// each effect carry the id of their declarative module; the modulation node
// gets its own id and has no declarative counterpart.

use crate::composition::CompositionScheduler;
use crate::engine::{LiveNode, NodeRef, VoiceRef};
use crate::messaging::Notifier;
use crate::params::{EffectKind, ModuleId, TrackId};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Slot holding the track's live voice, shared with the pattern callback
pub type SourceSlot = Arc<RwLock<Option<VoiceRef>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioModuleKind {
    Voice,
    Modulation,
    Effect(EffectKind),
}

/// Engine handle of a live module
#[derive(Clone)]
pub enum LiveHandle {
    Voice(VoiceRef),
    Node(NodeRef),
}

impl LiveHandle {
    pub fn node(&self) -> &dyn LiveNode {
        match self {
            LiveHandle::Voice(voice) => voice.as_node(),
            LiveHandle::Node(node) => node.as_ref(),
        }
    }
}

impl fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node();
        write!(f, "{}({})", node.kind(), node.id())
    }
}

/// Live counterpart of a declarative module
#[derive(Debug, Clone)]
pub struct AudioModule {
    pub id: ModuleId,
    pub kind: AudioModuleKind,
    pub handle: LiveHandle,
}

impl AudioModule {
    pub fn node(&self) -> &dyn LiveNode {
        self.handle.node()
    }
}

/// Live state of one track
pub struct TrackAudioState {
    pub track: TrackId,
    signal_chain: Vec<AudioModule>,
    pub composition: CompositionScheduler,
    source: SourceSlot,
}

impl TrackAudioState {
    pub fn new(track: TrackId, notifier: Notifier) -> Self {
        let source: SourceSlot = Arc::new(RwLock::new(None));
        Self {
            track,
            signal_chain: Vec::new(),
            composition: CompositionScheduler::new(track, source.clone(), notifier),
            source,
        }
    }

    pub fn signal_chain(&self) -> &[AudioModule] {
        &self.signal_chain
    }

    /// The live voice, if the track has been built
    pub fn voice(&self) -> Option<VoiceRef> {
        match self.source.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn modulation(&self) -> Option<&AudioModule> {
        self.signal_chain
            .iter()
            .find(|m| m.kind == AudioModuleKind::Modulation)
    }

    /// Live module carrying a declarative module's id
    pub fn module(&self, id: &ModuleId) -> Option<&AudioModule> {
        self.signal_chain
            .iter()
            .filter(|m| m.kind != AudioModuleKind::Modulation)
            .find(|m| &m.id == id)
    }

    pub fn effects(&self) -> impl Iterator<Item = &AudioModule> {
        self.signal_chain
            .iter()
            .filter(|m| matches!(m.kind, AudioModuleKind::Effect(_)))
    }

    /// Ids in declarative order, modulation excluded
    pub fn declarative_ids(&self) -> Vec<ModuleId> {
        self.signal_chain
            .iter()
            .filter(|m| m.kind != AudioModuleKind::Modulation)
            .map(|m| m.id.clone())
            .collect()
    }

    pub(crate) fn set_voice(&self, voice: Option<VoiceRef>) {
        match self.source.write() {
            Ok(mut slot) => *slot = voice,
            Err(poisoned) => *poisoned.into_inner() = voice,
        }
    }

    pub(crate) fn push(&mut self, module: AudioModule) {
        self.signal_chain.push(module);
    }

    pub(crate) fn take_chain(&mut self) -> Vec<AudioModule> {
        std::mem::take(&mut self.signal_chain)
    }
}

impl fmt::Debug for TrackAudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackAudioState")
            .field("track", &self.track)
            .field("signal_chain", &self.signal_chain)
            .field("composition", &self.composition)
            .finish()
    }
}
