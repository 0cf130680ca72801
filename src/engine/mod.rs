// Audio engine collaborator - Node, pattern and transport interfaces
//
// The core never synthesizes sound itself. It drives an engine through these
// traits:
// - LiveNode: any node with set/connect/disconnect/dispose
// - VoiceNode: the polyphonic voice, which can also play notes
// - PatternHandle: a clocked repeating callback with a mutable interval
// - Transport: shared start/stop/pause
//
// `headless` implements all of them on a virtual clock.

pub mod headless;
pub mod routing;
pub mod transport;

pub use headless::HeadlessEngine;
pub use transport::{SharedTransportState, Transport, TransportState};

use crate::error::EngineError;
use crate::params::{EffectKind, ModulationOptions, NodeOptions, PolySynthOptions};
use std::fmt;
use std::sync::Arc;

/// Engine-assigned node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a live node does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Output,
    Voice,
    Modulation,
    Effect(EffectKind),
}

impl NodeKind {
    /// True if `options` is the options bag this kind accepts
    pub fn accepts(&self, options: &NodeOptions) -> bool {
        matches!(
            (self, options),
            (NodeKind::Output, NodeOptions::Gain(_))
                | (NodeKind::Voice, NodeOptions::PolySynth(_))
                | (NodeKind::Modulation, NodeOptions::Modulation(_))
                | (NodeKind::Effect(EffectKind::AutoFilter), NodeOptions::AutoFilter(_))
                | (NodeKind::Effect(EffectKind::Reverb), NodeOptions::Reverb(_))
                | (NodeKind::Effect(EffectKind::Delay), NodeOptions::Delay(_))
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Output => f.write_str("output"),
            NodeKind::Voice => f.write_str("voice"),
            NodeKind::Modulation => f.write_str("modulation"),
            NodeKind::Effect(kind) => write!(f, "{}", kind),
        }
    }
}

/// A node living in the engine's audio graph
pub trait LiveNode: Send + Sync {
    fn id(&self) -> NodeId;

    fn kind(&self) -> NodeKind;

    /// Push an options bag into the running node
    fn set(&self, options: &NodeOptions) -> Result<(), EngineError>;

    fn connect(&self, target: &dyn LiveNode) -> Result<(), EngineError>;

    /// Drop every outgoing connection
    fn disconnect(&self) -> Result<(), EngineError>;

    fn dispose(&self);
}

/// Polyphonic voice node
pub trait VoiceNode: LiveNode {
    fn as_node(&self) -> &dyn LiveNode;

    /// Detune in cents applied to subsequent notes
    fn set_detune(&self, cents: f64) -> Result<(), EngineError>;

    /// Note-on at `time`, note-off `duration` seconds later
    fn trigger_attack_release(&self, note: &str, duration: f64, time: f64)
    -> Result<(), EngineError>;

    /// Release every sounding or pending note now
    fn release_all(&self) -> Result<(), EngineError>;

    fn sounding_notes(&self) -> usize;
}

pub type NodeRef = Arc<dyn LiveNode>;
pub type VoiceRef = Arc<dyn VoiceNode>;

/// Pattern callback: (scheduled time, picked value)
pub type TickCallback = Box<dyn FnMut(f64, &str) + Send>;

/// Construction parameters of a pattern
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSpec {
    /// Seconds between callbacks
    pub interval: f64,
    /// Values handed to the callback, picked at random
    pub values: Vec<String>,
}

/// Whether a pattern currently fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternState {
    Stopped,
    Started,
    Disposed,
}

/// Clocked repeating scheduler
pub trait PatternHandle: Send {
    fn start(&self) -> Result<(), EngineError>;

    fn stop(&self) -> Result<(), EngineError>;

    /// Change interval and/or values without rebuilding
    fn set(&self, interval: Option<f64>, values: Option<Vec<String>>) -> Result<(), EngineError>;

    fn dispose(&self);

    fn state(&self) -> PatternState;

    fn interval(&self) -> f64;
}

/// Factory for every live object the core needs
pub trait AudioEngine: Send + Sync {
    fn create_output(&self, gain: f64) -> Result<NodeRef, EngineError>;

    fn create_voice(&self, options: &PolySynthOptions) -> Result<VoiceRef, EngineError>;

    /// Modulation node, already started
    fn create_modulation(&self, options: &ModulationOptions) -> Result<NodeRef, EngineError>;

    /// Effect node with engine defaults; the caller applies initial options
    fn create_effect(&self, kind: EffectKind) -> Result<NodeRef, EngineError>;

    fn create_pattern(
        &self,
        spec: PatternSpec,
        callback: TickCallback,
    ) -> Result<Box<dyn PatternHandle>, EngineError>;

    fn transport(&self) -> Arc<dyn Transport>;
}
