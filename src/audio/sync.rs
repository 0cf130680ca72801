// Module synchronizer - Pushes declarative edits into live nodes
//
// Keeps the last seen [source, effects...] of a track. On each edit the new
// list is compared entry by entry with that snapshot and only the entries
// that changed are pushed, each into the single live node that implements
// it. Topology is never touched here.

use super::module::TrackAudioState;
use crate::engine::LiveNode;
use crate::error::EngineError;
use crate::params::{Module, ModuleId, NodeOptions, SignalChain, SourceModule};

/// Outcome of one synchronization pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Modules whose options reached their live node
    pub pushed: Vec<ModuleId>,
    /// Modules that changed but could not be pushed
    pub dropped: Vec<ModuleId>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.pushed.is_empty() && self.dropped.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleSynchronizer {
    snapshot: Vec<Module>,
}

impl ModuleSynchronizer {
    pub fn new(chain: &SignalChain) -> Self {
        Self {
            snapshot: chain.modules(),
        }
    }

    /// Accept `chain` as the live state without pushing anything
    pub fn rebase(&mut self, chain: &SignalChain) {
        self.snapshot = chain.modules();
    }

    pub fn snapshot(&self) -> &[Module] {
        &self.snapshot
    }

    /// Modules of `chain` that differ from the snapshot
    pub fn changed(&self, chain: &SignalChain) -> Vec<(Module, Option<Module>)> {
        chain
            .modules()
            .into_iter()
            .enumerate()
            .filter_map(|(i, module)| {
                let previous = self.snapshot.get(i);
                if previous == Some(&module) {
                    None
                } else {
                    Some((module, previous.cloned()))
                }
            })
            .collect()
    }

    /// Push every changed module into its live node, then take `chain` as
    /// the new snapshot
    pub fn sync(&mut self, chain: &SignalChain, audio: &TrackAudioState) -> SyncReport {
        let mut report = SyncReport::default();

        for (module, previous) in self.changed(chain) {
            let id = module.id().clone();
            let result = match (&module, &previous) {
                (Module::Source(source), Some(Module::Source(old))) => push_source(source, Some(old), audio),
                (Module::Source(source), _) => push_source(source, None, audio),
                (Module::Effect(effect), _) => match audio.module(effect.id()) {
                    Some(live) => live.node().set(&effect.node_options()).map(|_| true),
                    None => Err(EngineError::Unavailable(format!("no live module {}", id))),
                },
            };

            match result {
                Ok(true) => report.pushed.push(id),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(track = %audio.track, module = %id, error = %e, "live update dropped");
                    report.dropped.push(id);
                }
            }
        }

        self.snapshot = chain.modules();
        report
    }
}

/// Push the parts of a source that changed; Ok(false) if nothing live did
fn push_source(
    source: &SourceModule,
    previous: Option<&SourceModule>,
    audio: &TrackAudioState,
) -> Result<bool, EngineError> {
    let options_changed = previous.is_none_or(|old| old.options != source.options);
    let modulation_changed = previous.is_none_or(|old| old.modulation != source.modulation);
    if !options_changed && !modulation_changed {
        // detune randomization only reaches the pattern
        return Ok(false);
    }

    if options_changed {
        let voice = audio
            .voice()
            .ok_or_else(|| EngineError::Unavailable("no live voice".to_string()))?;
        voice.set(&NodeOptions::PolySynth(source.options))?;
    }
    if modulation_changed {
        let modulation = audio
            .modulation()
            .ok_or_else(|| EngineError::Unavailable("no live modulation".to_string()))?;
        modulation
            .node()
            .set(&NodeOptions::Modulation(source.modulation))?;
    }
    Ok(true)
}
