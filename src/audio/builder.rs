// Chain builder - Creates and rewires the live graph of a track
//
// Only this module changes topology. Routing is always
// voice -> modulation -> effect[0] -> ... -> effect[n] -> output.
// Preconditions are checked before any node is created or disconnected.

use super::module::{AudioModule, AudioModuleKind, LiveHandle, TrackAudioState};
use crate::engine::{AudioEngine, LiveNode, NodeRef};
use crate::error::{ChainError, EngineError};
use crate::params::{EffectKind, EffectModule, ModuleId, SignalChain, SourceModule};

/// Connect `nodes` in series and the last one to `output`
fn wire(nodes: &[&dyn LiveNode], output: &dyn LiveNode) -> Result<(), EngineError> {
    for pair in nodes.windows(2) {
        pair[0].connect(pair[1])?;
    }
    if let Some(last) = nodes.last() {
        last.connect(output)?;
    }
    Ok(())
}

/// Build voice and modulation for a new track and route them to the output
pub fn init_track(
    engine: &dyn AudioEngine,
    output: Option<&NodeRef>,
    source: &SourceModule,
    audio: &mut TrackAudioState,
) -> Result<(), ChainError> {
    let output = output.ok_or(ChainError::OutputMissing)?;

    let modulation = engine.create_modulation(&source.modulation)?;
    let voice = match engine.create_voice(&source.options) {
        Ok(voice) => voice,
        Err(e) => {
            modulation.dispose();
            return Err(e.into());
        }
    };

    if let Err(e) = wire(&[voice.as_node(), modulation.as_ref()], output.as_ref()) {
        voice.dispose();
        modulation.dispose();
        return Err(e.into());
    }

    audio.push(AudioModule {
        id: source.id.clone(),
        kind: AudioModuleKind::Voice,
        handle: LiveHandle::Voice(voice.clone()),
    });
    audio.push(AudioModule {
        id: ModuleId::generate(),
        kind: AudioModuleKind::Modulation,
        handle: LiveHandle::Node(modulation),
    });
    audio.set_voice(Some(voice));

    tracing::info!(track = %audio.track, source = %source.id, "track built");
    Ok(())
}

/// Append a new effect of `kind` to both chains and re-route the track
///
/// Returns the id shared by the declarative and live module.
pub fn add_effect(
    engine: &dyn AudioEngine,
    output: Option<&NodeRef>,
    chain: &mut SignalChain,
    audio: &mut TrackAudioState,
    kind: EffectKind,
) -> Result<ModuleId, ChainError> {
    let descriptor = EffectModule::initial(kind);
    attach_effect(engine, output, audio, &descriptor)?;

    let id = descriptor.id().clone();
    chain.push_effect(descriptor);
    Ok(id)
}

/// Create the live node for `descriptor`, apply its options and route it
/// at the end of the live chain
pub fn attach_effect(
    engine: &dyn AudioEngine,
    output: Option<&NodeRef>,
    audio: &mut TrackAudioState,
    descriptor: &EffectModule,
) -> Result<(), ChainError> {
    let output = output.ok_or(ChainError::OutputMissing)?;
    if audio.voice().is_none() {
        return Err(ChainError::SourceMissing(audio.track));
    }

    let kind = descriptor.kind();
    let node = engine.create_effect(kind)?;
    if let Err(e) = node.set(&descriptor.node_options()) {
        node.dispose();
        return Err(e.into());
    }

    // everything after the voice is re-chained; the voice keeps its edge
    let previous: Vec<&dyn LiveNode> = audio
        .signal_chain()
        .iter()
        .filter(|m| m.kind != AudioModuleKind::Voice)
        .map(|m| m.node())
        .collect();

    for existing in &previous {
        if let Err(e) = existing.disconnect() {
            node.dispose();
            if let Err(restore) = wire(&previous, output.as_ref()) {
                tracing::error!(track = %audio.track, error = %restore, "restore failed");
            }
            return Err(e.into());
        }
    }

    let mut rewired = previous.clone();
    rewired.push(node.as_ref());
    if let Err(e) = wire(&rewired, output.as_ref()) {
        tracing::error!(track = %audio.track, error = %e, "rewire failed, restoring previous routing");
        for n in &rewired {
            let _ = n.disconnect();
        }
        node.dispose();
        if let Err(restore) = wire(&previous, output.as_ref()) {
            tracing::error!(track = %audio.track, error = %restore, "restore failed");
        }
        return Err(e.into());
    }

    let id = descriptor.id().clone();
    audio.push(AudioModule {
        id: id.clone(),
        kind: AudioModuleKind::Effect(kind),
        handle: LiveHandle::Node(node),
    });

    tracing::info!(track = %audio.track, module = %id, effect = %kind, "effect added");
    Ok(())
}

/// Stop scheduling, then disconnect and dispose every live node of a track
pub fn teardown(audio: &mut TrackAudioState) {
    audio.composition.dispose();
    audio.set_voice(None);

    let modules = audio.take_chain();
    for module in &modules {
        if let Err(e) = module.node().disconnect() {
            tracing::debug!(track = %audio.track, module = %module.id, error = %e, "disconnect skipped");
        }
    }
    for module in &modules {
        module.node().dispose();
    }

    tracing::info!(track = %audio.track, nodes = modules.len(), "track torn down");
}
