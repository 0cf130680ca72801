// Track parameters - Declarative state of every track plus the global flags
//
// This is the serializable tree that the UI edits and the persistence layer
// round-trips. Live engine handles never appear here.

use super::chain::SignalChain;
use super::path;
use super::types::{EffectModule, ModuleId, SourceModule, TrackId};
use crate::error::ParamError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scale selection of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesParams {
    pub root: String,
    pub octave: u8,
    pub scale_type: String,
    /// Canonical "{root}{octave} {scaleType}" name
    pub scale_name: String,
    pub scale: Vec<String>,
}

/// Timing bases and randomization fractions of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionParams {
    pub notes: NotesParams,
    pub note_length: f64,
    pub rand_note_length: f64,
    pub interval: f64,
    pub rand_interval: f64,
}

/// Everything the scheduler needs to build a pattern
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionState {
    pub scale: Vec<String>,
    pub base_note_length: f64,
    pub note_length_rand_fraction: f64,
    pub base_interval: f64,
    pub interval_rand_fraction: f64,
}

impl CompositionParams {
    pub fn state(&self) -> CompositionState {
        CompositionState {
            scale: self.notes.scale.clone(),
            base_note_length: self.note_length,
            note_length_rand_fraction: self.rand_note_length,
            base_interval: self.interval,
            interval_rand_fraction: self.rand_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackParams {
    pub signal_chain: SignalChain,
    pub composition: CompositionParams,
}

impl TrackParams {
    pub fn new(source: SourceModule, composition: CompositionParams) -> Self {
        Self {
            signal_chain: SignalChain::new(source),
            composition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub playing: bool,
    /// Output gain 0..1
    pub volume: f64,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            playing: false,
            volume: 0.5,
        }
    }
}

/// Root of the declarative tree
#[derive(Debug, Clone, Default)]
pub struct ParamsState {
    pub global: GlobalState,
    pub tracks: BTreeMap<TrackId, TrackParams>,
}

impl ParamsState {
    pub fn new(global: GlobalState) -> Self {
        Self {
            global,
            tracks: BTreeMap::new(),
        }
    }

    pub fn track(&self, id: TrackId) -> Result<&TrackParams, ParamError> {
        self.tracks.get(&id).ok_or(ParamError::UnknownTrack(id))
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut TrackParams, ParamError> {
        self.tracks.get_mut(&id).ok_or(ParamError::UnknownTrack(id))
    }

    /// Set one field of a track's composition, e.g. `interval` or `notes.root`
    pub fn set_track_field(
        &mut self,
        track: TrackId,
        field: &str,
        value: Value,
    ) -> Result<(), ParamError> {
        let params = self.track_mut(track)?;
        params.composition = path::edit(&params.composition, field, value, &[])?;
        Ok(())
    }

    /// Set one field of a module, e.g. `options.frequency` or `modulation.rate`
    pub fn set_module_field(
        &mut self,
        track: TrackId,
        module: &ModuleId,
        field: &str,
        value: Value,
    ) -> Result<(), ParamError> {
        const IMMUTABLE: &[&str] = &["id", "name"];

        let chain = &mut self.track_mut(track)?.signal_chain;
        if &chain.source().id == module {
            let edited = path::edit(chain.source(), field, value, IMMUTABLE)?;
            *chain.source_mut() = edited;
            return Ok(());
        }

        let effect = chain
            .effect_mut(module)
            .ok_or_else(|| ParamError::UnknownModule {
                track,
                module: module.clone(),
            })?;
        let edited: EffectModule = path::edit(effect, field, value, IMMUTABLE)?;
        *effect = edited;
        Ok(())
    }

    /// Replace the scale selection of a track in one step
    pub fn set_notes(&mut self, track: TrackId, notes: NotesParams) -> Result<(), ParamError> {
        self.track_mut(track)?.composition.notes = notes;
        Ok(())
    }

    pub fn push_effect(&mut self, track: TrackId, effect: EffectModule) -> Result<(), ParamError> {
        self.track_mut(track)?.signal_chain.push_effect(effect);
        Ok(())
    }
}
