// Session configuration - Defaults for new tracks, loadable from RON

use crate::error::ConfigError;
use crate::params::{
    CompositionParams, ModulationOptions, NotesParams, PolySynthOptions, SourceModule,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed scale for new tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSpec {
    pub root: String,
    pub octave: u8,
    pub scale_type: String,
}

impl Default for ScaleSpec {
    fn default() -> Self {
        Self {
            root: "C".to_string(),
            octave: 4,
            scale_type: "major".to_string(),
        }
    }
}

/// Timing defaults of new tracks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionDefaults {
    pub note_length: f64,
    pub rand_note_length: f64,
    pub interval: f64,
    pub rand_interval: f64,
}

impl Default for CompositionDefaults {
    fn default() -> Self {
        Self {
            note_length: 3.0,
            rand_note_length: 0.0,
            interval: 2.0,
            rand_interval: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Output gain at startup, 0..1
    pub initial_volume: f64,
    pub notification_capacity: usize,
    /// `None` picks a random root, octave and scale type per track
    pub initial_scale: Option<ScaleSpec>,
    pub source: PolySynthOptions,
    pub modulation: ModulationOptions,
    pub detune_rand_fraction: f64,
    pub composition: CompositionDefaults,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_volume: 0.5,
            notification_capacity: 256,
            initial_scale: Some(ScaleSpec::default()),
            source: PolySynthOptions::default(),
            modulation: ModulationOptions::default(),
            detune_rand_fraction: 0.2,
            composition: CompositionDefaults::default(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Startup volume clamped to 0..1
    pub fn volume(&self) -> f64 {
        clamp_volume(self.initial_volume)
    }

    /// Fresh source module with the configured defaults
    pub fn source_module(&self) -> SourceModule {
        SourceModule::new(self.source, self.modulation, self.detune_rand_fraction)
    }

    pub fn composition_params(&self, notes: NotesParams) -> CompositionParams {
        CompositionParams {
            notes,
            note_length: self.composition.note_length,
            rand_note_length: self.composition.rand_note_length,
            interval: self.composition.interval,
            rand_interval: self.composition.rand_interval,
        }
    }
}

/// Clamp a volume into 0..1; NaN becomes silence
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
