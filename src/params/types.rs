// Parameter types - Declarative, serializable descriptions of modules
//
// Every module kind is a closed variant. Constructing a live node, applying
// options and supplying UI bounds all match exhaustively over these enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable track identifier, assigned at creation and never reused in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Module identifier, unique within a track's chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source or effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleType {
    Source,
    Effect,
}

/// Every module kind known to the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleName {
    PolySynth,
    AutoFilter,
    Reverb,
    Delay,
}

impl ModuleName {
    pub fn module_type(&self) -> ModuleType {
        match self {
            ModuleName::PolySynth => ModuleType::Source,
            ModuleName::AutoFilter | ModuleName::Reverb | ModuleName::Delay => ModuleType::Effect,
        }
    }

    /// Name shown in the UI
    pub fn display_name(&self) -> &'static str {
        match self {
            ModuleName::PolySynth => "Oscillator",
            ModuleName::AutoFilter => "Auto Filter",
            ModuleName::Reverb => "Reverb",
            ModuleName::Delay => "Delay",
        }
    }
}

/// Effect kinds that can be appended to a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    AutoFilter,
    Reverb,
    Delay,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [EffectKind::AutoFilter, EffectKind::Reverb, EffectKind::Delay];

    pub fn module_name(&self) -> ModuleName {
        match self {
            EffectKind::AutoFilter => ModuleName::AutoFilter,
            EffectKind::Reverb => ModuleName::Reverb,
            EffectKind::Delay => ModuleName::Delay,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module_name().display_name())
    }
}

/// Oscillator waveform of the polyphonic voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// ADSR envelope in seconds (sustain is a level 0..1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.3,
            decay: 0.1,
            sustain: 0.8,
            release: 0.3,
        }
    }
}

/// Options of the polyphonic voice node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolySynthOptions {
    pub waveform: Waveform,
    /// Base detune in cents
    pub detune: f64,
    pub envelope: Envelope,
}

impl Default for PolySynthOptions {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            detune: 2.0,
            envelope: Envelope::default(),
        }
    }
}

/// Amplitude modulation applied after the voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModulationOptions {
    /// Rate in Hz
    pub rate: f64,
    /// Depth 0..1
    pub amount: f64,
}

impl Default for ModulationOptions {
    fn default() -> Self {
        Self {
            rate: 25.0,
            amount: 0.2,
        }
    }
}

/// Filter response used by the auto filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    Lowpass,
    Lowshelf,
    Highpass,
    Highshelf,
    Bandpass,
    Allpass,
    Notch,
    Peaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFilterOptions {
    /// Sweep rate in Hz
    pub frequency: f64,
    pub depth: f64,
    pub base_frequency: f64,
    pub octaves: f64,
    pub filter_type: FilterType,
    pub wet: f64,
}

impl Default for AutoFilterOptions {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            depth: 1.0,
            base_frequency: 200.0,
            octaves: 2.6,
            filter_type: FilterType::Lowpass,
            wet: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbOptions {
    /// Decay time in seconds
    pub decay: f64,
    pub pre_delay: f64,
    pub wet: f64,
}

impl Default for ReverbOptions {
    fn default() -> Self {
        Self {
            decay: 1.5,
            pre_delay: 0.01,
            wet: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayOptions {
    /// Delay time in seconds
    pub delay_time: f64,
    pub feedback: f64,
    pub wet: f64,
}

impl Default for DelayOptions {
    fn default() -> Self {
        Self {
            delay_time: 1.0,
            feedback: 0.0,
            wet: 0.5,
        }
    }
}

/// Options bag pushed into a live node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeOptions {
    Gain(f64),
    PolySynth(PolySynthOptions),
    Modulation(ModulationOptions),
    AutoFilter(AutoFilterOptions),
    Reverb(ReverbOptions),
    Delay(DelayOptions),
}

/// The single source of a track: voice options plus its paired modulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceModule {
    pub id: ModuleId,
    pub name: ModuleName,
    pub options: PolySynthOptions,
    pub modulation: ModulationOptions,
    pub detune_rand_fraction: f64,
}

impl SourceModule {
    pub fn new(
        options: PolySynthOptions,
        modulation: ModulationOptions,
        detune_rand_fraction: f64,
    ) -> Self {
        Self {
            id: ModuleId::generate(),
            name: ModuleName::PolySynth,
            options,
            modulation,
            detune_rand_fraction,
        }
    }
}

impl Default for SourceModule {
    fn default() -> Self {
        Self::new(PolySynthOptions::default(), ModulationOptions::default(), 0.2)
    }
}

/// An effect in the chain tail, tagged by its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum EffectModule {
    AutoFilter { id: ModuleId, options: AutoFilterOptions },
    Reverb { id: ModuleId, options: ReverbOptions },
    Delay { id: ModuleId, options: DelayOptions },
}

impl EffectModule {
    /// Fresh module with the kind's initial options
    pub fn initial(kind: EffectKind) -> Self {
        let id = ModuleId::generate();
        match kind {
            EffectKind::AutoFilter => EffectModule::AutoFilter {
                id,
                options: AutoFilterOptions::default(),
            },
            EffectKind::Reverb => EffectModule::Reverb {
                id,
                options: ReverbOptions::default(),
            },
            EffectKind::Delay => EffectModule::Delay {
                id,
                options: DelayOptions::default(),
            },
        }
    }

    pub fn id(&self) -> &ModuleId {
        match self {
            EffectModule::AutoFilter { id, .. }
            | EffectModule::Reverb { id, .. }
            | EffectModule::Delay { id, .. } => id,
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            EffectModule::AutoFilter { .. } => EffectKind::AutoFilter,
            EffectModule::Reverb { .. } => EffectKind::Reverb,
            EffectModule::Delay { .. } => EffectKind::Delay,
        }
    }

    /// Options bag for the live effect node
    pub fn node_options(&self) -> NodeOptions {
        match self {
            EffectModule::AutoFilter { options, .. } => NodeOptions::AutoFilter(*options),
            EffectModule::Reverb { options, .. } => NodeOptions::Reverb(*options),
            EffectModule::Delay { options, .. } => NodeOptions::Delay(*options),
        }
    }
}

/// Owned view of one chain entry, used for snapshots and diffs
#[derive(Debug, Clone, PartialEq)]
pub enum Module {
    Source(SourceModule),
    Effect(EffectModule),
}

impl Module {
    pub fn id(&self) -> &ModuleId {
        match self {
            Module::Source(source) => &source.id,
            Module::Effect(effect) => effect.id(),
        }
    }

    pub fn name(&self) -> ModuleName {
        match self {
            Module::Source(source) => source.name,
            Module::Effect(effect) => effect.kind().module_name(),
        }
    }

    pub fn module_type(&self) -> ModuleType {
        self.name().module_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_module_ids_are_distinct() {
        let a = ModuleId::generate();
        let b = ModuleId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_effect_initial_state_matches_kind() {
        for kind in EffectKind::ALL {
            let effect = EffectModule::initial(kind);
            assert_eq!(effect.kind(), kind);
            assert_eq!(effect.kind().module_name().module_type(), ModuleType::Effect);
        }
    }

    #[test]
    fn test_effect_serializes_with_name_tag() {
        let effect = EffectModule::AutoFilter {
            id: ModuleId::from("fx1"),
            options: AutoFilterOptions::default(),
        };
        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(json["name"], "autoFilter");
        assert_eq!(json["id"], "fx1");
        assert_eq!(json["options"]["baseFrequency"], 200.0);
        assert_eq!(json["options"]["filterType"], "lowpass");
    }

    #[test]
    fn test_node_options_follow_effect_kind() {
        let delay = EffectModule::initial(EffectKind::Delay);
        assert!(matches!(delay.node_options(), NodeOptions::Delay(o) if o.delay_time == 1.0));
    }

    #[test]
    fn test_module_view_reports_type() {
        let source = Module::Source(SourceModule::default());
        let reverb = Module::Effect(EffectModule::initial(EffectKind::Reverb));
        assert_eq!(source.module_type(), ModuleType::Source);
        assert_eq!(source.name(), ModuleName::PolySynth);
        assert_eq!(reverb.module_type(), ModuleType::Effect);
        assert_eq!(reverb.name().display_name(), "Reverb");
    }
}
