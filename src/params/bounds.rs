// Parameter bounds - Slider ranges the UI offers for each module field
//
// Advisory only: edits outside these ranges are applied as given.

use super::types::ModuleName;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub unit: &'static str,
}

const fn b(min: f64, max: f64, step: f64, unit: &'static str) -> ParamBounds {
    ParamBounds {
        min,
        max,
        step,
        unit,
    }
}

const POLY_SYNTH: &[(&str, ParamBounds)] = &[
    ("options.envelope.attack", b(0.005, 15.0, 0.001, "s")),
    ("options.envelope.decay", b(0.005, 15.0, 0.001, "s")),
    ("options.envelope.sustain", b(0.0, 1.0, 0.01, "%")),
    ("options.envelope.release", b(0.005, 15.0, 0.001, "s")),
    ("options.detune", b(-50.0, 50.0, 1.0, "ct")),
    ("detuneRandFraction", b(0.0, 1.0, 0.01, "%")),
    ("modulation.amount", b(0.0, 1.0, 0.01, "%")),
    ("modulation.rate", b(1.0, 60.0, 0.01, "Hz")),
];

const AUTO_FILTER: &[(&str, ParamBounds)] = &[
    ("options.frequency", b(0.0, 20.0, 0.01, "Hz")),
    ("options.depth", b(0.0, 1.0, 0.01, "%")),
    ("options.baseFrequency", b(20.0, 2000.0, 1.0, "Hz")),
    ("options.octaves", b(0.0, 8.0, 0.1, "oct")),
    ("options.wet", b(0.0, 1.0, 0.01, "%")),
];

const REVERB: &[(&str, ParamBounds)] = &[
    ("options.decay", b(0.1, 30.0, 0.1, "s")),
    ("options.preDelay", b(0.0, 1.0, 0.01, "s")),
    ("options.wet", b(0.0, 1.0, 0.01, "%")),
];

const DELAY: &[(&str, ParamBounds)] = &[
    ("options.delayTime", b(0.0, 2.0, 0.01, "s")),
    ("options.feedback", b(0.0, 0.99, 0.01, "%")),
    ("options.wet", b(0.0, 1.0, 0.01, "%")),
];

/// Composition sliders, keyed by track field path
pub const COMPOSITION: &[(&str, ParamBounds)] = &[
    ("noteLength", b(0.2, 48.0, 0.1, "s")),
    ("randNoteLength", b(0.0, 1.0, 0.01, "%")),
    ("interval", b(0.0, 48.0, 0.1, "s")),
    ("randInterval", b(0.0, 1.0, 0.01, "%")),
];

/// Every editable numeric field of a module kind
pub fn module_bounds(name: ModuleName) -> &'static [(&'static str, ParamBounds)] {
    match name {
        ModuleName::PolySynth => POLY_SYNTH,
        ModuleName::AutoFilter => AUTO_FILTER,
        ModuleName::Reverb => REVERB,
        ModuleName::Delay => DELAY,
    }
}

/// Bounds of one field, if the UI exposes it
pub fn field_bounds(name: ModuleName, field: &str) -> Option<ParamBounds> {
    module_bounds(name)
        .iter()
        .find(|(path, _)| *path == field)
        .map(|(_, bounds)| *bounds)
}
