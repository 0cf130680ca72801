// Scale resolution - Root, octave and scale type to playable note names
//
// The music theory lives behind `ScaleLibrary`. The built-in library spells
// scales from interval tables (letter steps plus semitones), so a scale on a
// sharp root can produce doubled accidentals that the resolver normalizes.

use std::fmt;

/// Every root offered to the user
pub const NOTE_NAMES: [&str; 14] = [
    "C", "C#", "Db", "D", "Eb", "E", "F", "F#", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Octave range offered to the user
pub const OCTAVES: std::ops::RangeInclusive<u8> = 1..=7;

pub fn note_names() -> &'static [&'static str] {
    &NOTE_NAMES
}

pub fn octaves() -> Vec<u8> {
    OCTAVES.collect()
}

/// Canonical scale name, e.g. "C4 major"
pub fn scale_name(root: &str, octave: u8, scale_type: &str) -> String {
    format!("{}{} {}", root, octave, scale_type)
}

/// Collapse doubled accidental markers left by the library
pub fn normalize_accidentals(note: &str) -> String {
    let mut out = note.to_string();
    while out.contains("##") {
        out = out.replace("##", "#");
    }
    while out.contains("bb") {
        out = out.replace("bb", "b");
    }
    out
}

/// Music theory collaborator mapping a canonical scale name to its notes
pub trait ScaleLibrary: Send + Sync {
    /// Notes of `"{root}{octave} {scaleType}"`, empty when unknown
    fn notes(&self, scale_name: &str) -> Vec<String>;

    /// Every scale type the library knows
    fn scale_types(&self) -> Vec<&'static str>;
}

/// (letter steps, semitones) from the tonic for each degree
type Degrees = &'static [(u8, i32)];

macro_rules! heptatonic {
    ($a:expr, $b:expr, $c:expr, $d:expr, $e:expr, $f:expr, $g:expr) => {
        [(0, $a), (1, $b), (2, $c), (3, $d), (4, $e), (5, $f), (6, $g)]
    };
}

const MAJOR: [(u8, i32); 7] = heptatonic!(0, 2, 4, 5, 7, 9, 11);
const MINOR: [(u8, i32); 7] = heptatonic!(0, 2, 3, 5, 7, 8, 10);
const DORIAN: [(u8, i32); 7] = heptatonic!(0, 2, 3, 5, 7, 9, 10);
const PHRYGIAN: [(u8, i32); 7] = heptatonic!(0, 1, 3, 5, 7, 8, 10);
const LYDIAN: [(u8, i32); 7] = heptatonic!(0, 2, 4, 6, 7, 9, 11);
const MIXOLYDIAN: [(u8, i32); 7] = heptatonic!(0, 2, 4, 5, 7, 9, 10);
const LOCRIAN: [(u8, i32); 7] = heptatonic!(0, 1, 3, 5, 6, 8, 10);
const HARMONIC_MINOR: [(u8, i32); 7] = heptatonic!(0, 2, 3, 5, 7, 8, 11);
const MELODIC_MINOR: [(u8, i32); 7] = heptatonic!(0, 2, 3, 5, 7, 9, 11);
const PHRYGIAN_DOMINANT: [(u8, i32); 7] = heptatonic!(0, 1, 4, 5, 7, 8, 10);
const HUNGARIAN_MINOR: [(u8, i32); 7] = heptatonic!(0, 2, 3, 6, 7, 8, 11);
const DOUBLE_HARMONIC_MAJOR: [(u8, i32); 7] = heptatonic!(0, 1, 4, 5, 7, 8, 11);
const LYDIAN_DOMINANT: [(u8, i32); 7] = heptatonic!(0, 2, 4, 6, 7, 9, 10);

const MAJOR_PENTATONIC: Degrees = &[(0, 0), (1, 2), (2, 4), (4, 7), (5, 9)];
const MINOR_PENTATONIC: Degrees = &[(0, 0), (2, 3), (3, 5), (4, 7), (6, 10)];
const BLUES: Degrees = &[(0, 0), (2, 3), (3, 5), (4, 6), (4, 7), (6, 10)];
const WHOLE_TONE: Degrees = &[(0, 0), (1, 2), (2, 4), (4, 6), (5, 8), (6, 10)];
const AUGMENTED: Degrees = &[(0, 0), (1, 3), (2, 4), (4, 7), (4, 8), (6, 11)];
const DIMINISHED: Degrees = &[
    (0, 0),
    (1, 2),
    (2, 3),
    (3, 5),
    (4, 6),
    (5, 8),
    (5, 9),
    (6, 11),
];
const CHROMATIC: Degrees = &[
    (0, 0),
    (1, 1),
    (1, 2),
    (2, 3),
    (2, 4),
    (3, 5),
    (4, 6),
    (4, 7),
    (5, 8),
    (5, 9),
    (6, 10),
    (6, 11),
];
const HIRAJOSHI: Degrees = &[(0, 0), (1, 2), (2, 3), (4, 7), (5, 8)];
const IN_SEN: Degrees = &[(0, 0), (1, 1), (3, 5), (4, 7), (6, 10)];
const EGYPTIAN: Degrees = &[(0, 0), (1, 2), (3, 5), (4, 7), (6, 10)];

const SCALES: &[(&str, Degrees)] = &[
    ("major", &MAJOR),
    ("ionian", &MAJOR),
    ("minor", &MINOR),
    ("aeolian", &MINOR),
    ("dorian", &DORIAN),
    ("phrygian", &PHRYGIAN),
    ("lydian", &LYDIAN),
    ("mixolydian", &MIXOLYDIAN),
    ("locrian", &LOCRIAN),
    ("harmonic minor", &HARMONIC_MINOR),
    ("melodic minor", &MELODIC_MINOR),
    ("major pentatonic", MAJOR_PENTATONIC),
    ("minor pentatonic", MINOR_PENTATONIC),
    ("blues", BLUES),
    ("whole tone", WHOLE_TONE),
    ("chromatic", CHROMATIC),
    ("augmented", AUGMENTED),
    ("diminished", DIMINISHED),
    ("hirajoshi", HIRAJOSHI),
    ("in-sen", IN_SEN),
    ("egyptian", EGYPTIAN),
    ("phrygian dominant", &PHRYGIAN_DOMINANT),
    ("spanish", &PHRYGIAN_DOMINANT),
    ("hungarian minor", &HUNGARIAN_MINOR),
    ("double harmonic major", &DOUBLE_HARMONIC_MAJOR),
    ("lydian dominant", &LYDIAN_DOMINANT),
];

const LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];
const NATURAL_PITCH: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Parsed tonic such as "F#4" or "Bb"
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tonic {
    letter: usize,
    accidental: i32,
    octave: Option<i32>,
}

impl Tonic {
    fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars().peekable();
        let letter_char = chars.next()?.to_ascii_uppercase();
        let letter = LETTERS.iter().position(|l| *l == letter_char)?;

        let mut accidental = 0;
        while let Some(&c) = chars.peek() {
            match c {
                '#' => accidental += 1,
                'b' => accidental -= 1,
                _ => break,
            }
            chars.next();
        }

        let rest: String = chars.collect();
        let octave = if rest.is_empty() {
            None
        } else {
            Some(rest.parse::<i32>().ok()?)
        };

        Some(Self {
            letter,
            accidental,
            octave,
        })
    }
}

/// Spell one degree above the tonic
fn spell(tonic: Tonic, letter_steps: u8, semitones: i32) -> String {
    let steps = tonic.letter + letter_steps as usize;
    let letter = steps % 7;
    let octave_carry = (steps / 7) as i32;

    let target = NATURAL_PITCH[tonic.letter] + tonic.accidental + semitones;
    let natural = NATURAL_PITCH[letter] + 12 * octave_carry;
    let accidental = target - natural;

    let marks = if accidental >= 0 {
        "#".repeat(accidental as usize)
    } else {
        "b".repeat(accidental.unsigned_abs() as usize)
    };

    match tonic.octave {
        Some(octave) => format!("{}{}{}", LETTERS[letter], marks, octave + octave_carry),
        None => format!("{}{}", LETTERS[letter], marks),
    }
}

/// Built-in library over a fixed table of interval scales
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalScaleLibrary;

impl ScaleLibrary for IntervalScaleLibrary {
    fn notes(&self, scale_name: &str) -> Vec<String> {
        let (tonic, scale_type) = match scale_name.trim().split_once(' ') {
            Some(parts) => parts,
            None => return Vec::new(),
        };

        let tonic = match Tonic::parse(tonic) {
            Some(tonic) => tonic,
            None => return Vec::new(),
        };

        let scale_type = scale_type.trim().to_lowercase();
        SCALES
            .iter()
            .find(|(name, _)| *name == scale_type)
            .map(|(_, degrees)| {
                degrees
                    .iter()
                    .map(|(letters, semis)| spell(tonic, *letters, *semis))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn scale_types(&self) -> Vec<&'static str> {
        SCALES.iter().map(|(name, _)| *name).collect()
    }
}

/// Wraps a library and cleans its output for playback and display
pub struct ScaleResolver {
    library: Box<dyn ScaleLibrary>,
}

impl ScaleResolver {
    pub fn new(library: Box<dyn ScaleLibrary>) -> Self {
        Self { library }
    }

    /// Ordered notes of the scale, empty when the library does not know it
    pub fn resolve(&self, root: &str, octave: u8, scale_type: &str) -> Vec<String> {
        self.library
            .notes(&scale_name(root, octave, scale_type))
            .iter()
            .map(|note| normalize_accidentals(note))
            .collect()
    }

    pub fn scale_types(&self) -> Vec<&'static str> {
        self.library.scale_types()
    }
}

impl Default for ScaleResolver {
    fn default() -> Self {
        Self::new(Box::new(IntervalScaleLibrary))
    }
}

impl fmt::Debug for ScaleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaleResolver")
            .field("scale_types", &self.library.scale_types().len())
            .finish()
    }
}
