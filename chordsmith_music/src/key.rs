// Keys, their diatonic harmonization, and key detection.
//
// A key's "consonant pool" is the seven triads built on the degrees of its
// major scale (minor keys use their relative major):
//
//   I   IV   V    vi   ii   iii  vii°
//   +0  +5   +7   +9   +2   +4   +11
//
// The pool is computed once per run and is the reference the fitness
// function checks every gene against.
//
// Key detection uses the Krumhansl-Kessler probe-tone profiles: the melody's
// duration-weighted pitch-class histogram is correlated against all 24
// rotations and the best match wins.

use crate::chord::{Chord, ChordQuality, PitchClass, build_chord};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyMode {
    Major,
    Minor,
}

/// A detected or user-supplied key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: KeyMode,
}

impl Key {
    pub fn new(tonic: i32, mode: KeyMode) -> Self {
        Key {
            tonic: PitchClass::new(tonic),
            mode,
        }
    }

    /// Tonic of the major scale whose chords harmonize this key.
    pub fn relative_major(&self) -> PitchClass {
        match self.mode {
            KeyMode::Major => self.tonic,
            KeyMode::Minor => self.tonic.transpose(3),
        }
    }

    /// Short name: `C`, `F#`, `Am`, `Ebm`.
    pub fn name(&self) -> String {
        match self.mode {
            KeyMode::Major => self.tonic.name().to_string(),
            KeyMode::Minor => format!("{}m", self.tonic.name()),
        }
    }

    /// Parse a short key name. A trailing `m` (or `min`) selects minor.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let (note, mode) = if let Some(note) = name.strip_suffix("min") {
            (note, KeyMode::Minor)
        } else if let Some(note) = name.strip_suffix('m') {
            (note, KeyMode::Minor)
        } else {
            (name, KeyMode::Major)
        };
        let tonic = PitchClass::parse(note)?;
        Some(Key { tonic, mode })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
        };
        write!(f, "{} {}", self.tonic, mode)
    }
}

/// Scale degrees (semitones above the relative-major tonic) and qualities of
/// the pool, in iteration order.
const DIATONIC_TRIADS: [(i32, ChordQuality); 7] = [
    (0, ChordQuality::Major),
    (5, ChordQuality::Major),
    (7, ChordQuality::Major),
    (9, ChordQuality::Minor),
    (2, ChordQuality::Minor),
    (4, ChordQuality::Minor),
    (11, ChordQuality::Diminished),
];

/// The seven diatonic triads of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsonantPool {
    chords: [Chord; 7],
}

pub fn build_consonant_pool(key: Key) -> ConsonantPool {
    let base = key.relative_major().value() as i32;
    ConsonantPool {
        chords: DIATONIC_TRIADS.map(|(degree, quality)| build_chord(base + degree, quality)),
    }
}

impl ConsonantPool {
    pub fn chords(&self) -> &[Chord; 7] {
        &self.chords
    }

    /// True if `chord` is one of the pool's triads (root and quality match).
    pub fn contains(&self, chord: &Chord) -> bool {
        self.chords.iter().any(|c| c == chord)
    }

    /// True if any pool chord sounds pitch class `pc`.
    pub fn sounds(&self, pc: PitchClass) -> bool {
        self.chords.iter().any(|c| c.contains(pc))
    }
}

/// Krumhansl-Kessler major profile, indexed by semitones above the tonic.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor profile.
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Detect the key of a pitch-class histogram (weights indexed by pitch
/// class). Returns `None` when the histogram carries no information.
///
/// Candidates are tried in the order C major, C minor, C# major, ...; on a
/// tie the earlier candidate is kept.
pub fn detect_key(histogram: &[f64; 12]) -> Option<Key> {
    let mut best: Option<(Key, f64)> = None;
    for tonic in 0..12 {
        let candidates = [
            (KeyMode::Major, &MAJOR_PROFILE),
            (KeyMode::Minor, &MINOR_PROFILE),
        ];
        for (mode, profile) in candidates {
            let rotated: [f64; 12] = std::array::from_fn(|pc| profile[(pc + 12 - tonic) % 12]);
            let Some(r) = pearson(histogram, &rotated) else {
                continue;
            };
            if best.is_none_or(|(_, best_r)| r > best_r) {
                best = Some((Key::new(tonic as i32, mode), r));
            }
        }
    }
    if let Some((key, r)) = best {
        log::debug!("Detected key {key} (r = {r:.3})");
    }
    best.map(|(key, _)| key)
}

/// Pearson correlation; `None` when either series is constant.
fn pearson(xs: &[f64; 12], ys: &[f64; 12]) -> Option<f64> {
    let mean_x = xs.iter().sum::<f64>() / 12.0;
    let mean_y = ys.iter().sum::<f64>() / 12.0;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
