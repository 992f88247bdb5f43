// Triads over the 12 equal-tempered pitch classes.
//
// A `Chord` is a root pitch class plus a quality (major, minor, diminished).
// Its three notes are derived at construction and never change. Roots are
// reduced modulo 12 on the way in, so any integer (including a full MIDI
// pitch or a negative offset) is a valid root.
//
// Used by key.rs to build the consonant pool and by ga.rs as the gene type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pitch modulo one octave, always in 0..12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PitchClass(u8);

impl PitchClass {
    /// Reduce any integer pitch (MIDI number, interval sum, negative offset)
    /// into a pitch class.
    pub fn new(pitch: i32) -> Self {
        PitchClass(pitch.rem_euclid(12) as u8)
    }

    pub fn from_midi(pitch: u8) -> Self {
        PitchClass(pitch % 12)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Transpose upward by `semitones`, wrapping at the octave.
    pub fn transpose(self, semitones: i32) -> Self {
        PitchClass::new(self.0 as i32 + semitones)
    }

    /// Conventional spelling: sharps, except Eb, Ab and Bb.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "C",
            1 => "C#",
            2 => "D",
            3 => "Eb",
            4 => "E",
            5 => "F",
            6 => "F#",
            7 => "G",
            8 => "Ab",
            9 => "A",
            10 => "Bb",
            _ => "B",
        }
    }

    /// Parse a note name such as `C`, `F#`, `Bb` or `eb`.
    pub fn parse(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let natural = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let accidental = match chars.as_str() {
            "" => 0,
            "#" | "s" => 1,
            "b" | "-" => -1,
            _ => return None,
        };
        Some(PitchClass::new(natural + accidental))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Triad quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 3] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Diminished,
    ];

    /// Semitone offsets of the three chord tones above the root.
    pub fn intervals(self) -> [i32; 3] {
        match self {
            ChordQuality::Major => [0, 4, 7],
            ChordQuality::Minor => [0, 3, 7],
            ChordQuality::Diminished => [0, 3, 6],
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
        }
    }
}

/// An immutable triad. Two chords are equal when root and quality match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    root: PitchClass,
    quality: ChordQuality,
    notes: [PitchClass; 3],
}

/// Build a triad on `root` (any integer, reduced mod 12).
pub fn build_chord(root: i32, quality: ChordQuality) -> Chord {
    let root = PitchClass::new(root);
    let notes = quality.intervals().map(|offset| root.transpose(offset));
    Chord { root, quality, notes }
}

impl Chord {
    pub fn root(&self) -> PitchClass {
        self.root
    }

    pub fn quality(&self) -> ChordQuality {
        self.quality
    }

    /// Root, third, fifth as pitch classes.
    pub fn notes(&self) -> [PitchClass; 3] {
        self.notes
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        self.notes.contains(&pc)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_reduction() {
        assert_eq!(PitchClass::new(60).value(), 0);
        assert_eq!(PitchClass::new(-1).value(), 11);
        assert_eq!(PitchClass::new(-13).value(), 11);
        assert_eq!(PitchClass::from_midi(127).value(), 7);
    }

    #[test]
    fn test_chord_notes() {
        let c = build_chord(0, ChordQuality::Major);
        assert_eq!(c.notes().map(PitchClass::value), [0, 4, 7]);

        let a_minor = build_chord(9, ChordQuality::Minor);
        assert_eq!(a_minor.notes().map(PitchClass::value), [9, 0, 4]);

        let b_dim = build_chord(11, ChordQuality::Diminished);
        assert_eq!(b_dim.notes().map(PitchClass::value), [11, 2, 5]);
    }

    #[test]
    fn test_every_chord_has_three_distinct_notes() {
        for root in -24..=144 {
            for quality in ChordQuality::ALL {
                let chord = build_chord(root, quality);
                let [a, b, c] = chord.notes();
                assert!(a != b && b != c && a != c, "{chord} has repeated notes");
                assert!(chord.notes().iter().all(|pc| pc.value() < 12));
            }
        }
    }

    #[test]
    fn test_octave_invariance() {
        for root in 0..120 {
            for quality in ChordQuality::ALL {
                assert_eq!(
                    build_chord(root, quality).notes(),
                    build_chord(root + 12, quality).notes()
                );
                assert_eq!(build_chord(root, quality), build_chord(root + 12, quality));
            }
        }
    }

    #[test]
    fn test_out_of_range_root_is_reduced() {
        let chord = build_chord(64, ChordQuality::Minor);
        assert_eq!(chord.root().value(), 4);
        assert_eq!(chord, build_chord(4, ChordQuality::Minor));
    }

    #[test]
    fn test_equality_uses_quality() {
        assert_ne!(
            build_chord(0, ChordQuality::Major),
            build_chord(0, ChordQuality::Minor)
        );
    }

    #[test]
    fn test_names() {
        assert_eq!(build_chord(0, ChordQuality::Major).to_string(), "C");
        assert_eq!(build_chord(9, ChordQuality::Minor).to_string(), "Am");
        assert_eq!(build_chord(11, ChordQuality::Diminished).to_string(), "Bdim");
        assert_eq!(PitchClass::parse("F#"), Some(PitchClass::new(6)));
        assert_eq!(PitchClass::parse("bb"), Some(PitchClass::new(10)));
        assert_eq!(PitchClass::parse("Cb"), Some(PitchClass::new(11)));
        assert_eq!(PitchClass::parse("H"), None);
    }
}
