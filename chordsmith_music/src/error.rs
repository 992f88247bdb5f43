// Error type for the accompaniment pipeline.
//
// Only the edges can fail: reading and writing files, parsing MIDI and JSON
// config, and melodies the slot extractor cannot work with (timecode
// timing, no notes, or too many slots). The genetic search itself is
// infallible; a search that hits its iteration cap still returns its best
// chromosome.

use std::fmt;

#[derive(Debug)]
pub enum HarmonizeError {
    /// Reading the input or writing the output failed.
    Io(std::io::Error),
    /// The input is not a valid Standard MIDI File.
    Midi(midly::Error),
    /// The config file is not valid JSON for `HarmonizerConfig`.
    Config(serde_json::Error),
    /// A config value is out of its allowed range.
    InvalidConfig(String),
    /// SMPTE timecode timing; slots are measured in beats, so metrical
    /// timing is required.
    UnsupportedTiming,
    /// No track contains a sounding note.
    NoMelody,
    /// The melody spans more slots than the search accepts.
    MelodyTooLong { slots: u64, max: usize },
    /// The melody's pitch content does not indicate any key.
    KeyUndetected,
}

impl fmt::Display for HarmonizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarmonizeError::Io(e) => write!(f, "I/O error: {e}"),
            HarmonizeError::Midi(e) => write!(f, "MIDI parse error: {e}"),
            HarmonizeError::Config(e) => write!(f, "config parse error: {e}"),
            HarmonizeError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            HarmonizeError::UnsupportedTiming => {
                write!(f, "timecode-based MIDI timing is not supported")
            }
            HarmonizeError::NoMelody => write!(f, "no track contains any notes"),
            HarmonizeError::MelodyTooLong { slots, max } => {
                write!(f, "melody spans {slots} slots, at most {max} are supported")
            }
            HarmonizeError::KeyUndetected => {
                write!(f, "could not detect a key; pass one with --key")
            }
        }
    }
}

impl std::error::Error for HarmonizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HarmonizeError::Io(e) => Some(e),
            HarmonizeError::Midi(e) => Some(e),
            HarmonizeError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HarmonizeError {
    fn from(e: std::io::Error) -> Self {
        HarmonizeError::Io(e)
    }
}

impl From<midly::Error> for HarmonizeError {
    fn from(e: midly::Error) -> Self {
        HarmonizeError::Midi(e)
    }
}

impl From<serde_json::Error> for HarmonizeError {
    fn from(e: serde_json::Error) -> Self {
        HarmonizeError::Config(e)
    }
}
