// Chordsmith: chord accompaniment for monophonic MIDI melodies.
//
// Reads a melody from a Standard MIDI File, works out its key, and searches
// for one triad per two-beat slot that fits both the key and the melody
// note sounding in that slot. The search is a generational genetic
// algorithm over chord sequences; the winning sequence is rendered as a new
// MIDI track alongside the melody.
//
// Architecture:
// - chord.rs: Pitch classes and major/minor/diminished triads
// - key.rs: Keys, the seven-chord diatonic pool of a key, key detection
// - melody.rs: Slot extraction and tempo/velocity/register statistics
// - ga.rs: Chromosomes, fitness evaluation, selection/crossover/mutation,
//   and the search loop
// - midi.rs: SMF parsing and accompaniment-track rendering
// - config.rs: Run configuration with defaults and JSON loading
// - error.rs: Pipeline error type
// - pipeline.rs: End-to-end `harmonize`
//
// The search is deterministic given a seed (see `chordsmith_prng`).

pub mod chord;
pub mod config;
pub mod error;
pub mod ga;
pub mod key;
pub mod melody;
pub mod midi;
pub mod pipeline;
