// End-to-end accompaniment: melody analysis -> key -> genetic search ->
// rendered track.
//
// `harmonize` does not touch the input SMF; the caller decides whether to
// append the returned track (see midi.rs) and where to write it.

use crate::config::HarmonizerConfig;
use crate::error::HarmonizeError;
use crate::ga::{Evaluator, GaResult, evolve};
use crate::key::{Key, detect_key};
use crate::melody::{MelodyAnalysis, analyze_melody};
use crate::midi::render_accompaniment;
use chordsmith_prng::GameRng;
use midly::{Smf, Track};

/// Everything produced by one run.
#[derive(Debug)]
pub struct Harmonization {
    pub key: Key,
    /// True when the key came from the melody rather than the caller.
    pub key_detected: bool,
    pub melody: MelodyAnalysis,
    pub search: GaResult,
    pub track: Track<'static>,
}

/// Analyze `smf`, pick a key (unless `key` is given), run the search and
/// render the winning progression.
pub fn harmonize(
    smf: &Smf,
    config: &HarmonizerConfig,
    key: Option<Key>,
    rng: &mut GameRng,
) -> Result<Harmonization, HarmonizeError> {
    config.validate()?;
    let melody = analyze_melody(smf, config.slot_beats, config.velocity_scale)?;

    let (key, key_detected) = match key {
        Some(key) => (key, false),
        None => (
            detect_key(&melody.histogram).ok_or(HarmonizeError::KeyUndetected)?,
            true,
        ),
    };
    log::info!("Harmonizing {} slots in {}", melody.slots.len(), key);

    let evaluator = Evaluator::new(key, melody.slots.clone());
    let search = evolve(&evaluator, &config.ga, rng);
    let track = render_accompaniment(&search.best.genes, &melody);

    Ok(Harmonization {
        key,
        key_detected,
        melody,
        search,
        track,
    })
}
