// MIDI input and accompaniment-track output.
//
// The accompaniment is appended to the input file as a new track, so the
// melody and its chords play together. Each chord becomes three
// simultaneous note-ons followed, one slot later, by three note-offs.
// Chord tones are pitch classes; the melody analysis supplies the octave
// shift that puts them in a playable register, plus tempo and velocity.
//
// Uses the `midly` crate for parsing and writing. A single-track (format 0)
// input is promoted to format 1 so it can hold the extra track.

use crate::chord::Chord;
use crate::error::HarmonizeError;
use crate::melody::MelodyAnalysis;
use midly::{
    Format, MetaMessage, MidiMessage, Smf, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u24, u28},
};
use std::path::Path;

/// Channel the accompaniment plays on.
const ACCOMPANIMENT_CHANNEL: u8 = 0;

/// Parse an SMF from bytes.
pub fn parse_smf(bytes: &[u8]) -> Result<Smf<'_>, HarmonizeError> {
    Ok(Smf::parse(bytes)?)
}

/// Render one chord per slot as a new track.
pub fn render_accompaniment(chords: &[Chord], melody: &MelodyAnalysis) -> Track<'static> {
    let channel = u4::new(ACCOMPANIMENT_CHANNEL);
    let vel = u7::new(melody.velocity.min(127));
    let mut track: Track<'static> = Vec::with_capacity(chords.len() * 6 + 2);

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(melody.tempo))),
    });

    for chord in chords {
        let keys = chord
            .notes()
            .map(|pc| u7::new(pc.value().saturating_add(melody.octave_shift).min(127)));

        for &key in &keys {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key, vel },
                },
            });
        }
        for (i, &key) in keys.iter().enumerate() {
            let delta = if i == 0 { melody.slot_ticks } else { 0 };
            track.push(TrackEvent {
                delta: u28::new(delta),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff { key, vel },
                },
            });
        }
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// Add `track` to `smf`, promoting a single-track file to multi-track.
pub fn append_track<'a>(smf: &mut Smf<'a>, track: Track<'a>) {
    if smf.header.format == Format::SingleTrack {
        smf.header.format = Format::Parallel;
    }
    smf.tracks.push(track);
}

/// Serialize an SMF to bytes.
pub fn encode_smf(smf: &Smf) -> Result<Vec<u8>, HarmonizeError> {
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Write an SMF to a file.
pub fn write_smf(smf: &Smf, path: &Path) -> Result<(), HarmonizeError> {
    let buf = encode_smf(smf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}
