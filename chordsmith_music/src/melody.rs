// Melody analysis: slot extraction and playback statistics.
//
// Reduces the melody track of a Standard MIDI File to what the genetic
// search and the output renderer need:
//
// - A `SlotSequence`: the piece cut into fixed-length slots (two beats by
//   default), each holding the MIDI pitch of the note that starts exactly on
//   the slot boundary, or nothing.
// - Tempo, an accompaniment velocity (a fraction of the melody's mean
//   velocity), and an octave shift that places the chords roughly one octave
//   below the melody's average register.
// - A duration-weighted pitch-class histogram for key detection.
//
// The melody track is the first track with a sounding note-on. A note-on
// with velocity 0 counts as a note-off, as the MIDI running-status
// convention allows.

use crate::error::HarmonizeError;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};

/// Tempo assumed when the file carries no tempo event (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Longest melody accepted, in slots. Every chromosome holds one chord per
/// slot, so this bounds the search's memory.
pub const MAX_SLOTS: usize = 1 << 16;

/// One entry per slot: the melody pitch (full MIDI number) starting the
/// slot, or `None` if no note was identified there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSequence {
    pub pitches: Vec<Option<u8>>,
}

impl SlotSequence {
    pub fn new(pitches: Vec<Option<u8>>) -> Self {
        SlotSequence { pitches }
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<u8> {
        self.pitches.get(slot).copied().flatten()
    }
}

/// Everything the pipeline needs to know about the input melody.
#[derive(Debug, Clone)]
pub struct MelodyAnalysis {
    /// Index of the melody track in the SMF.
    pub track_index: usize,
    pub slots: SlotSequence,
    pub ticks_per_beat: u16,
    /// Length of one slot in ticks.
    pub slot_ticks: u32,
    /// Microseconds per quarter note.
    pub tempo: u32,
    /// Velocity for the accompaniment notes.
    pub velocity: u8,
    /// Semitones added to every chord tone when rendering.
    pub octave_shift: u8,
    /// Sounding time per pitch class, in ticks.
    pub histogram: [f64; 12],
}

/// Analyze the melody of `smf`.
pub fn analyze_melody(
    smf: &Smf,
    slot_beats: u32,
    velocity_scale: f64,
) -> Result<MelodyAnalysis, HarmonizeError> {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(..) => return Err(HarmonizeError::UnsupportedTiming),
    };
    let track_index = smf
        .tracks
        .iter()
        .position(|track| track.iter().any(|e| note_on_key(e).is_some()))
        .ok_or(HarmonizeError::NoMelody)?;
    let track = &smf.tracks[track_index];

    let slot_ticks = (ticks_per_beat as u32).saturating_mul(slot_beats).max(1);
    let slots = extract_slots(track, slot_ticks)?;
    let tempo = find_tempo(smf);
    let velocity = accompaniment_velocity(track, velocity_scale);
    let octave_shift = octave_shift(track);
    let histogram = pitch_class_histogram(track);

    log::debug!(
        "Melody on track {}: {} slots of {} ticks, tempo {} us/q, velocity {}, shift {}",
        track_index,
        slots.len(),
        slot_ticks,
        tempo,
        velocity,
        octave_shift
    );

    Ok(MelodyAnalysis {
        track_index,
        slots,
        ticks_per_beat,
        slot_ticks,
        tempo,
        velocity,
        octave_shift,
        histogram,
    })
}

/// Cut a track into slots of `slot_ticks` ticks.
///
/// The slot count is the track length rounded up to whole slots. A slot is
/// filled by the first note-on landing exactly on its boundary. When the
/// track ends exactly on a slot boundary, the final slot takes the pitch of
/// the last released note instead.
///
/// Ticks are summed in `u64`: a track may hold any number of deltas of up
/// to 2^28 - 1 ticks each. More than `MAX_SLOTS` slots is an error.
pub fn extract_slots(
    track: &[TrackEvent],
    slot_ticks: u32,
) -> Result<SlotSequence, HarmonizeError> {
    let slot_ticks = slot_ticks.max(1) as u64;
    let total_ticks: u64 = track.iter().map(|e| e.delta.as_int() as u64).sum();
    let count = total_ticks.div_ceil(slot_ticks);
    if count > MAX_SLOTS as u64 {
        return Err(HarmonizeError::MelodyTooLong {
            slots: count,
            max: MAX_SLOTS,
        });
    }
    let count = count as usize;
    let mut pitches = vec![None; count];

    let mut tick = 0u64;
    let mut last_released = None;
    for event in track {
        tick += event.delta.as_int() as u64;
        if let Some(key) = note_on_key(event) {
            if tick % slot_ticks == 0 {
                let slot = (tick / slot_ticks) as usize;
                if let Some(entry) = pitches.get_mut(slot) {
                    entry.get_or_insert(key);
                }
            }
        } else if let Some(key) = note_off_key(event) {
            last_released = Some(key);
        }
    }

    if count > 0 && total_ticks % slot_ticks == 0 {
        if let Some(key) = last_released {
            pitches[count - 1] = Some(key);
        }
    }

    Ok(SlotSequence { pitches })
}

/// First tempo meta event in any track.
pub fn find_tempo(smf: &Smf) -> u32 {
    smf.tracks
        .iter()
        .flatten()
        .find_map(|e| match e.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        })
        .unwrap_or(DEFAULT_TEMPO)
}

fn accompaniment_velocity(track: &[TrackEvent], scale: f64) -> u8 {
    let velocities: Vec<u64> = track
        .iter()
        .filter_map(|e| match e.kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { vel, .. },
                ..
            } if vel.as_int() > 0 => Some(vel.as_int() as u64),
            _ => None,
        })
        .collect();
    if velocities.is_empty() {
        return 64;
    }
    let mean = velocities.iter().sum::<u64>() as f64 / velocities.len() as f64;
    (scale * mean).floor().clamp(1.0, 127.0) as u8
}

fn octave_shift(track: &[TrackEvent]) -> u8 {
    let octaves: Vec<u64> = track
        .iter()
        .filter_map(note_on_key)
        .map(|key| key as u64 / 12)
        .collect();
    if octaves.is_empty() {
        return 0;
    }
    let mean = octaves.iter().sum::<u64>() as f64 / octaves.len() as f64;
    let shifted = (mean - 1.0).trunc().max(0.0) as u8;
    shifted * 12
}

/// Duration-weighted pitch-class histogram. Every onset weighs at least one
/// tick; notes still sounding at the end are closed at the last event.
fn pitch_class_histogram(track: &[TrackEvent]) -> [f64; 12] {
    let mut histogram = [0.0; 12];
    let mut started: [Option<u64>; 128] = [None; 128];
    let mut tick = 0u64;

    let mut close = |key: u8, start: u64, end: u64| {
        histogram[(key % 12) as usize] += (end - start).max(1) as f64;
    };

    for event in track {
        tick += event.delta.as_int() as u64;
        if let Some(key) = note_on_key(event) {
            if let Some(start) = started[key as usize].replace(tick) {
                close(key, start, tick);
            }
        } else if let Some(key) = note_off_key(event) {
            if let Some(start) = started[key as usize].take() {
                close(key, start, tick);
            }
        }
    }
    for (key, start) in started.iter().enumerate() {
        if let Some(start) = start {
            close(key as u8, *start, tick);
        }
    }
    histogram
}

fn note_on_key(event: &TrackEvent) -> Option<u8> {
    match event.kind {
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } if vel.as_int() > 0 => Some(key.as_int()),
        _ => None,
    }
}

fn note_off_key(event: &TrackEvent) -> Option<u8> {
    match event.kind {
        TrackEventKind::Midi {
            message: MidiMessage::NoteOff { key, .. },
            ..
        } => Some(key.as_int()),
        TrackEventKind::Midi {
            message: MidiMessage::NoteOn { key, vel },
            ..
        } if vel.as_int() == 0 => Some(key.as_int()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use midly::num::{u4, u7, u15, u24, u28};
    use midly::{Format, Header, Track};

    pub(crate) fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        }
    }

    pub(crate) fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        }
    }

    /// A two-track SMF: tempo track plus a melody of (pitch, ticks) notes
    /// played back to back, each at velocity 100.
    pub(crate) fn melody_smf(tpb: u16, notes: &[(u8, u32)]) -> Smf<'static> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(tpb))));
        smf.tracks.push(vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(600_000))),
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]);
        let mut track: Track<'static> = Vec::new();
        for &(pitch, ticks) in notes {
            track.push(note_on(0, pitch, 100));
            track.push(note_off(ticks, pitch));
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
        smf
    }

    #[test]
    fn test_slots_on_boundaries() {
        // Half notes at 96 tpb, slot = 2 beats = 192 ticks.
        let smf = melody_smf(96, &[(60, 192), (62, 192), (64, 192)]);
        let slots = extract_slots(&smf.tracks[1], 192).unwrap();
        // Track ends on a boundary: last slot takes the last released note.
        assert_eq!(slots.pitches, vec![Some(60), Some(62), Some(64)]);
    }

    #[test]
    fn test_off_boundary_notes_leave_slot_empty() {
        // Quarter notes: onsets at 0, 96, 192, 288, 384 (total 480 ticks).
        let smf = melody_smf(96, &[(60, 96), (61, 96), (62, 96), (63, 96), (64, 96)]);
        let slots = extract_slots(&smf.tracks[1], 192).unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots.pitches, vec![Some(60), Some(62), Some(64)]);

        let smf = melody_smf(96, &[(60, 96), (61, 192), (62, 96)]);
        // Onsets at 0, 96, 288; total 384 ends on a boundary.
        let slots = extract_slots(&smf.tracks[1], 192).unwrap();
        assert_eq!(slots.pitches, vec![Some(60), Some(62)]);
    }

    #[test]
    fn test_slot_count_rounds_up() {
        let smf = melody_smf(96, &[(60, 100)]);
        let slots = extract_slots(&smf.tracks[1], 192).unwrap();
        assert_eq!(slots.pitches, vec![Some(60)]);

        let smf = melody_smf(96, &[(60, 200)]);
        let slots = extract_slots(&smf.tracks[1], 192).unwrap();
        assert_eq!(slots.pitches, vec![Some(60), None]);
    }

    #[test]
    fn test_empty_track_has_no_slots() {
        let slots = extract_slots(&[], 192).unwrap();
        assert!(slots.is_empty());
        assert_eq!(slots.get(0), None);
    }

    #[test]
    fn test_zero_velocity_note_on_is_release() {
        let track = vec![note_on(0, 60, 90), note_on(192, 60, 0)];
        let slots = extract_slots(&track, 192).unwrap();
        assert_eq!(slots.pitches, vec![Some(60)]);
        assert_eq!(note_on_key(&track[1]), None);
        assert_eq!(note_off_key(&track[1]), Some(60));
    }

    #[test]
    fn test_ticks_past_u32_range() {
        // 17 maximal deltas run past u32::MAX ticks.
        let slot_ticks = 0x0FFF_FFFF;
        let track: Vec<_> = (0..17).map(|_| note_on(slot_ticks, 60, 90)).collect();
        let slots = extract_slots(&track, slot_ticks).unwrap();
        assert_eq!(slots.len(), 17);
        assert_eq!(slots.get(0), None);
        assert!((1..17).all(|slot| slots.get(slot) == Some(60)));
    }

    #[test]
    fn test_overlong_melody_rejected() {
        let track: Vec<_> = (0..17).map(|_| note_on(0x0FFF_FFFF, 60, 90)).collect();
        match extract_slots(&track, 192) {
            Err(HarmonizeError::MelodyTooLong { slots, max }) => {
                assert_eq!(slots, (17 * 0x0FFF_FFFFu64).div_ceil(192));
                assert_eq!(max, MAX_SLOTS);
            }
            other => panic!("expected MelodyTooLong, got {other:?}"),
        }

        let smf = melody_smf(1, &[(60, 0x0FFF_FFFF)]);
        assert!(matches!(
            analyze_melody(&smf, 1, 0.9),
            Err(HarmonizeError::MelodyTooLong { .. })
        ));
    }

    #[test]
    fn test_long_track_histogram() {
        let track = vec![
            note_on(0x0FFF_FFFF, 60, 90),
            note_off(0x0FFF_FFFF, 60),
            note_on(0x0FFF_FFFF, 62, 90),
        ];
        let histogram = pitch_class_histogram(&track);
        assert_eq!(histogram[0], 0x0FFF_FFFF as f64);
        assert_eq!(histogram[2], 1.0);
    }

    #[test]
    fn test_analyze_statistics() {
        let smf = melody_smf(96, &[(60, 192), (67, 192), (72, 192), (64, 192)]);
        let analysis = analyze_melody(&smf, 2, 0.9).unwrap();
        assert_eq!(analysis.track_index, 1);
        assert_eq!(analysis.ticks_per_beat, 96);
        assert_eq!(analysis.slot_ticks, 192);
        assert_eq!(analysis.tempo, 600_000);
        assert_eq!(analysis.velocity, 90);
        // Octaves 5, 5, 6, 5 -> mean 5.25 -> 4 -> 48 semitones.
        assert_eq!(analysis.octave_shift, 48);
        assert_eq!(analysis.histogram[0], 384.0);
        assert_eq!(analysis.histogram[7], 192.0);
        assert_eq!(analysis.histogram[1], 0.0);
    }

    #[test]
    fn test_no_melody_is_an_error() {
        let smf = melody_smf(96, &[]);
        assert!(matches!(
            analyze_melody(&smf, 2, 0.9),
            Err(HarmonizeError::NoMelody)
        ));
    }

    #[test]
    fn test_missing_tempo_uses_default() {
        let mut smf = melody_smf(96, &[(60, 96)]);
        smf.tracks.remove(0);
        assert_eq!(find_tempo(&smf), DEFAULT_TEMPO);
    }
}
