//! Snapshot-to-note scheduling.
//!
//! Walks a project snapshot and resolves its notes to absolute-time note
//! events, either one beat at a time (live look-ahead) or a whole loop pass
//! at once (offline render). Both paths go through the same per-note
//! conversion so they make identical decisions.

use cs_ir::{seconds_per_16th, InstrumentConfig, Note, ProjectSnapshot, Track, TrackKind};
use tracing::debug;

use crate::voice::{NoteEvent, VoiceFactory, VoiceSink};

/// A note resolved against its track and instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledNote<'a> {
    pub kind: TrackKind,
    pub config: &'a InstrumentConfig,
    pub event: NoteEvent,
}

/// Convert a note to an event starting at `time`.
///
/// The peak gain folds together the instrument gain, the track volume, and
/// the note velocity.
pub fn note_event(note: &Note, track: &Track, config: &InstrumentConfig, time: f64, tempo: u16) -> NoteEvent {
    NoteEvent {
        pitch: note.clamped_pitch(),
        start: time,
        duration: note.clamped_duration() as f64 * seconds_per_16th(tempo),
        gain: config.clamped_gain() * track.clamped_volume() * note.clamped_velocity(),
    }
}

fn resolve<'a>(snapshot: &'a ProjectSnapshot, track: &'a Track, note: &Note, time: f64) -> Option<ScheduledNote<'a>> {
    let Some(config) = snapshot.instrument(track.id) else {
        debug!(track = track.id.0, "no instrument config, skipping note");
        return None;
    };
    Some(ScheduledNote {
        kind: track.kind,
        config,
        event: note_event(note, track, config, time, snapshot.clamped_tempo()),
    })
}

/// Notes starting exactly at `beat`, to sound at `time`.
///
/// Beats outside the loop region yield nothing.
pub fn notes_at_beat(snapshot: &ProjectSnapshot, beat: u32, time: f64) -> Vec<ScheduledNote<'_>> {
    if !snapshot.loop_region.contains(beat) {
        return Vec::new();
    }
    snapshot
        .audible_tracks()
        .flat_map(|track| track.notes_at(beat).map(move |note| (track, note)))
        .filter_map(|(track, note)| resolve(snapshot, track, note, time))
        .collect()
}

/// Every note in one pass of the loop region, timed from the loop start.
pub fn notes_in_loop(snapshot: &ProjectSnapshot) -> Vec<ScheduledNote<'_>> {
    let region = snapshot.loop_region;
    let spt = seconds_per_16th(snapshot.clamped_tempo());
    snapshot
        .audible_tracks()
        .flat_map(|track| track.notes.iter().map(move |note| (track, note)))
        .filter(|(_, note)| region.contains(note.start_beat))
        .filter_map(|(track, note)| {
            let time = (note.start_beat - region.start()) as f64 * spt;
            resolve(snapshot, track, note, time)
        })
        .collect()
}

/// Realize every note starting at `beat` into `sink`. Returns the number of
/// voices submitted.
pub fn schedule_beat(
    snapshot: &ProjectSnapshot,
    beat: u32,
    time: f64,
    factory: &mut VoiceFactory,
    sink: &mut dyn VoiceSink,
) -> usize {
    notes_at_beat(snapshot, beat, time)
        .iter()
        .map(|n| factory.schedule_note(&n.event, n.config, n.kind, sink))
        .sum()
}
