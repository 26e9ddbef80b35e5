//! Tracks and notes on the 16th-note grid.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Stable identifier linking a track to its instrument config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u32);

/// Whether a track plays pitched voices or procedural percussion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    #[default]
    Synth,
    Drums,
}

/// A note on the grid. Positions and durations are in 16th-note beats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// MIDI pitch (0-127).
    pub pitch: u8,
    pub start_beat: u32,
    /// Length in beats (at least 1).
    pub duration: u32,
    /// Velocity (0..1).
    #[serde(default = "full_velocity")]
    pub velocity: f32,
}

fn full_velocity() -> f32 {
    1.0
}

impl Note {
    /// A full-velocity note.
    pub fn new(pitch: u8, start_beat: u32, duration: u32) -> Self {
        Self { pitch, start_beat, duration, velocity: 1.0 }
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity;
        self
    }

    /// Pitch clamped to the MIDI range.
    pub fn clamped_pitch(&self) -> u8 {
        self.pitch.min(127)
    }

    /// Duration of at least one beat.
    pub fn clamped_duration(&self) -> u32 {
        self.duration.max(1)
    }

    /// Velocity clamped to [0, 1].
    pub fn clamped_velocity(&self) -> f32 {
        if self.velocity.is_finite() { self.velocity.clamp(0.0, 1.0) } else { 0.0 }
    }
}

/// A sequence of notes sharing one instrument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    #[serde(rename = "type", default)]
    pub kind: TrackKind,
    /// Notes in insertion order.
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    /// Track volume (0..1).
    #[serde(default = "full_volume")]
    pub volume: f32,
}

fn full_volume() -> f32 {
    1.0
}

impl Track {
    /// Create an empty, unmuted track at full volume.
    pub fn new(id: TrackId, kind: TrackKind) -> Self {
        Self { id, kind, notes: Vec::new(), muted: false, solo: false, volume: 1.0 }
    }

    /// Builder-style note list.
    pub fn with_notes(mut self, notes: impl IntoIterator<Item = Note>) -> Self {
        self.notes.extend(notes);
        self
    }

    /// Volume clamped to [0, 1].
    pub fn clamped_volume(&self) -> f32 {
        if self.volume.is_finite() { self.volume.clamp(0.0, 1.0) } else { 0.0 }
    }

    /// Notes starting exactly at `beat`, in insertion order.
    pub fn notes_at(&self, beat: u32) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(move |n| n.start_beat == beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_clamps() {
        let note = Note { pitch: 200, start_beat: 0, duration: 0, velocity: 1.7 };
        assert_eq!(note.clamped_pitch(), 127);
        assert_eq!(note.clamped_duration(), 1);
        assert_eq!(note.clamped_velocity(), 1.0);
    }

    #[test]
    fn notes_at_preserves_insertion_order() {
        let track = Track::new(TrackId(1), TrackKind::Synth).with_notes([
            Note::new(64, 4, 1),
            Note::new(60, 0, 1),
            Note::new(67, 4, 2),
        ]);
        let pitches: Vec<u8> = track.notes_at(4).map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![64, 67]);
    }

    #[test]
    fn deserializes_track_json() {
        let track: Track = serde_json::from_str(
            r#"{"id":3,"type":"drums","notes":[{"pitch":36,"startBeat":0,"duration":1}]}"#,
        )
        .unwrap();
        assert_eq!(track.id, TrackId(3));
        assert_eq!(track.kind, TrackKind::Drums);
        assert_eq!(track.notes[0].velocity, 1.0);
        assert_eq!(track.volume, 1.0);
        assert!(!track.muted);
    }
}
