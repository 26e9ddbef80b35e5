//! The read-only project snapshot handed to the audio core.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::instrument::InstrumentConfig;
use crate::musical_time::{clamp_tempo, DEFAULT_TEMPO};
use crate::track::{Track, TrackId};

/// The `[start, end)` beat range that playback repeats and rendering covers.
///
/// `end > start` always holds: constructors repair an empty or inverted range
/// to a single beat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLoopRegion", into = "RawLoopRegion")]
pub struct LoopRegion {
    start: u32,
    end: u32,
    enabled: bool,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoopRegion {
    loop_start: u32,
    loop_end: u32,
    #[serde(default = "enabled_by_default")]
    loop_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl From<RawLoopRegion> for LoopRegion {
    fn from(raw: RawLoopRegion) -> Self {
        LoopRegion::new(raw.loop_start, raw.loop_end, raw.loop_enabled)
    }
}

impl From<LoopRegion> for RawLoopRegion {
    fn from(region: LoopRegion) -> Self {
        RawLoopRegion { loop_start: region.start, loop_end: region.end, loop_enabled: region.enabled }
    }
}

impl Default for LoopRegion {
    fn default() -> Self {
        Self::new(0, 16, true)
    }
}

impl LoopRegion {
    pub fn new(start: u32, end: u32, enabled: bool) -> Self {
        let start = start.min(u32::MAX - 1);
        let end = if end > start { end } else { start + 1 };
        Self { start, end, enabled }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Number of beats in the region.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Never true; a region spans at least one beat.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `beat` lies in `[start, end)`.
    pub fn contains(&self, beat: u32) -> bool {
        beat >= self.start && beat < self.end
    }
}

/// Tracks, instruments, tempo, and loop region for one scheduling pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub instruments: BTreeMap<TrackId, InstrumentConfig>,
    #[serde(default = "default_tempo")]
    pub tempo: u16,
    #[serde(flatten)]
    pub loop_region: LoopRegion,
}

fn default_tempo() -> u16 {
    DEFAULT_TEMPO
}

impl Default for ProjectSnapshot {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            instruments: BTreeMap::new(),
            tempo: DEFAULT_TEMPO,
            loop_region: LoopRegion::default(),
        }
    }
}

impl ProjectSnapshot {
    pub fn new(tempo: u16, loop_region: LoopRegion) -> Self {
        Self { tempo: clamp_tempo(tempo), loop_region, ..Self::default() }
    }

    /// Add a track together with its instrument.
    pub fn with_track(mut self, track: Track, instrument: InstrumentConfig) -> Self {
        self.instruments.insert(track.id, instrument);
        self.tracks.push(track);
        self
    }

    /// Tempo clamped to the accepted range.
    pub fn clamped_tempo(&self) -> u16 {
        clamp_tempo(self.tempo)
    }

    /// Instrument config for a track, if one is registered.
    pub fn instrument(&self, id: TrackId) -> Option<&InstrumentConfig> {
        self.instruments.get(&id)
    }

    /// Tracks that contribute to output, in `tracks` order.
    ///
    /// Muted tracks are skipped. If any track is soloed, every non-soloed
    /// track is skipped too; a muted and soloed track stays silent.
    pub fn audible_tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        let any_solo = self.tracks.iter().any(|t| t.solo);
        self.tracks.iter().filter(move |t| !t.muted && (!any_solo || t.solo))
    }
}
