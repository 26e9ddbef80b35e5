//! Voice mix bus.
//!
//! Sums active voices into a mono block, runs the master chain (limiter,
//! then master gain), and copies the result to every output channel.
//! Voices leave the mixer once their stop frame has passed. The chain
//! topology is fixed at construction; only the master gain can change
//! afterwards.
//!
//! A realtime mixer (`Mixer::realtime`) never touches the allocator while
//! rendering: its voice arena is pre-sized, inserts past the limit are
//! refused, and finished voices are parked for the owner to hand off
//! instead of being dropped in place.

use cs_ir::{AudioBuffer, BLOCK_SIZE};
use slotmap::SlotMap;
use tracing::warn;

use crate::limiter::{Limiter, LimiterConfig};
use crate::render::VoiceRenderer;
use crate::voice::{Voice, VoiceSink};

slotmap::new_key_type! {
    /// Handle to a voice owned by a mixer.
    pub struct VoiceKey;
}

/// Voice limit for the live audio thread.
pub const MAX_LIVE_VOICES: usize = 256;

/// Mix bus shared by live playback and offline rendering.
pub struct Mixer {
    voices: SlotMap<VoiceKey, VoiceRenderer>,
    /// `None` grows as needed (offline); `Some` never reallocates.
    max_voices: Option<usize>,
    finished: Vec<VoiceKey>,
    retired: Vec<Voice>,
    limiter: Limiter,
    master_volume: f32,
    sample_rate: u32,
    scratch: Vec<f32>,
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 }
}

impl Mixer {
    /// Unbounded mixer; finished voices are dropped in place.
    pub fn new(sample_rate: u32, limiter: LimiterConfig, master_volume: f32) -> Self {
        Self {
            voices: SlotMap::with_key(),
            max_voices: None,
            finished: Vec::new(),
            retired: Vec::new(),
            limiter: Limiter::new(limiter, sample_rate),
            master_volume: clamp_volume(master_volume),
            sample_rate,
            scratch: vec![0.0; BLOCK_SIZE],
        }
    }

    /// Mixer holding at most `max_voices` voices, live and retired together.
    /// All storage is reserved here.
    pub fn realtime(sample_rate: u32, limiter: LimiterConfig, master_volume: f32, max_voices: usize) -> Self {
        Self {
            voices: SlotMap::with_capacity_and_key(max_voices),
            max_voices: Some(max_voices),
            finished: Vec::with_capacity(max_voices),
            retired: Vec::with_capacity(max_voices),
            ..Self::new(sample_rate, limiter, master_volume)
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether another voice can be added without growing the arena.
    pub fn has_room(&self) -> bool {
        self.max_voices.map_or(true, |max| self.voices.len() + self.retired.len() < max)
    }

    /// Take ownership of a voice until it finishes. A full realtime mixer
    /// hands the voice back.
    pub fn add_voice(&mut self, voice: Voice) -> Result<VoiceKey, Voice> {
        if !self.has_room() {
            return Err(voice);
        }
        Ok(self.voices.insert(VoiceRenderer::new(voice, self.sample_rate)))
    }

    /// Next finished voice waiting to be dropped elsewhere (realtime only).
    pub fn pop_retired(&mut self) -> Option<Voice> {
        self.retired.pop()
    }

    /// Put back a voice taken with `pop_retired` that could not be handed off.
    pub fn keep_retired(&mut self, voice: Voice) {
        if self.retired.len() < self.retired.capacity() {
            self.retired.push(voice);
        }
    }

    pub fn retired_voices(&self) -> usize {
        self.retired.len()
    }

    /// Number of voices still sounding or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Master gain, clamped to [0, 1].
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = clamp_volume(volume);
    }

    /// Render `out.frames()` frames starting at absolute frame `start_frame`.
    pub fn render_block(&mut self, out: &mut AudioBuffer, start_frame: u64) {
        let frames = out.frames();
        let mut offset = 0;
        while offset < frames {
            let len = (frames - offset).min(BLOCK_SIZE);
            let block = &mut self.scratch[..len];
            block.fill(0.0);
            let block_start = start_frame + offset as u64;
            for voice in self.voices.values_mut() {
                voice.render_add(block, block_start, self.sample_rate);
            }
            self.limiter.process(block);
            for s in block.iter_mut() {
                *s *= self.master_volume;
            }
            out.write_mono(offset, block);
            offset += len;
        }
        let end = start_frame + frames as u64;
        self.retire_finished(end);
    }

    fn retire_finished(&mut self, end: u64) {
        self.finished.clear();
        self.finished
            .extend(self.voices.iter().filter(|(_, v)| v.is_finished(end)).map(|(key, _)| key));
        for key in self.finished.drain(..) {
            if let Some(renderer) = self.voices.remove(key) {
                if self.max_voices.is_some() {
                    self.retired.push(renderer.into_voice());
                }
            }
        }
    }

    /// Render a fresh buffer from frame zero.
    pub fn render(&mut self, frames: usize, channels: u16) -> AudioBuffer {
        let mut out = AudioBuffer::new(channels, frames);
        self.render_block(&mut out, 0);
        out
    }
}

impl VoiceSink for Mixer {
    fn submit(&mut self, voice: Voice) {
        if let Err(voice) = self.add_voice(voice) {
            warn!(pitch = voice.origin.pitch, time = voice.start, "mixer full, dropping voice");
        }
    }
}
