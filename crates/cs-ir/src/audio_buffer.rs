//! Multichannel f32 audio buffer with planar layout.

use alloc::vec;
use alloc::vec::Vec;

/// Maximum number of audio channels per buffer.
pub const MAX_CHANNELS: u16 = 8;

/// Default block size for audio processing.
pub const BLOCK_SIZE: usize = 256;

/// A multichannel f32 audio buffer in planar layout.
///
/// Data is stored as `channels` contiguous planes of `frames` samples each.
/// `data[ch * frames + frame]` gives the sample for channel `ch` at `frame`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: u16,
    frames: usize,
}

impl AudioBuffer {
    /// Create a new silent buffer with the given dimensions.
    pub fn new(channels: u16, frames: usize) -> Self {
        let channels = channels.clamp(1, MAX_CHANNELS);
        Self {
            data: vec![0.0; channels as usize * frames],
            channels,
            frames,
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Read-only access to one channel's sample data.
    pub fn channel(&self, ch: u16) -> &[f32] {
        let start = ch as usize * self.frames;
        &self.data[start..start + self.frames]
    }

    /// Mutable access to one channel's sample data.
    pub fn channel_mut(&mut self, ch: u16) -> &mut [f32] {
        let start = ch as usize * self.frames;
        let len = self.frames;
        &mut self.data[start..start + len]
    }

    /// Copy a mono signal into every channel, starting at `offset` frames.
    pub fn write_mono(&mut self, offset: usize, mono: &[f32]) {
        let end = (offset + mono.len()).min(self.frames);
        if offset >= end {
            return;
        }
        for ch in 0..self.channels {
            self.channel_mut(ch)[offset..end].copy_from_slice(&mono[..end - offset]);
        }
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Iterate frames in interleaved order (`frame0.ch0, frame0.ch1, ...`).
    pub fn interleaved(&self) -> impl Iterator<Item = f32> + '_ {
        let channels = self.channels as usize;
        (0..self.frames * channels).map(move |i| {
            let frame = i / channels;
            let ch = i % channels;
            self.data[ch * self.frames + frame]
        })
    }
}
