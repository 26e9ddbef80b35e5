//! Offline rendering of one loop pass.
//!
//! Uses a private mixer with the same limiter and master gain as the live
//! bus, fed by the same note resolution the live scheduler uses.

use std::sync::Arc;

use cs_engine::{notes_in_loop, Mixer, PulseBank, VoiceFactory, VoiceSink};
use cs_formats::buffer_to_wav;
use cs_ir::{seconds_per_16th, AudioBuffer, ProjectSnapshot};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Silence appended after the last beat so releases can ring out.
pub const RENDER_TAIL: f64 = 1.0;

/// A finished offline render.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub sample_rate: u32,
    pub buffer: AudioBuffer,
}

/// Length in seconds of one loop pass plus the release tail.
pub fn render_duration(snapshot: &ProjectSnapshot) -> f64 {
    snapshot.loop_region.len() as f64 * seconds_per_16th(snapshot.clamped_tempo()) + RENDER_TAIL
}

/// Realize every note of the loop into `sink`, reporting progress from 0
/// to 0.5. Returns the number of voices submitted.
pub fn schedule_loop(
    snapshot: &ProjectSnapshot,
    factory: &mut VoiceFactory,
    sink: &mut dyn VoiceSink,
    progress: &mut dyn FnMut(f32),
) -> usize {
    let notes = notes_in_loop(snapshot);
    let total = notes.len();
    progress(0.0);
    let mut voices = 0;
    for (i, note) in notes.iter().enumerate() {
        voices += factory.schedule_note(&note.event, note.config, note.kind, sink);
        progress(0.5 * (i + 1) as f32 / total as f32);
    }
    if total == 0 {
        progress(0.5);
    }
    voices
}

/// Render one loop pass to a float buffer.
pub fn render(
    snapshot: &ProjectSnapshot,
    config: &EngineConfig,
    master_volume: f32,
    pulses: Arc<PulseBank>,
    progress: &mut dyn FnMut(f32),
) -> RenderOutput {
    let sample_rate = config.render_sample_rate.max(1);
    let mut factory = VoiceFactory::new(pulses, sample_rate, config.noise_seed);
    let mut mixer = Mixer::new(sample_rate, config.limiter, master_volume);

    let voices = schedule_loop(snapshot, &mut factory, &mut mixer, progress);
    let duration = render_duration(snapshot);
    let frames = (duration * sample_rate as f64).ceil() as usize;
    let buffer = mixer.render(frames, config.render_channels.max(1));
    progress(0.9);

    debug!(voices, frames, duration, peak = buffer.peak(), "offline render finished");
    RenderOutput { sample_rate, buffer }
}

/// Render one loop pass and encode it as 16-bit PCM WAV.
pub fn render_to_wav(
    snapshot: &ProjectSnapshot,
    config: &EngineConfig,
    master_volume: f32,
    pulses: Arc<PulseBank>,
    progress: &mut dyn FnMut(f32),
) -> Result<Vec<u8>, EngineError> {
    let output = render(snapshot, config, master_volume, pulses, progress);
    let wav = buffer_to_wav(&output.buffer, output.sample_rate)?;
    progress(1.0);
    info!(
        bytes = wav.len(),
        sample_rate = output.sample_rate,
        tempo = snapshot.clamped_tempo(),
        "rendered loop to wav"
    );
    Ok(wav)
}
