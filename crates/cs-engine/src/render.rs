//! Per-voice sample rendering.
//!
//! A `VoiceRenderer` owns one voice plus its running state (oscillator
//! phase, filter memory, automation cursors) and adds its output into a
//! mono block. Live and offline mixing both go through this code.

use std::f64::consts::TAU;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use cs_ir::Automation;
use tracing::warn;

use crate::frequency::detune_ratio;
use crate::voice::{FilterKind, FilterSpec, Source, Voice, MAX_FILTERS};

/// Biquad coefficients for a filter stage, or `None` if the stage cannot be
/// realized at this sample rate.
pub fn filter_coefficients(spec: &FilterSpec, sample_rate: u32) -> Option<Coefficients<f32>> {
    let kind = match spec.kind {
        FilterKind::HighPass => Type::HighPass,
        FilterKind::BandPass => Type::BandPass,
        FilterKind::Peaking { gain_db } => Type::PeakingEQ(gain_db),
    };
    match Coefficients::<f32>::from_params(kind, (sample_rate as f32).hz(), spec.frequency.hz(), spec.q) {
        Ok(coeffs) => Some(coeffs),
        Err(err) => {
            warn!(?spec, sample_rate, ?err, "skipping filter stage");
            None
        }
    }
}

/// Walks an automation curve forward in time without re-searching.
#[derive(Clone, Debug, Default)]
struct Cursor {
    next: usize,
}

impl Cursor {
    fn value(&mut self, curve: &Automation, time: f64) -> f32 {
        let events = curve.events();
        while self.next < events.len() && events[self.next].time <= time {
            self.next += 1;
        }
        curve.value_between(self.next, time)
    }
}

/// Reduce `sample` to `bits` of resolution.
pub fn quantize(sample: f32, bits: u8) -> f32 {
    let bits = bits.clamp(1, 16);
    let levels = ((1u32 << bits) / 2) as f32;
    (sample * levels).round() / levels
}

/// Rendering state for one voice.
pub struct VoiceRenderer {
    voice: Voice,
    start_frame: u64,
    stop_frame: u64,
    phase: f64,
    vibrato_phase: f64,
    filters: heapless::Vec<DirectForm2Transposed<f32>, MAX_FILTERS>,
    gain_cursor: Cursor,
    freq_cursor: Cursor,
}

impl VoiceRenderer {
    pub fn new(voice: Voice, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let start_frame = (voice.start * sr).round().max(0.0) as u64;
        let stop_frame = (voice.stop * sr).round().max(0.0) as u64;
        let mut filters = heapless::Vec::new();
        for spec in &voice.filters {
            if let Some(coeffs) = filter_coefficients(spec, sample_rate) {
                // Capacity matches the voice's own filter list.
                let _ = filters.push(DirectForm2Transposed::<f32>::new(coeffs));
            }
        }
        Self {
            voice,
            start_frame,
            stop_frame: stop_frame.max(start_frame),
            phase: 0.0,
            vibrato_phase: 0.0,
            filters,
            gain_cursor: Cursor::default(),
            freq_cursor: Cursor::default(),
        }
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn into_voice(self) -> Voice {
        self.voice
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn stop_frame(&self) -> u64 {
        self.stop_frame
    }

    /// True once the voice has nothing left to contribute at `frame`.
    pub fn is_finished(&self, frame: u64) -> bool {
        frame >= self.stop_frame
    }

    /// Add this voice into `out`, whose first sample is at absolute frame
    /// `block_start`.
    pub fn render_add(&mut self, out: &mut [f32], block_start: u64, sample_rate: u32) {
        let sr = sample_rate as f64;
        let block_end = block_start + out.len() as u64;
        if block_end <= self.start_frame || block_start >= self.stop_frame {
            return;
        }
        let first = self.start_frame.saturating_sub(block_start) as usize;
        let last = (self.stop_frame.min(block_end) - block_start) as usize;

        for (i, slot) in out.iter_mut().enumerate().take(last).skip(first) {
            let frame = block_start + i as u64;
            let time = frame as f64 / sr;
            let offset = (frame - self.start_frame) as usize;

            let mut freq = self.freq_cursor.value(&self.voice.frequency, time) as f64;
            if let Some(vibrato) = self.voice.vibrato {
                let lfo = (TAU * self.vibrato_phase).sin() as f32;
                freq *= detune_ratio(vibrato.depth_cents * lfo) as f64;
                self.vibrato_phase = (self.vibrato_phase + vibrato.rate_hz as f64 / sr).fract();
            }

            let raw = match &self.voice.source {
                Source::Oscillator(shape) => {
                    let s = shape.sample(self.phase);
                    self.phase = (self.phase + freq / sr).rem_euclid(1.0);
                    s
                }
                Source::Noise(buffer) => buffer.get(offset).copied().unwrap_or(0.0),
            };

            let mut sample = raw;
            for filter in self.filters.iter_mut() {
                sample = filter.run(sample);
            }
            if let Some(crush) = self.voice.bitcrush {
                sample = quantize(sample, crush.bits);
            }
            *slot += sample * self.gain_cursor.value(&self.voice.gain, time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::NoteOrigin;
    use crate::waveform::Shape;
    use cs_ir::{Bitcrush, Vibrato};
    use std::sync::Arc;

    const SR: u32 = 8000;

    fn origin() -> NoteOrigin {
        NoteOrigin { pitch: 69, time: 0.0, gain: 1.0 }
    }

    fn constant_voice(source: Source, start: f64, stop: f64, gain: f32) -> Voice {
        let mut v = Voice::new(origin(), source, start, stop);
        v.frequency = Automation::constant(1000.0);
        v.gain = Automation::constant(gain);
        v
    }

    #[test]
    fn renders_only_inside_voice_window() {
        let voice = constant_voice(Source::Oscillator(Shape::Square), 0.01, 0.02, 0.5);
        let mut r = VoiceRenderer::new(voice, SR);
        let mut out = vec![0.0f32; 256];
        r.render_add(&mut out, 0, SR);
        assert!(out[..80].iter().all(|&s| s == 0.0));
        assert!(out[80..160].iter().all(|&s| s.abs() == 0.5));
        assert!(out[160..].iter().all(|&s| s == 0.0));
        assert!(r.is_finished(160));
        assert!(!r.is_finished(159));
    }

    #[test]
    fn spans_block_boundaries() {
        let voice = constant_voice(Source::Oscillator(Shape::Square), 0.0, 0.05, 1.0);
        let mut r = VoiceRenderer::new(voice, SR);
        let mut a = vec![0.0f32; 256];
        let mut b = vec![0.0f32; 256];
        r.render_add(&mut a, 0, SR);
        r.render_add(&mut b, 256, SR);
        assert!(a.iter().all(|&s| s != 0.0));
        assert!(b[..144].iter().all(|&s| s != 0.0));
        assert!(b[144..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn noise_source_reads_buffer_from_start() {
        let buf: Arc<[f32]> = vec![0.25f32; 10].into();
        let voice = constant_voice(Source::Noise(buf), 0.0, 1.0, 1.0);
        let mut r = VoiceRenderer::new(voice, SR);
        let mut out = vec![0.0f32; 16];
        r.render_add(&mut out, 0, SR);
        assert!(out[..10].iter().all(|&s| s == 0.25));
        assert!(out[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn invalid_filter_is_skipped() {
        let voice = constant_voice(Source::Oscillator(Shape::Square), 0.0, 0.01, 1.0)
            .with_filter(FilterSpec::high_pass(7000.0));
        let r = VoiceRenderer::new(voice, SR);
        assert!(r.filters.is_empty());
    }

    #[test]
    fn valid_filter_is_built() {
        assert!(filter_coefficients(&FilterSpec::band_pass(1500.0, 1.0), 44100).is_some());
        assert!(filter_coefficients(&FilterSpec::peaking(8000.0, 1.0, 6.0), 44100).is_some());
    }

    #[test]
    fn bitcrush_quantizes() {
        assert_eq!(quantize(0.3, 2), 0.5);
        assert_eq!(quantize(-0.8, 1), -1.0);
        let mut voice = constant_voice(Source::Oscillator(Shape::Sine), 0.0, 0.01, 1.0);
        voice.bitcrush = Some(Bitcrush { bits: 2 });
        let mut r = VoiceRenderer::new(voice, SR);
        let mut out = vec![0.0f32; 80];
        r.render_add(&mut out, 0, SR);
        assert!(out.iter().all(|&s| [-1.0, -0.5, 0.0, 0.5, 1.0].contains(&s)));
    }

    #[test]
    fn gain_automation_is_followed() {
        let mut voice = constant_voice(Source::Oscillator(Shape::Square), 0.0, 1.0, 0.0);
        voice.gain = Automation::new(0.0);
        voice.gain.set_value_at(0.0, 0.0).linear_ramp_to(1.0, 0.1);
        let mut r = VoiceRenderer::new(voice, SR);
        let mut out = vec![0.0f32; 800];
        r.render_add(&mut out, 0, SR);
        assert!((out[400].abs() - 0.5).abs() < 1e-3);
    }

    /// Spacing in samples between successive rising zero crossings.
    fn crossing_periods(samples: &[f32]) -> Vec<f64> {
        let mut crossings = Vec::new();
        for (i, pair) in samples.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            if a < 0.0 && b >= 0.0 {
                crossings.push(i as f64 + (a / (a - b)) as f64);
            }
        }
        crossings.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn sine_at_200hz(vibrato: Option<Vibrato>) -> Vec<f32> {
        let mut voice = constant_voice(Source::Oscillator(Shape::Sine), 0.0, 1.0, 1.0);
        voice.frequency = Automation::constant(200.0);
        voice.vibrato = vibrato;
        let mut r = VoiceRenderer::new(voice, SR);
        let mut out = vec![0.0f32; SR as usize];
        r.render_add(&mut out, 0, SR);
        out
    }

    #[test]
    fn plain_sine_keeps_a_steady_period() {
        let periods = crossing_periods(&sine_at_200hz(None));
        assert!(periods.len() > 150);
        assert!(periods.iter().all(|p| (p - 40.0).abs() < 0.05), "{:?}", periods);
    }

    #[test]
    fn vibrato_swings_the_period_around_the_base() {
        // 100 cents is about 5.9% either side of 40 samples.
        let periods = crossing_periods(&sine_at_200hz(Some(Vibrato { rate_hz: 5.0, depth_cents: 100.0 })));
        let shortest = periods.iter().copied().fold(f64::INFINITY, f64::min);
        let longest = periods.iter().copied().fold(0.0, f64::max);
        assert!(shortest < 38.5, "shortest period {}", shortest);
        assert!(longest > 41.5, "longest period {}", longest);
        let mean = periods.iter().sum::<f64>() / periods.len() as f64;
        assert!((mean - 40.0).abs() < 0.2, "mean period {}", mean);
    }

    #[test]
    fn vibrato_starts_sharp() {
        // The LFO rises from zero, so the first cycles run above the base pitch.
        let periods = crossing_periods(&sine_at_200hz(Some(Vibrato { rate_hz: 5.0, depth_cents: 100.0 })));
        assert!(periods[..5].iter().all(|&p| p < 40.0));
    }
}
