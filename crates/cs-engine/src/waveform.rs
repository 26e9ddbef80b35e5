//! Waveform synthesis: band-limited pulse tables, oscillator shapes, noise.

use std::f64::consts::PI;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Fourier coefficients per pulse table (index 0 is DC).
pub const PULSE_HARMONICS: usize = 64;

/// Samples in one cycle of a rendered pulse wavetable.
pub const WAVETABLE_SIZE: usize = 2048;

/// Duty cycles with a precomputed table.
pub const CANONICAL_DUTY_CYCLES: [f32; 4] = [0.125, 0.25, 0.5, 0.75];

/// Fourier description of a pulse wave plus a rendered single cycle.
#[derive(Clone, Debug)]
pub struct PulseTable {
    duty: f32,
    real: [f32; PULSE_HARMONICS],
    imag: [f32; PULSE_HARMONICS],
    cycle: Vec<f32>,
}

/// Compute the first 64 Fourier terms of an ideal pulse wave.
///
/// `imag[n] = 2 / (n·π) · sin(n·π·duty)` for `n = 1..63`; DC and all cosine
/// terms are zero. The rendered cycle is normalized to a peak of 1.
pub fn build_pulse_table(duty: f32) -> PulseTable {
    let duty = clamp_duty(duty);
    let real = [0.0f32; PULSE_HARMONICS];
    let mut imag = [0.0f32; PULSE_HARMONICS];
    for (n, c) in imag.iter_mut().enumerate().skip(1) {
        let n = n as f64;
        *c = (2.0 / (n * PI) * (n * PI * duty as f64).sin()) as f32;
    }

    let mut cycle = vec![0.0f32; WAVETABLE_SIZE];
    for (i, s) in cycle.iter_mut().enumerate() {
        let x = 2.0 * PI * i as f64 / WAVETABLE_SIZE as f64;
        let mut acc = 0.0f64;
        for (n, c) in imag.iter().enumerate().skip(1) {
            acc += *c as f64 * (n as f64 * x).sin();
        }
        *s = acc as f32;
    }
    let peak = cycle.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        for s in &mut cycle {
            *s /= peak;
        }
    }

    PulseTable { duty, real, imag, cycle }
}

fn clamp_duty(duty: f32) -> f32 {
    if duty.is_finite() { duty.clamp(0.0, 1.0) } else { 0.5 }
}

impl PulseTable {
    pub fn duty(&self) -> f32 {
        self.duty
    }

    /// Cosine coefficients (all zero).
    pub fn real(&self) -> &[f32; PULSE_HARMONICS] {
        &self.real
    }

    /// Sine coefficients.
    pub fn imag(&self) -> &[f32; PULSE_HARMONICS] {
        &self.imag
    }

    /// Read the cycle at `phase` (0..1) with linear interpolation.
    pub fn sample(&self, phase: f64) -> f32 {
        let pos = phase.rem_euclid(1.0) * WAVETABLE_SIZE as f64;
        let i = pos as usize % WAVETABLE_SIZE;
        let j = (i + 1) % WAVETABLE_SIZE;
        let frac = (pos - pos.floor()) as f32;
        self.cycle[i] + (self.cycle[j] - self.cycle[i]) * frac
    }
}

/// Cache of pulse tables for the canonical duty cycles.
///
/// Built once per engine and shared; arbitrary duty requests resolve to the
/// nearest cached table.
#[derive(Clone, Debug)]
pub struct PulseBank {
    tables: [Arc<PulseTable>; 4],
}

impl Default for PulseBank {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseBank {
    pub fn new() -> Self {
        Self { tables: CANONICAL_DUTY_CYCLES.map(|d| Arc::new(build_pulse_table(d))) }
    }

    /// The cached duty cycle closest to `duty`, ties resolved toward 0.5.
    pub fn nearest_duty(duty: f32) -> f32 {
        let duty = clamp_duty(duty);
        let mut best = CANONICAL_DUTY_CYCLES[0];
        for &candidate in &CANONICAL_DUTY_CYCLES[1..] {
            let d_best = (duty - best).abs();
            let d_cand = (duty - candidate).abs();
            let tie = (d_best - d_cand).abs() <= 1e-6;
            if (!tie && d_cand < d_best) || (tie && (candidate - 0.5).abs() < (best - 0.5).abs()) {
                best = candidate;
            }
        }
        best
    }

    /// Table for the cached duty cycle nearest to `duty`.
    pub fn nearest(&self, duty: f32) -> &Arc<PulseTable> {
        let target = Self::nearest_duty(duty);
        let idx = CANONICAL_DUTY_CYCLES
            .iter()
            .position(|&d| d == target)
            .unwrap_or(2);
        &self.tables[idx]
    }
}

/// Periodic oscillator shape.
#[derive(Clone, Debug)]
pub enum Shape {
    Sine,
    Square,
    Triangle,
    Sawtooth,
    Pulse(Arc<PulseTable>),
}

impl Shape {
    /// Evaluate one cycle at `phase` (0..1). Every shape starts at zero
    /// crossing or its rising edge, and spans [-1, 1].
    pub fn sample(&self, phase: f64) -> f32 {
        let p = phase.rem_euclid(1.0);
        match self {
            Shape::Sine => (2.0 * PI * p).sin() as f32,
            Shape::Square => {
                if p < 0.5 { 1.0 } else { -1.0 }
            }
            Shape::Triangle => {
                let v = if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                };
                v as f32
            }
            Shape::Sawtooth => (2.0 * ((p + 0.5) % 1.0) - 1.0) as f32,
            Shape::Pulse(table) => table.sample(p),
        }
    }
}

/// Fill a buffer with independent uniform samples in [-1, 1].
pub fn generate_noise_buffer(duration: f64, sample_rate: u32, rng: &mut impl Rng) -> Vec<f32> {
    let len = (duration.max(0.0) * sample_rate as f64).ceil().max(1.0) as usize;
    (0..len).map(|_| rng.random_range(-1.0f32..=1.0)).collect()
}

/// Seeded white-noise generator for voices that need a fresh buffer.
#[derive(Clone, Debug)]
pub struct NoiseSource {
    rng: Pcg32,
    sample_rate: u32,
}

impl NoiseSource {
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        Self { rng: Pcg32::seed_from_u64(seed), sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// A new noise buffer covering `duration` seconds.
    pub fn buffer(&mut self, duration: f64) -> Arc<[f32]> {
        generate_noise_buffer(duration, self.sample_rate, &mut self.rng).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_coefficients_match_closed_form() {
        let table = build_pulse_table(0.25);
        assert_eq!(table.imag()[0], 0.0);
        assert!(table.real().iter().all(|&r| r == 0.0));
        let c1 = 2.0 / PI * (PI * 0.25).sin();
        assert!((table.imag()[1] as f64 - c1).abs() < 1e-6);
        let c3 = 2.0 / (3.0 * PI) * (3.0 * PI * 0.25).sin();
        assert!((table.imag()[3] as f64 - c3).abs() < 1e-6);
    }

    #[test]
    fn half_duty_has_no_even_harmonics() {
        let table = build_pulse_table(0.5);
        for n in (2..PULSE_HARMONICS).step_by(2) {
            assert!(table.imag()[n].abs() < 1e-6, "harmonic {} = {}", n, table.imag()[n]);
        }
    }

    #[test]
    fn rendered_cycle_is_normalized() {
        let table = build_pulse_table(0.125);
        let peak = (0..WAVETABLE_SIZE)
            .map(|i| table.sample(i as f64 / WAVETABLE_SIZE as f64).abs())
            .fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-4);
    }

    #[test]
    fn nearest_duty_exact_matches() {
        for d in CANONICAL_DUTY_CYCLES {
            assert_eq!(PulseBank::nearest_duty(d), d);
        }
    }

    #[test]
    fn nearest_duty_minimizes_distance() {
        assert_eq!(PulseBank::nearest_duty(0.0), 0.125);
        assert_eq!(PulseBank::nearest_duty(0.2), 0.25);
        assert_eq!(PulseBank::nearest_duty(0.45), 0.5);
        assert_eq!(PulseBank::nearest_duty(0.7), 0.75);
        assert_eq!(PulseBank::nearest_duty(1.0), 0.75);
    }

    #[test]
    fn nearest_duty_ties_go_toward_half() {
        assert_eq!(PulseBank::nearest_duty(0.375), 0.5);
        assert_eq!(PulseBank::nearest_duty(0.625), 0.5);
        assert_eq!(PulseBank::nearest_duty(0.1875), 0.25);
    }

    #[test]
    fn nearest_duty_sweep_matches_brute_force() {
        for i in 0..=1000 {
            let d = i as f32 / 1000.0;
            let chosen = PulseBank::nearest_duty(d);
            let best = CANONICAL_DUTY_CYCLES
                .iter()
                .map(|c| (d - c).abs())
                .fold(f32::MAX, f32::min);
            assert!(((d - chosen).abs() - best).abs() <= 1e-6, "duty {}", d);
        }
    }

    #[test]
    fn nearest_duty_handles_garbage() {
        assert_eq!(PulseBank::nearest_duty(f32::NAN), 0.5);
        assert_eq!(PulseBank::nearest_duty(-3.0), 0.125);
    }

    #[test]
    fn bank_returns_cached_table() {
        let bank = PulseBank::new();
        let a = bank.nearest(0.3);
        let b = bank.nearest(0.26);
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(a.duty(), 0.25);
    }

    #[test]
    fn shapes_stay_in_range() {
        let bank = PulseBank::new();
        let shapes = [
            Shape::Sine,
            Shape::Square,
            Shape::Triangle,
            Shape::Sawtooth,
            Shape::Pulse(bank.nearest(0.125).clone()),
        ];
        for shape in &shapes {
            for i in 0..100 {
                let v = shape.sample(i as f64 / 100.0);
                assert!((-1.0..=1.0).contains(&v), "{:?} at {} = {}", shape, i, v);
            }
        }
    }

    #[test]
    fn noise_buffer_length_and_range() {
        let mut rng = Pcg32::seed_from_u64(7);
        let buf = generate_noise_buffer(0.05, 44100, &mut rng);
        assert_eq!(buf.len(), 2205);
        assert!(buf.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(buf.iter().any(|&s| s > 0.5) && buf.iter().any(|&s| s < -0.5));
    }

    #[test]
    fn noise_source_is_deterministic_per_seed() {
        let mut a = NoiseSource::new(8000, 42);
        let mut b = NoiseSource::new(8000, 42);
        assert_eq!(a.buffer(0.01), b.buffer(0.01));
    }
}
