//! Benchmarks for voice building and mix-bus rendering
//!
//! Run with: cargo bench -p cs-engine --bench engine_bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cs_engine::{LimiterConfig, Mixer, NoteEvent, PulseBank, VoiceFactory};
use cs_ir::{InstrumentConfig, TrackKind, Waveform};

const SAMPLE_RATE: u32 = 44100;

/// A mixer loaded with `notes` overlapping pulse notes and drum hits.
fn loaded_mixer(notes: usize) -> Mixer {
    let mut factory = VoiceFactory::new(Arc::new(PulseBank::new()), SAMPLE_RATE, 7);
    let mut mixer = Mixer::new(SAMPLE_RATE, LimiterConfig::default(), 0.8);
    let lead = InstrumentConfig::with_waveform(Waveform::Pulse);
    let kit = InstrumentConfig::drum_kit();
    for i in 0..notes {
        let event = NoteEvent { pitch: 48 + (i % 24) as u8, start: 0.0, duration: 1.0, gain: 0.5 };
        factory.schedule_note(&event, &lead, TrackKind::Synth, &mut mixer);
        let hit = NoteEvent { pitch: [36, 38, 42, 44][i % 4], ..event };
        factory.schedule_note(&hit, &kit, TrackKind::Drums, &mut mixer);
    }
    mixer
}

fn bench_mixer(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixer_render");
    for notes in [1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(notes), &notes, |b, &notes| {
            b.iter_batched(
                || loaded_mixer(notes),
                |mut mixer| black_box(mixer.render(SAMPLE_RATE as usize / 10, 2)),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_pulse_bank(c: &mut Criterion) {
    c.bench_function("pulse_bank_build", |b| b.iter(|| black_box(PulseBank::new())));
}

criterion_group!(benches, bench_mixer, bench_pulse_bank);
criterion_main!(benches);
