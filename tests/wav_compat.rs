//! Integration test: rendered WAV files open in an independent reader.

use std::io::Cursor;

use cs_formats::{buffer_to_wav, parse_wav_header};
use cs_ir::AudioBuffer;
use cs_master::{render_duration, Engine, EngineConfig, InstrumentConfig, LoopRegion, Note, ProjectSnapshot, Track, TrackId, TrackKind};

fn snapshot() -> ProjectSnapshot {
    ProjectSnapshot::new(150, LoopRegion::new(0, 8, true))
        .with_track(
            Track::new(TrackId(1), TrackKind::Synth).with_notes([Note::new(64, 0, 2), Note::new(67, 4, 2)]),
            InstrumentConfig::default(),
        )
        .with_track(Track::new(TrackId(2), TrackKind::Drums).with_notes([Note::new(36, 0, 1)]), InstrumentConfig::drum_kit())
}

fn render(sample_rate: u32, channels: u16) -> Vec<u8> {
    let engine = Engine::new(EngineConfig { render_sample_rate: sample_rate, render_channels: channels, ..EngineConfig::default() });
    engine.render_snapshot(&snapshot(), &mut |_| {}).unwrap()
}

#[test]
fn hound_reads_rendered_stereo() {
    let wav = render(44100, 2);
    let reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let header = parse_wav_header(&wav).unwrap();
    let frames = reader.duration() as usize;
    assert_eq!(header.data_size as usize, 2 * 2 * frames);
    assert_eq!(wav.len(), 44 + header.data_size as usize);
}

#[test]
fn hound_reads_mono_at_other_rates() {
    for rate in [8000, 22050, 48000] {
        let wav = render(rate, 1);
        let reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, rate);
        // 8 steps at 150 BPM plus the one-second tail.
        let expected = (render_duration(&snapshot()) * rate as f64).ceil() as u32;
        assert!((render_duration(&snapshot()) - 1.8).abs() < 1e-9);
        assert_eq!(reader.duration(), expected);
    }
}

#[test]
fn samples_decode_to_what_was_written() {
    let mut buffer = AudioBuffer::new(2, 4);
    buffer.channel_mut(0).copy_from_slice(&[0.0, 0.5, -0.5, 1.5]);
    buffer.channel_mut(1).copy_from_slice(&[-1.0, 1.0, 0.25, -3.0]);
    let wav = buffer_to_wav(&buffer, 16000).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
    let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples, vec![0, -32768, 16383, 32767, -16384, 8191, 32767, -32768]);
}

#[test]
fn rendered_audio_is_not_silent() {
    let wav = render(22050, 2);
    let mut reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
    let peak = reader.samples::<i16>().map(|s| s.unwrap().unsigned_abs()).max().unwrap_or(0);
    assert!(peak > 1000);
}
