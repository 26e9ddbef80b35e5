//! CPAL-based audio output backend.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use cs_engine::{AudioClock, FrameClock, LimiterConfig, Mixer, Voice, VoiceSink, MAX_LIVE_VOICES};
use cs_ir::{AudioBuffer, BLOCK_SIZE};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{error, info, warn};

use crate::traits::{AudioError, AudioOutput};

/// Voices that can wait for the audio thread at once.
const VOICE_QUEUE_CAPACITY: usize = 1024;

/// Control-side ends of the voice queues.
struct VoiceChannel {
    voices: HeapProd<Voice>,
    /// Finished voices coming back from the audio thread to be dropped here.
    retired: HeapCons<Voice>,
}

/// Sends voices to the audio thread through the shared ring buffer producer.
#[derive(Clone)]
struct LiveVoiceSink {
    channel: Arc<Mutex<VoiceChannel>>,
}

impl VoiceSink for LiveVoiceSink {
    fn submit(&mut self, voice: Voice) {
        let mut channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        channel.retired.clear();
        if let Err(voice) = channel.voices.try_push(voice) {
            warn!(pitch = voice.origin.pitch, time = voice.start, "voice queue full, dropping voice");
        }
    }
}

/// State owned by the stream callback. Nothing in `fill` allocates or frees.
struct CallbackState {
    mixer: Mixer,
    voices: HeapCons<Voice>,
    retired: HeapProd<Voice>,
    block: AudioBuffer,
    /// Read position inside `block`; `BLOCK_SIZE` means the block is spent.
    cursor: usize,
    /// Absolute frame of the next block to render.
    next_block: u64,
}

impl CallbackState {
    fn admit_voices(&mut self) {
        // Voices past the limit wait in the queue for a free slot.
        while self.mixer.has_room() {
            let Some(voice) = self.voices.try_pop() else { break };
            if self.mixer.add_voice(voice).is_err() {
                break;
            }
        }
    }

    fn hand_back_retired(&mut self) {
        while let Some(voice) = self.mixer.pop_retired() {
            if let Err(voice) = self.retired.try_push(voice) {
                self.mixer.keep_retired(voice);
                break;
            }
        }
    }

    fn fill(&mut self, data: &mut [f32], channels: usize, master_volume: f32) -> u64 {
        self.hand_back_retired();
        self.admit_voices();
        self.mixer.set_master_volume(master_volume);

        let mut frames = 0;
        for chunk in data.chunks_mut(channels) {
            if self.cursor >= BLOCK_SIZE {
                self.mixer.render_block(&mut self.block, self.next_block);
                self.next_block += BLOCK_SIZE as u64;
                self.cursor = 0;
            }
            let left = self.block.channel(0)[self.cursor];
            let right = self.block.channel(1)[self.cursor];
            // Write stereo pair; zero-fill any extra channels
            for (i, sample) in chunk.iter_mut().enumerate() {
                *sample = match i {
                    0 => left,
                    1 => right,
                    _ => 0.0,
                };
            }
            self.cursor += 1;
            frames += 1;
        }
        self.hand_back_retired();
        frames
    }
}

/// CPAL-based audio output.
pub struct CpalOutput {
    config: StreamConfig,
    stream: Stream,
    channel: Arc<Mutex<VoiceChannel>>,
    frames_played: Arc<AtomicU64>,
    master_volume: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default device and build its stream (silent until `start`).
    pub fn new(limiter: LimiterConfig, master_volume: f32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // Force stereo output; the callback writes 2-channel interleaved frames
        config.channels = 2;

        let (producer, consumer) = HeapRb::<Voice>::new(VOICE_QUEUE_CAPACITY).split();
        let (retired_producer, retired_consumer) = HeapRb::<Voice>::new(MAX_LIVE_VOICES).split();

        let frames_played = Arc::new(AtomicU64::new(0));
        let master_volume = Arc::new(AtomicU32::new(master_volume.to_bits()));
        let running = Arc::new(AtomicBool::new(false));

        let stream = build_stream(
            &device,
            &config,
            limiter,
            consumer,
            retired_producer,
            frames_played.clone(),
            master_volume.clone(),
            running.clone(),
        )?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            "audio output ready"
        );

        Ok(Self {
            config,
            stream,
            channel: Arc::new(Mutex::new(VoiceChannel { voices: producer, retired: retired_consumer })),
            frames_played,
            master_volume,
            running,
        })
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    limiter: LimiterConfig,
    voices: HeapCons<Voice>,
    retired: HeapProd<Voice>,
    frames_played: Arc<AtomicU64>,
    master_volume: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
) -> Result<Stream, AudioError> {
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let mut state = CallbackState {
        mixer: Mixer::realtime(
            sample_rate,
            limiter,
            f32::from_bits(master_volume.load(Ordering::Relaxed)),
            MAX_LIVE_VOICES,
        ),
        voices,
        retired,
        block: AudioBuffer::new(2, BLOCK_SIZE),
        cursor: BLOCK_SIZE,
        next_block: 0,
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }
                let volume = f32::from_bits(master_volume.load(Ordering::Relaxed));
                let frames = state.fill(data, channels, volume);
                frames_played.fetch_add(frames, Ordering::AcqRel);
            },
            |err| error!(%err, "audio stream error"),
            None,
        )
        .map_err(|e| AudioError::StreamCreate(e.to_string()))
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn clock(&self) -> Arc<dyn AudioClock> {
        Arc::new(FrameClock::new(self.frames_played.clone(), self.sample_rate()))
    }

    fn voice_sink(&self) -> Box<dyn VoiceSink + Send> {
        Box::new(LiveVoiceSink { channel: self.channel.clone() })
    }

    fn set_master_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        self.master_volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        self.stream.play().map_err(|e| AudioError::Playback(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        self.stream.pause().map_err(|e| AudioError::Playback(e.to_string()))
    }
}
