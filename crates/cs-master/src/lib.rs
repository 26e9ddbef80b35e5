//! Headless controller for chipstep.
//!
//! `Engine` is the control surface shared by the CLI and any embedding UI:
//! live transport over an audio device, note preview, and offline WAV
//! rendering of the loop region.

mod config;
mod error;
mod offline;
mod transport;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use cs_audio::{AudioOutput, CpalOutput};
use cs_engine::{AudioClock, NoteEvent, PulseBank, VoiceFactory, VoiceSink};
use tracing::{info, warn};

// Re-export common types so callers don't need cs-ir/cs-engine directly.
pub use config::{EngineConfig, DEFAULT_NOISE_SEED};
pub use cs_audio::{AudioError, HeadlessOutput};
pub use cs_engine::{LimiterConfig, StartOutcome, TransportState};
pub use cs_formats::{load_project_json, FormatError};
pub use cs_ir::{InstrumentConfig, LoopRegion, Note, ProjectSnapshot, Track, TrackId, TrackKind};
pub use error::EngineError;
pub use offline::{render_duration, RenderOutput, RENDER_TAIL};
pub use transport::{BeatCallback, BeatCue};

use transport::{BeatSlot, Transport, TransportSettings};

/// Length of a preview note in seconds.
pub const PREVIEW_DURATION: f64 = 0.25;

/// Seed offset keeping preview noise independent of the transport's.
const PREVIEW_SEED_OFFSET: u64 = 0x5EED;

/// Everything that exists only after `initialize`.
struct LiveSession {
    output: Box<dyn AudioOutput>,
    transport: Transport,
    clock: Arc<dyn AudioClock>,
    preview: VoiceFactory,
    preview_sink: Box<dyn VoiceSink + Send>,
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.transport.stop();
        if let Err(err) = self.output.stop() {
            warn!(%err, "failed to stop audio output");
        }
    }
}

/// The sequencer audio core: owns the project snapshot, the live session,
/// and the shared pulse tables.
pub struct Engine {
    config: EngineConfig,
    pulses: Arc<PulseBank>,
    snapshot: Arc<ArcSwap<ProjectSnapshot>>,
    master_volume: f32,
    on_beat: BeatSlot,
    live: Option<LiveSession>,
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let master_volume = clamp_volume(config.master_volume);
        Self {
            config,
            pulses: Arc::new(PulseBank::new()),
            snapshot: Arc::new(ArcSwap::from_pointee(ProjectSnapshot::default())),
            master_volume,
            on_beat: Arc::new(Mutex::new(None)),
            live: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.live.is_some()
    }

    // --- Lifecycle ---

    /// Open the default audio device. Calling again is a no-op.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.live.is_some() {
            return Ok(());
        }
        let output = CpalOutput::new(self.config.limiter, self.master_volume)?;
        self.initialize_with(Box::new(output))
    }

    /// Attach an already-built output. Calling again while initialized is a no-op.
    pub fn initialize_with(&mut self, mut output: Box<dyn AudioOutput>) -> Result<(), EngineError> {
        if self.live.is_some() {
            return Ok(());
        }
        output.set_master_volume(self.master_volume);
        output.start()?;

        let sample_rate = output.sample_rate();
        let clock = output.clock();
        let settings = TransportSettings {
            lookahead: self.config.lookahead_secs,
            schedule_interval: self.config.schedule_interval(),
            visual_interval: self.config.visual_interval(),
        };
        let transport = Transport::new(
            settings,
            clock.clone(),
            self.snapshot.clone(),
            VoiceFactory::new(self.pulses.clone(), sample_rate, self.config.noise_seed),
            output.voice_sink(),
            self.on_beat.clone(),
        );
        let preview = VoiceFactory::new(
            self.pulses.clone(),
            sample_rate,
            self.config.noise_seed.wrapping_add(PREVIEW_SEED_OFFSET),
        );
        let preview_sink = output.voice_sink();

        info!(sample_rate, "engine initialized");
        self.live = Some(LiveSession { output, transport, clock, preview, preview_sink });
        Ok(())
    }

    /// Stop playback and release the audio device.
    pub fn shutdown(&mut self) {
        if self.live.take().is_some() {
            info!("engine shut down");
        }
    }

    fn live(&mut self, operation: &'static str) -> Result<&mut LiveSession, EngineError> {
        self.live.as_mut().ok_or(EngineError::NotInitialized(operation))
    }

    // --- Project ---

    /// Replace the project. Beats not yet scheduled pick up the change.
    pub fn set_snapshot(&mut self, snapshot: ProjectSnapshot) {
        let tempo = snapshot.clamped_tempo();
        let region = snapshot.loop_region;
        self.snapshot.store(Arc::new(snapshot));
        if let Some(live) = self.live.as_mut() {
            live.transport.set_tempo(tempo);
            live.transport.set_loop(region);
        }
    }

    pub fn snapshot(&self) -> Arc<ProjectSnapshot> {
        self.snapshot.load_full()
    }

    fn update_snapshot(&self, edit: impl Fn(&mut ProjectSnapshot)) {
        self.snapshot.rcu(|current| {
            let mut next = ProjectSnapshot::clone(current);
            edit(&mut next);
            next
        });
    }

    /// Install the beat-position callback. It runs on the visual thread,
    /// once per beat, after the audio clock passes the beat.
    pub fn on_beat(&mut self, callback: impl FnMut(u32) + Send + 'static) {
        *self.on_beat.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    // --- Transport ---

    /// Start from `start_beat`, or resume if paused. No-op while playing.
    pub fn play(&mut self, tempo: u16, start_beat: u32) -> Result<StartOutcome, EngineError> {
        let live = self.live.as_mut().ok_or(EngineError::NotInitialized("play"))?;
        if live.transport.state() == TransportState::Playing {
            return Ok(StartOutcome::AlreadyPlaying);
        }
        let tempo = cs_ir::clamp_tempo(tempo);
        self.update_snapshot(|s| s.tempo = tempo);
        let live = self.live("play")?;
        let outcome = live.transport.play(tempo, start_beat);
        info!(?outcome, tempo, start_beat, "play");
        Ok(outcome)
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.live("pause")?.transport.pause();
        info!("paused");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.live("stop")?.transport.stop();
        info!("stopped");
        Ok(())
    }

    pub fn set_tempo(&mut self, bpm: u16) -> Result<(), EngineError> {
        let tempo = cs_ir::clamp_tempo(bpm);
        self.live("set_tempo")?;
        self.update_snapshot(|s| s.tempo = tempo);
        self.live("set_tempo")?.transport.set_tempo(tempo);
        Ok(())
    }

    pub fn set_loop(&mut self, start: u32, end: u32, enabled: bool) -> Result<(), EngineError> {
        let region = LoopRegion::new(start, end, enabled);
        self.live("set_loop")?;
        self.update_snapshot(|s| s.loop_region = region);
        self.live("set_loop")?.transport.set_loop(region);
        Ok(())
    }

    /// Master gain after the limiter, clamped to [0, 1]. Also used by
    /// offline renders.
    pub fn set_master_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        let volume = clamp_volume(volume);
        self.live("set_master_volume")?.output.set_master_volume(volume);
        self.master_volume = volume;
        Ok(())
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn state(&self) -> TransportState {
        self.live.as_ref().map_or(TransportState::Stopped, |l| l.transport.state())
    }

    pub fn current_beat(&self) -> u32 {
        self.live.as_ref().map_or(0, |l| l.transport.current_beat())
    }

    /// Sound a short note right away on the live bus. Returns the number
    /// of voices started.
    pub fn preview_note(&mut self, pitch: u8, config: &InstrumentConfig) -> Result<usize, EngineError> {
        let live = self.live("preview_note")?;
        let event = NoteEvent { pitch, start: live.clock.now(), duration: PREVIEW_DURATION, gain: config.clamped_gain() };
        Ok(live.preview.schedule_note(&event, config, TrackKind::Synth, live.preview_sink.as_mut()))
    }

    // --- Offline rendering ---

    /// Render one pass of `[loop_start, loop_end)` to WAV bytes.
    ///
    /// Independent of the live device; usable before `initialize`.
    pub fn render_to_wav(
        &self,
        tracks: Vec<Track>,
        instruments: BTreeMap<TrackId, InstrumentConfig>,
        tempo: u16,
        loop_start: u32,
        loop_end: u32,
    ) -> Result<Vec<u8>, EngineError> {
        self.render_to_wav_with_progress(tracks, instruments, tempo, loop_start, loop_end, |_| {})
    }

    /// As `render_to_wav`, reporting progress in [0, 1].
    pub fn render_to_wav_with_progress(
        &self,
        tracks: Vec<Track>,
        instruments: BTreeMap<TrackId, InstrumentConfig>,
        tempo: u16,
        loop_start: u32,
        loop_end: u32,
        mut progress: impl FnMut(f32),
    ) -> Result<Vec<u8>, EngineError> {
        let mut snapshot = ProjectSnapshot::new(tempo, LoopRegion::new(loop_start, loop_end, true));
        snapshot.tracks = tracks;
        snapshot.instruments = instruments;
        self.render_snapshot(&snapshot, &mut progress)
    }

    /// Render one loop pass of `snapshot` to WAV bytes.
    pub fn render_snapshot(
        &self,
        snapshot: &ProjectSnapshot,
        progress: &mut dyn FnMut(f32),
    ) -> Result<Vec<u8>, EngineError> {
        offline::render_to_wav(snapshot, &self.config, self.master_volume, self.pulses.clone(), progress)
    }

    /// Render one loop pass of `snapshot` to a float buffer.
    pub fn render_buffer(&self, snapshot: &ProjectSnapshot) -> RenderOutput {
        offline::render(snapshot, &self.config, self.master_volume, self.pulses.clone(), &mut |_| {})
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
