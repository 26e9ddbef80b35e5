//! Live transport: the scheduling and visual-sync threads.
//!
//! While playing, a scheduling thread wakes every few tens of milliseconds,
//! applies queued control commands, and asks the look-ahead scheduler for
//! the beats due inside its window. Each beat's notes go to the output's
//! voice sink, and a cue is pushed to a visual thread that fires the beat
//! callback once the audio clock passes the cue time.
//!
//! Only the scheduling thread mutates scheduler state while playing;
//! control calls reach it through a command queue. `pause` and `stop` join
//! both threads before returning.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwap;
use cs_engine::{
    schedule_beat, AudioClock, LookAheadScheduler, StartOutcome, TransportState, VoiceFactory, VoiceSink,
};
use cs_ir::{LoopRegion, ProjectSnapshot};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, info, warn};

/// Pending visual cues held between the two threads.
const CUE_CAPACITY: usize = 512;

/// Control commands waiting for the scheduling thread.
const COMMAND_CAPACITY: usize = 64;

/// Beat-position callback, invoked on the visual thread.
pub type BeatCallback = Box<dyn FnMut(u32) + Send>;

/// Shared slot for the beat callback; it can be replaced at any time.
pub type BeatSlot = Arc<Mutex<Option<BeatCallback>>>;

/// A scheduled beat waiting for the audio clock to reach it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeatCue {
    pub beat: u32,
    pub time: f64,
}

/// Control changes forwarded to a running scheduling thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    SetTempo(u16),
    SetLoop(LoopRegion),
}

/// Timing settings for the two threads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportSettings {
    pub lookahead: f64,
    pub schedule_interval: Duration,
    pub visual_interval: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pop every cue whose time is before `now`, in order, calling `on_beat`
/// for each. Returns the number fired.
pub fn drain_due(cues: &mut impl Consumer<Item = BeatCue>, now: f64, mut on_beat: impl FnMut(u32)) -> usize {
    let mut fired = 0;
    while let Some(&cue) = cues.try_peek() {
        if cue.time >= now {
            break;
        }
        cues.try_pop();
        on_beat(cue.beat);
        fired += 1;
    }
    fired
}

/// Scheduler state owned by the scheduling thread while playing.
struct Core {
    scheduler: LookAheadScheduler,
    factory: VoiceFactory,
    sink: Box<dyn VoiceSink + Send>,
    commands: HeapCons<Command>,
    cues: HeapProd<BeatCue>,
}

impl Core {
    fn apply(&mut self, command: Command) {
        match command {
            Command::SetTempo(bpm) => self.scheduler.set_tempo(bpm),
            Command::SetLoop(region) => self.scheduler.set_loop_region(region),
        }
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            self.apply(command);
        }
    }

    fn tick(&mut self, now: f64, snapshot: &ProjectSnapshot, position: &AtomicU32) {
        let Core { scheduler, factory, sink, cues, .. } = self;
        scheduler.advance(now, |beat, time| {
            let voices = schedule_beat(snapshot, beat, time, factory, sink.as_mut());
            if voices > 0 {
                debug!(beat, time, voices, "scheduled beat");
            }
            if cues.try_push(BeatCue { beat, time }).is_err() {
                warn!(beat, "visual cue queue full, dropping cue");
            }
        });
        position.store(scheduler.current_beat(), Ordering::Release);
    }
}

struct Threads {
    stop: Arc<AtomicBool>,
    scheduling: JoinHandle<()>,
    visual: JoinHandle<()>,
}

/// Live transport over an audio clock and voice sink.
pub struct Transport {
    settings: TransportSettings,
    clock: Arc<dyn AudioClock>,
    snapshot: Arc<ArcSwap<ProjectSnapshot>>,
    core: Arc<Mutex<Core>>,
    visual_cues: Arc<Mutex<HeapCons<BeatCue>>>,
    commands: HeapProd<Command>,
    on_beat: BeatSlot,
    position: Arc<AtomicU32>,
    threads: Option<Threads>,
}

impl Transport {
    pub fn new(
        settings: TransportSettings,
        clock: Arc<dyn AudioClock>,
        snapshot: Arc<ArcSwap<ProjectSnapshot>>,
        factory: VoiceFactory,
        sink: Box<dyn VoiceSink + Send>,
        on_beat: BeatSlot,
    ) -> Self {
        let (cue_prod, cue_cons) = HeapRb::<BeatCue>::new(CUE_CAPACITY).split();
        let (cmd_prod, cmd_cons) = HeapRb::<Command>::new(COMMAND_CAPACITY).split();
        let mut scheduler = LookAheadScheduler::new(settings.lookahead);
        {
            let snap = snapshot.load();
            scheduler.set_tempo(snap.clamped_tempo());
            scheduler.set_loop_region(snap.loop_region);
        }
        let core = Core { scheduler, factory, sink, commands: cmd_cons, cues: cue_prod };
        Self {
            settings,
            clock,
            snapshot,
            core: Arc::new(Mutex::new(core)),
            visual_cues: Arc::new(Mutex::new(cue_cons)),
            commands: cmd_prod,
            on_beat,
            position: Arc::new(AtomicU32::new(0)),
            threads: None,
        }
    }

    pub fn state(&self) -> TransportState {
        if self.threads.is_some() {
            TransportState::Playing
        } else {
            lock(&self.core).scheduler.state()
        }
    }

    /// The next beat the scheduler will emit.
    pub fn current_beat(&self) -> u32 {
        if self.threads.is_some() {
            self.position.load(Ordering::Acquire)
        } else {
            lock(&self.core).scheduler.current_beat()
        }
    }

    /// Number of visual cues not yet fired.
    #[cfg(test)]
    fn pending_cues(&self) -> usize {
        use ringbuf::traits::Observer;
        lock(&self.visual_cues).occupied_len()
    }

    /// Start or resume playback. A no-op while already playing.
    pub fn play(&mut self, tempo: u16, start_beat: u32) -> StartOutcome {
        if self.threads.is_some() {
            return StartOutcome::AlreadyPlaying;
        }
        let outcome = {
            let mut core = lock(&self.core);
            let outcome = core.scheduler.start(tempo, start_beat, self.clock.now());
            if outcome == StartOutcome::Started {
                lock(&self.visual_cues).clear();
            }
            self.position.store(core.scheduler.current_beat(), Ordering::Release);
            outcome
        };
        self.spawn();
        outcome
    }

    fn spawn(&mut self) {
        let stop = Arc::new(AtomicBool::new(false));

        let scheduling = {
            let stop = stop.clone();
            let core = self.core.clone();
            let snapshot = self.snapshot.clone();
            let clock = self.clock.clone();
            let position = self.position.clone();
            let interval = self.settings.schedule_interval;
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    {
                        let mut core = lock(&core);
                        core.apply_commands();
                        let snap = snapshot.load();
                        core.tick(clock.now(), &snap, &position);
                    }
                    thread::park_timeout(interval);
                }
            })
        };

        let visual = {
            let stop = stop.clone();
            let cues = self.visual_cues.clone();
            let on_beat = self.on_beat.clone();
            let clock = self.clock.clone();
            let interval = self.settings.visual_interval;
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    {
                        let mut cues = lock(&cues);
                        let mut callback = lock(&on_beat);
                        drain_due(&mut *cues, clock.now(), |beat| {
                            if let Some(cb) = callback.as_mut() {
                                cb(beat);
                            }
                        });
                    }
                    thread::park_timeout(interval);
                }
            })
        };

        self.threads = Some(Threads { stop, scheduling, visual });
    }

    /// Signal both threads and wait for them. Returns false if nothing was running.
    fn halt(&mut self) -> bool {
        let Some(threads) = self.threads.take() else {
            return false;
        };
        threads.stop.store(true, Ordering::Release);
        threads.scheduling.thread().unpark();
        threads.visual.thread().unpark();
        if threads.scheduling.join().is_err() {
            warn!("scheduling thread panicked");
        }
        if threads.visual.join().is_err() {
            warn!("visual thread panicked");
        }
        lock(&self.core).apply_commands();
        true
    }

    /// Halt both threads, keeping the beat position and pending cues.
    pub fn pause(&mut self) {
        if self.halt() {
            lock(&self.core).scheduler.pause();
        }
    }

    /// Halt both threads, drop pending cues, and rewind to beat 0.
    pub fn stop(&mut self) {
        self.halt();
        lock(&self.core).scheduler.stop();
        lock(&self.visual_cues).clear();
        self.position.store(0, Ordering::Release);
    }

    fn send(&mut self, command: Command) {
        if self.threads.is_none() {
            lock(&self.core).apply(command);
            return;
        }
        if let Err(command) = self.commands.try_push(command) {
            // Queue full: take the core between ticks instead.
            warn!(?command, "command queue full, applying directly");
            let mut core = lock(&self.core);
            core.apply_commands();
            core.apply(command);
        }
    }

    /// Change tempo; effective from the next scheduled beat.
    pub fn set_tempo(&mut self, bpm: u16) {
        self.send(Command::SetTempo(bpm));
    }

    /// Change the loop region; applies at the next wrap check.
    pub fn set_loop(&mut self, region: LoopRegion) {
        self.send(Command::SetLoop(region));
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if self.halt() {
            info!("transport shut down");
        }
    }
}
