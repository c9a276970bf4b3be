//! A deterministic, clock-driven media handle.
//!
//! [`SimulatedMedia`] behaves like a player whose playhead only moves when
//! [`tick`](SimulatedMedia::tick) is called, which makes playback, drift
//! and seek latency fully controllable from tests and from the demo
//! player binary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::media::{MediaError, MediaEvent, MediaHandle, ReadyState};

/// Event channel capacity per simulated handle.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How a simulated handle completes a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekBehavior {
    /// `Seeked` is emitted before `seek_to` returns.
    Immediate,
    /// `Seeked` is emitted after the given delay (needs a tokio runtime).
    /// A newer seek before then supersedes it, and only the newer one
    /// reports `Seeked`.
    Delayed(Duration),
    /// `Seeked` is never emitted.
    Stalled,
}

struct SimState {
    current_time: f64,
    duration: f64,
    ready_state: ReadyState,
    paused: bool,
    ended: bool,
    rate: f64,
    reject_play: bool,
    seek_behavior: SeekBehavior,
    seeks: Vec<f64>,
}

pub struct SimulatedMedia {
    name: String,
    state: Mutex<SimState>,
    events: broadcast::Sender<MediaEvent>,
    /// Bumped by every seek; a delayed `Seeked` fires only if unchanged.
    seek_generation: Arc<AtomicU64>,
}

impl SimulatedMedia {
    /// A paused handle with no metadata yet.
    pub fn new(name: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            state: Mutex::new(SimState {
                current_time: 0.0,
                duration: f64::NAN,
                ready_state: ReadyState::HaveNothing,
                paused: true,
                ended: false,
                rate: 1.0,
                reject_play: false,
                seek_behavior: SeekBehavior::Immediate,
                seeks: Vec::new(),
            }),
            events,
            seek_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A handle that already has metadata and enough data to play.
    pub fn loaded(name: impl Into<String>, duration: f64) -> Self {
        let media = Self::new(name);
        {
            let mut state = media.lock();
            state.duration = duration;
            state.ready_state = ReadyState::HaveEnoughData;
        }
        media
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Playback speed relative to the shared clock. Anything other than
    /// `1.0` makes this handle drift.
    pub fn with_rate(self, rate: f64) -> Self {
        self.lock().rate = rate;
        self
    }

    pub fn with_seek_behavior(self, behavior: SeekBehavior) -> Self {
        self.lock().seek_behavior = behavior;
        self
    }

    /// Make every `play()` call fail as an autoplay policy would.
    pub fn rejecting_play(self) -> Self {
        self.lock().reject_play = true;
        self
    }

    /// Report metadata: sets the duration and emits `LoadedMetadata`.
    pub fn load_metadata(&self, duration: f64) {
        {
            let mut state = self.lock();
            state.duration = duration;
            state.ready_state = state.ready_state.max(ReadyState::HaveMetadata);
        }
        self.emit(MediaEvent::LoadedMetadata);
    }

    /// Report buffered data: raises readiness and emits `LoadedData`.
    pub fn load_data(&self) {
        {
            let mut state = self.lock();
            state.ready_state = ReadyState::HaveEnoughData;
        }
        self.emit(MediaEvent::LoadedData);
    }

    /// Advance the playhead by `elapsed` of shared clock time.
    ///
    /// Does nothing while paused or ended. Emits `TimeUpdate`, and `Ended`
    /// plus `Pause` when the end of the stream is reached.
    pub fn tick(&self, elapsed: Duration) {
        let reached_end = {
            let mut state = self.lock();
            if state.paused || state.ended {
                return;
            }
            state.current_time += elapsed.as_secs_f64() * state.rate;
            if state.duration.is_finite() && state.current_time >= state.duration {
                state.current_time = state.duration;
                state.ended = true;
                state.paused = true;
                true
            } else {
                false
            }
        };
        self.emit(MediaEvent::TimeUpdate);
        if reached_end {
            self.emit(MediaEvent::Pause);
            self.emit(MediaEvent::Ended);
        }
    }

    /// Move the playhead without emitting anything, as a network stall or
    /// an external seek would.
    pub fn set_time_silently(&self, time: f64) {
        self.lock().current_time = time;
    }

    /// Every target passed to `seek_to`, oldest first.
    pub fn seek_log(&self) -> Vec<f64> {
        self.lock().seeks.clone()
    }

    fn emit(&self, event: MediaEvent) {
        // No subscribers is fine; the event is simply unobserved.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MediaHandle for SimulatedMedia {
    fn current_time(&self) -> f64 {
        self.lock().current_time
    }

    fn duration(&self) -> f64 {
        self.lock().duration
    }

    fn ready_state(&self) -> ReadyState {
        self.lock().ready_state
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn is_ended(&self) -> bool {
        self.lock().ended
    }

    async fn play(&self) -> Result<(), MediaError> {
        {
            let mut state = self.lock();
            if state.reject_play {
                return Err(MediaError::PlayRejected(format!(
                    "{} refused to start without user gesture",
                    self.name
                )));
            }
            if !state.paused {
                return Ok(());
            }
            if state.ended {
                state.ended = false;
                state.current_time = 0.0;
            }
            state.paused = false;
        }
        self.emit(MediaEvent::Play);
        Ok(())
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = self.lock();
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if was_playing {
            self.emit(MediaEvent::Pause);
        }
    }

    fn seek_to(&self, time: f64) -> Result<(), MediaError> {
        if !time.is_finite() {
            return Err(MediaError::Unavailable(format!(
                "{} cannot seek to non-finite time {time}",
                self.name
            )));
        }
        let behavior = {
            let mut state = self.lock();
            if state.ready_state < ReadyState::HaveMetadata {
                return Err(MediaError::Unavailable(format!(
                    "{} has no metadata yet",
                    self.name
                )));
            }
            let upper = if state.duration.is_finite() {
                state.duration
            } else {
                f64::MAX
            };
            state.current_time = time.clamp(0.0, upper);
            state.ended = false;
            state.seeks.push(time);
            state.seek_behavior
        };
        let generation = self.seek_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(MediaEvent::Seeking);

        match behavior {
            SeekBehavior::Immediate => self.emit(MediaEvent::Seeked),
            SeekBehavior::Delayed(delay) => {
                let events = self.events.clone();
                let current = Arc::clone(&self.seek_generation);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if current.load(Ordering::SeqCst) == generation {
                        let _ = events.send(MediaEvent::Seeked);
                    }
                });
            }
            SeekBehavior::Stalled => {}
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}
