//! The media handle seam.
//!
//! The engine never touches a concrete player. Everything it needs from a
//! stream (playhead, duration, readiness, play/pause/seek and an event
//! feed) goes through [`MediaHandle`], so adapters over a real player and
//! the [`SimulatedMedia`](crate::sim::SimulatedMedia) used in tests are
//! interchangeable.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

/// How much of a stream is available, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    HaveNothing = 0,
    /// Duration and dimensions are known.
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// Events a media handle reports to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEvent {
    LoadedMetadata,
    LoadedData,
    Seeking,
    Seeked,
    TimeUpdate,
    Play,
    Pause,
    Ended,
}

impl MediaEvent {
    /// Whether the event can move the playhead or the play state.
    pub fn is_timing(&self) -> bool {
        !matches!(self, Self::Seeking)
    }
}

/// Errors a media handle can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
    /// The player refused to start, e.g. because of an autoplay policy.
    #[error("Play request rejected: {0}")]
    PlayRejected(String),

    /// The handle cannot perform the operation in its current state.
    #[error("Media unavailable: {0}")]
    Unavailable(String),
}

/// A single playable stream.
///
/// Times are in seconds. `duration` is `NaN` until metadata is known.
#[async_trait]
pub trait MediaHandle: Send + Sync {
    fn current_time(&self) -> f64;

    fn duration(&self) -> f64;

    fn ready_state(&self) -> ReadyState;

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool;

    /// Start playback. Resolves once the player accepted or refused.
    async fn play(&self) -> Result<(), MediaError>;

    fn pause(&self);

    /// Move the playhead. Emits [`MediaEvent::Seeking`] now and
    /// [`MediaEvent::Seeked`] on completion. A seek issued while another is
    /// pending replaces it: only the newest one reports `Seeked`.
    fn seek_to(&self, time: f64) -> Result<(), MediaError>;

    /// Receive every event the handle emits from now on.
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;

    /// Playing means running, not finished, and with frames ahead of the
    /// playhead.
    fn is_playing(&self) -> bool {
        !self.is_paused() && !self.is_ended() && self.ready_state() > ReadyState::HaveCurrentData
    }
}
