//! The dual-stream sync engine.
//!
//! [`SyncEngine`] owns up to two media handles: the color stream
//! (primary) and the depth stream (secondary). The primary is the
//! authority for the playhead. On every timing event the engine derives the
//! current frame, pulls the secondary back when it drifts, repaints the
//! selected box and broadcasts [`SyncSignal::FrameChanged`].
//!
//! Seeks the engine starts itself (scrubbing, slider jumps, activating a
//! stored annotation) go through [`SyncEngine::seek_and_wait`], which waits
//! for metadata, seeks both handles under the sync flag and gives up after
//! the configured timeout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use rgbd_core::playback::{
    clamp_seek_target, frame_index, frame_start, known_duration, slider_target, PlaybackState,
};
use rgbd_core::{BoundingBox, SyncConfig};
use rgbd_events::{ActivateAnnotation, FrameChanged, SignalBus, SyncSignal};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::display::PlaybackDisplay;
use crate::hook::{ObservabilityHook, TracingHook};
use crate::media::{MediaEvent, MediaHandle, ReadyState};
use crate::overlay::{OverlayRenderer, OverlaySurface};
use crate::sync_flag::SyncFlag;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which of the two handles an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRole {
    Primary,
    Secondary,
}

impl StreamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// How a seek started by the engine ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekOutcome {
    /// Every handle reported `Seeked`.
    Completed,
    /// The seek timeout elapsed first. The handles may still finish later.
    TimedOut,
    /// At least one handle refused the seek; the others were awaited.
    Failed,
    /// There is no handle to seek.
    NoMedia,
}

#[derive(Default)]
struct EngineState {
    selected_box: Option<BoundingBox>,
    display: PlaybackDisplay,
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

pub struct SyncEngine {
    config: SyncConfig,
    bus: Arc<SignalBus>,
    primary: Option<Arc<dyn MediaHandle>>,
    secondary: Option<Arc<dyn MediaHandle>>,
    overlays: Vec<Arc<dyn OverlaySurface>>,
    renderer: OverlayRenderer,
    hook: Arc<dyn ObservabilityHook>,
    syncing: SyncFlag,
    state: Mutex<EngineState>,
}

impl SyncEngine {
    /// An engine with no handles or overlays yet.
    ///
    /// Observability goes to `tracing` when `config.trace_events` is set.
    pub fn new(config: SyncConfig, bus: Arc<SignalBus>) -> Self {
        let renderer = OverlayRenderer::new(config.reference_width, config.reference_height);
        let hook = Arc::new(TracingHook::new(config.trace_events));
        Self {
            config,
            bus,
            primary: None,
            secondary: None,
            overlays: Vec::new(),
            renderer,
            hook,
            syncing: SyncFlag::new(),
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn with_primary(mut self, handle: Arc<dyn MediaHandle>) -> Self {
        self.primary = Some(handle);
        self
    }

    pub fn with_secondary(mut self, handle: Arc<dyn MediaHandle>) -> Self {
        self.secondary = Some(handle);
        self
    }

    /// Add an overlay surface (one per stream).
    pub fn with_overlay(mut self, surface: Arc<dyn OverlaySurface>) -> Self {
        self.overlays.push(surface);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ObservabilityHook>) -> Self {
        self.hook = hook;
        self
    }

    // ---- accessors ----

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.is_set()
    }

    pub fn selected_box(&self) -> Option<BoundingBox> {
        self.lock_state().selected_box
    }

    pub fn display(&self) -> PlaybackDisplay {
        self.lock_state().display.clone()
    }

    /// The handle playback is read from: primary, else secondary.
    pub fn master(&self) -> Option<&Arc<dyn MediaHandle>> {
        self.primary.as_ref().or(self.secondary.as_ref())
    }

    pub fn handle(&self, role: StreamRole) -> Option<&Arc<dyn MediaHandle>> {
        match role {
            StreamRole::Primary => self.primary.as_ref(),
            StreamRole::Secondary => self.secondary.as_ref(),
        }
    }

    /// Current derived playback state.
    pub fn playback_state(&self) -> PlaybackState {
        let current_time = self.authoritative_time(None);
        PlaybackState {
            current_time,
            frame_index: frame_index(current_time, self.config.fps),
            duration: self.master().and_then(|h| known_duration(h.duration())),
            is_playing: self.master().is_some_and(|h| h.is_playing()),
        }
    }

    // ---- playback updates ----

    /// Refresh derived state after a timing event from `source`.
    ///
    /// Runs display projection, drift correction, overlay repaint and the
    /// frame broadcast under one lock so no other handler interleaves.
    pub fn update_from_video(&self, source: Option<StreamRole>) -> FrameChanged {
        let source_handle = match source {
            Some(role) => self.handle(role),
            None => self.master(),
        };
        let current_time = self.authoritative_time(source_handle);
        let duration = self
            .primary
            .as_ref()
            .and_then(|h| known_duration(h.duration()))
            .or_else(|| source_handle.and_then(|h| known_duration(h.duration())));
        let frame = frame_index(current_time, self.config.fps);
        let playing = self.master().is_some_and(|h| h.is_playing());

        let mut state = self.lock_state();
        state.display.project(current_time, frame, duration);
        state.display.set_playing(playing);

        if !self.syncing.is_set() {
            self.correct_drift(current_time);
        }

        if state.selected_box.is_some() {
            self.renderer.render(state.selected_box.as_ref(), &self.overlays);
        }

        let changed = FrameChanged {
            current_time,
            frame_index: frame,
        };
        self.bus.publish(SyncSignal::FrameChanged(changed));
        changed
    }

    /// Set the scrubber bound to the longest known duration.
    pub fn update_duration(&self) -> Option<f64> {
        let max = self
            .handles()
            .iter()
            .filter_map(|(_, h)| known_duration(h.duration()))
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));
        self.lock_state().display.scrubber_max = max;
        max
    }

    /// Route a media event from `role` to the matching update.
    pub fn on_media_event(&self, role: StreamRole, event: MediaEvent) {
        if !event.is_timing() {
            return;
        }
        if event == MediaEvent::LoadedMetadata {
            self.update_duration();
        }
        self.update_from_video(Some(role));
    }

    // ---- user controls ----

    /// Pause both streams if the master is playing, otherwise play both.
    ///
    /// A rejected play request on one handle does not stop the other.
    pub async fn toggle_play(&self) {
        let Some(master) = self.master().cloned() else {
            return;
        };

        if master.is_playing() {
            for (_, handle) in self.handles() {
                handle.pause();
            }
        } else {
            let plays = self
                .handles()
                .into_iter()
                .map(|(role, handle)| async move { (role, handle.play().await) });
            for (role, result) in join_all(plays).await {
                if let Err(e) = result {
                    self.hook.record(
                        Level::DEBUG,
                        "play.rejected",
                        json!({ "stream": role.as_str(), "error": e.to_string() }),
                    );
                }
            }
        }

        self.refresh_play_label();
    }

    /// Jump both streams to `target` seconds.
    ///
    /// Any selected box is cleared first: it belonged to the old position.
    pub async fn scrub(&self, target: f64) -> SeekOutcome {
        self.select_box(None);
        let target = if target.is_finite() { target } else { 0.0 };
        self.seek_and_wait(target).await
    }

    /// Jump to `percent` of the master's duration.
    ///
    /// Returns `None` without touching anything when the duration is not
    /// known yet.
    pub async fn seek_by_slider_percent(&self, percent: f64) -> Option<SeekOutcome> {
        let duration = self.master().and_then(|h| known_duration(h.duration()))?;
        let target = slider_target(percent, Some(duration))?;
        Some(self.scrub(target).await)
    }

    /// Select (or clear) the box drawn on the overlays and repaint.
    pub fn select_box(&self, bbox: Option<BoundingBox>) {
        let mut state = self.lock_state();
        state.selected_box = bbox;
        self.renderer.render(state.selected_box.as_ref(), &self.overlays);
    }

    /// Show a stored annotation: select its box and seek to it.
    ///
    /// Signals with non-finite geometry are dropped. The seek target is
    /// `time_sec` when finite, else the start of `frame_index`. Returns the
    /// seek outcome, or `None` when no seek was issued.
    pub async fn on_activate_annotation(&self, signal: ActivateAnnotation) -> Option<SeekOutcome> {
        let bbox = signal.bounding_box();
        if !bbox.is_finite() {
            self.hook.record(
                Level::DEBUG,
                "activate.ignored",
                json!({ "id": signal.id, "reason": "non-finite geometry" }),
            );
            return None;
        }

        self.select_box(Some(bbox));

        let target = signal
            .time_sec
            .filter(|t| t.is_finite())
            .or_else(|| signal.frame_index.map(|f| frame_start(f, self.config.fps)));
        let Some(target) = target else {
            self.hook.record(Level::DEBUG, "activate.no_target", json!({ "id": signal.id }));
            return None;
        };

        Some(self.seek_and_wait(target).await)
    }

    // ---- seek protocol ----

    /// Seek every present handle to `target` and wait for them.
    ///
    /// 1. Until the master knows its metadata, wait for every handle's.
    /// 2. Clamp into `[0, duration - ε]`.
    /// 3. Under the sync flag, pause and seek each handle, awaiting its
    ///    own `Seeked`.
    /// 4. After all complete or the seek timeout elapses, lower the flag
    ///    and refresh display and overlay.
    pub async fn seek_and_wait(&self, target: f64) -> SeekOutcome {
        let handles = self.handles();
        let Some(master) = self.master().cloned() else {
            return SeekOutcome::NoMedia;
        };

        if master.ready_state() < ReadyState::HaveMetadata {
            self.hook.record(Level::DEBUG, "seek.deferred", json!({ "target": target }));
            join_all(handles.iter().map(|(_, h)| wait_for_metadata(h.as_ref()))).await;
        }

        let t = clamp_seek_target(target, known_duration(master.duration()));

        let outcome = {
            let _guard = self.syncing.raise();
            let mut waits = Vec::with_capacity(handles.len());
            let mut failed = false;

            for (role, handle) in &handles {
                let events = handle.subscribe();
                handle.pause();
                match handle.seek_to(t) {
                    Ok(()) => waits.push(wait_for_seeked(events)),
                    Err(e) => {
                        failed = true;
                        self.hook.record(
                            Level::WARN,
                            "seek.failed",
                            json!({ "stream": role.as_str(), "target": t, "error": e.to_string() }),
                        );
                    }
                }
            }

            match tokio::time::timeout(self.config.seek_timeout, join_all(waits)).await {
                Ok(_) if failed => SeekOutcome::Failed,
                Ok(_) => SeekOutcome::Completed,
                Err(_) => {
                    self.hook.record(
                        Level::WARN,
                        "seek.timed_out",
                        json!({
                            "target": t,
                            "timeout_ms": self.config.seek_timeout.as_millis() as u64,
                        }),
                    );
                    SeekOutcome::TimedOut
                }
            }
        };

        self.update_from_video(None);
        outcome
    }

    // ---- event loop ----

    /// Pump media events and bus signals until `cancel` fires.
    ///
    /// Activations are handled on their own task so a slow seek never
    /// stops timing events from being processed.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut primary_events = self.primary.as_ref().map(|h| h.subscribe());
        let mut secondary_events = self.secondary.as_ref().map(|h| h.subscribe());
        let mut signals = self.bus.subscribe();

        self.update_duration();
        self.update_from_video(None);
        tracing::info!(
            primary = self.primary.is_some(),
            secondary = self.secondary.is_some(),
            "Sync engine started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = next_media_event(&mut primary_events) => {
                    self.on_media_event(StreamRole::Primary, event);
                }
                event = next_media_event(&mut secondary_events) => {
                    self.on_media_event(StreamRole::Secondary, event);
                }
                signal = signals.recv() => match signal {
                    Ok(envelope) => {
                        if let SyncSignal::ActivateAnnotation(activate) = envelope.signal {
                            let engine = Arc::clone(&self);
                            tokio::spawn(async move {
                                engine.on_activate_annotation(activate).await;
                            });
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Sync engine lagged behind the signal bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::info!("Sync engine stopped");
    }

    // ---- private helpers ----

    fn handles(&self) -> Vec<(StreamRole, Arc<dyn MediaHandle>)> {
        let mut out = Vec::with_capacity(2);
        if let Some(h) = &self.primary {
            out.push((StreamRole::Primary, Arc::clone(h)));
        }
        if let Some(h) = &self.secondary {
            out.push((StreamRole::Secondary, Arc::clone(h)));
        }
        out
    }

    /// Primary's time when usable, else the triggering handle's, else 0.
    fn authoritative_time(&self, source: Option<&Arc<dyn MediaHandle>>) -> f64 {
        self.primary
            .iter()
            .chain(source)
            .map(|h| h.current_time())
            .find(|t| t.is_finite())
            .unwrap_or(0.0)
    }

    /// Pull the secondary onto `target` if it is off by more than the
    /// drift tolerance. Only meaningful when a primary is the authority.
    fn correct_drift(&self, target: f64) {
        let (Some(_), Some(secondary)) = (&self.primary, &self.secondary) else {
            return;
        };
        if secondary.ready_state() < ReadyState::HaveMetadata {
            return;
        }
        let actual = secondary.current_time();
        let drift = (actual - target).abs();
        if drift.is_finite() && drift <= self.config.drift_tolerance {
            return;
        }
        match secondary.seek_to(target) {
            Ok(()) => self.hook.record(
                Level::DEBUG,
                "drift.corrected",
                json!({ "from": actual, "to": target, "drift": drift }),
            ),
            Err(e) => self.hook.record(
                Level::WARN,
                "drift.correction_failed",
                json!({ "target": target, "error": e.to_string() }),
            ),
        }
    }

    fn refresh_play_label(&self) {
        let playing = self.master().is_some_and(|h| h.is_playing());
        self.lock_state().display.set_playing(playing);
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolve once `handle` has reached metadata readiness.
async fn wait_for_metadata(handle: &dyn MediaHandle) {
    // Subscribe before checking so a LoadedMetadata in between is not lost.
    let mut events = handle.subscribe();
    loop {
        if handle.ready_state() >= ReadyState::HaveMetadata {
            return;
        }
        match events.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return,
        }
    }
}

/// Resolve on the next `Seeked` from `events`.
/// Resolve on a `Seeked` that follows a `Seeking` on this feed.
///
/// A `Seeked` with no `Seeking` before it answers an earlier seek. After a
/// lag the pairing is lost, so the next `Seeked` is accepted.
async fn wait_for_seeked(mut events: broadcast::Receiver<MediaEvent>) {
    let mut seeking = false;
    loop {
        match events.recv().await {
            Ok(MediaEvent::Seeking) | Err(RecvError::Lagged(_)) => seeking = true,
            Ok(MediaEvent::Seeked) if seeking => return,
            Err(RecvError::Closed) => return,
            Ok(_) => continue,
        }
    }
}

/// Next event from an optional receiver.
///
/// A closed feed is dropped and pends forever from then on.
async fn next_media_event(events: &mut Option<broadcast::Receiver<MediaEvent>>) -> MediaEvent {
    if let Some(rx) = events.as_mut() {
        match rx.recv().await {
            Ok(event) => return event,
            // Missed events only matter for their timing; one refresh covers them.
            Err(RecvError::Lagged(_)) => return MediaEvent::TimeUpdate,
            Err(RecvError::Closed) => {
                tracing::debug!("Media event feed closed");
                *events = None;
            }
        }
    }
    std::future::pending().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
