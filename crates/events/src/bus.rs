//! In-process signal bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`SignalBus`] is the publish/subscribe hub for [`SyncSignal`]s. It is
//! designed to be shared via `Arc<SignalBus>` between the engine, the box
//! capture controller and the annotation list.

use chrono::{DateTime, Utc};
use rgbd_core::types::DbId;
use rgbd_core::{Annotation, BoundingBox};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Playback position broadcast after every engine update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameChanged {
    pub current_time: f64,
    pub frame_index: i64,
}

/// Request to select a stored annotation and seek both streams to it.
///
/// Geometry must be finite for the signal to be honoured. At least one of
/// `time_sec` / `frame_index` should be present; `time_sec` wins when both
/// are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateAnnotation {
    pub id: Option<DbId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub time_sec: Option<f64>,
    pub frame_index: Option<i64>,
}

impl ActivateAnnotation {
    pub fn from_annotation(annotation: &Annotation) -> Self {
        Self {
            id: Some(annotation.id),
            x: annotation.x as f64,
            y: annotation.y as f64,
            width: annotation.width as f64,
            height: annotation.height as f64,
            time_sec: Some(annotation.time_sec),
            frame_index: Some(annotation.frame_index),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.width, self.height)
    }
}

/// Every signal that travels over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum SyncSignal {
    FrameChanged(FrameChanged),
    ActivateAnnotation(ActivateAnnotation),
}

impl SyncSignal {
    /// Wire name of the signal, e.g. `"frame-changed"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrameChanged(_) => "frame-changed",
            Self::ActivateAnnotation(_) => "activate-annotation",
        }
    }
}

/// A signal stamped with the time it was published.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub signal: SyncSignal,
    /// When the signal was published (UTC).
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SignalBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out signal bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`SyncSignal`].
///
/// # Usage
///
/// ```rust
/// use rgbd_events::bus::{FrameChanged, SignalBus, SyncSignal};
///
/// let bus = SignalBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(SyncSignal::FrameChanged(FrameChanged {
///     current_time: 1.0,
///     frame_index: 30,
/// }));
/// ```
pub struct SignalBus {
    sender: broadcast::Sender<SignalEnvelope>,
}

impl SignalBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed signals are dropped
    /// and slow receivers will observe a `RecvError::Lagged`. Frame updates
    /// are superseded by the next one, so losing old ones is harmless.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a signal to all current subscribers.
    ///
    /// If there are no active subscribers the signal is silently dropped.
    pub fn publish(&self, signal: SyncSignal) {
        let envelope = SignalEnvelope {
            signal,
            timestamp: Utc::now(),
        };
        // Ignore the SendError: it only means there are zero receivers.
        if self.sender.send(envelope).is_err() {
            tracing::trace!(signal = signal.name(), "Signal published with no subscribers");
        }
    }

    /// Subscribe to all signals published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalEnvelope> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
