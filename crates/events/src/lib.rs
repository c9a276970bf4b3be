//! Signal bus connecting the sync engine, overlay and box capture.
//!
//! Components never hold references into each other's state; they only
//! exchange [`SyncSignal`]s over a shared [`SignalBus`]:
//!
//! - [`SyncSignal::FrameChanged`]: broadcast by the sync engine on every
//!   playback update.
//! - [`SyncSignal::ActivateAnnotation`]: published when a stored
//!   annotation is picked from the list.

pub mod bus;

pub use bus::{ActivateAnnotation, FrameChanged, SignalBus, SignalEnvelope, SyncSignal};
