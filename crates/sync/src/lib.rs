//! Dual-stream synchronization, overlay rendering and box capture.
//!
//! - [`media`]: the [`MediaHandle`](media::MediaHandle) seam every stream
//!   is driven through. [`sim`] has a clock-driven implementation.
//! - [`engine`]: the [`SyncEngine`] with derived playback state, drift
//!   correction, mirrored play/pause, scrubbing and the seek protocol.
//! - [`overlay`]: scales the selected canonical box onto each stream's
//!   overlay surface.
//! - [`capture`]: pointer-driven drawing and submission of new boxes.
//! - [`hook`]: the structured observability hook the engine reports to.

pub mod capture;
pub mod display;
pub mod engine;
pub mod hook;
pub mod media;
pub mod overlay;
pub mod sim;
pub mod sync_flag;

pub use capture::{BoxCapture, CaptureState, SubmitOutcome};
pub use engine::{SeekOutcome, StreamRole, SyncEngine};
pub use hook::{ObservabilityHook, TracingHook};
pub use media::{MediaError, MediaEvent, MediaHandle, ReadyState};
pub use overlay::{MemorySurface, OverlayRenderer, OverlaySurface, PixelRect};
pub use sim::{SeekBehavior, SimulatedMedia};
