//! Shared data model for the dual-stream annotation engine.
//!
//! Holds the canonical box geometry, annotation records exchanged with the
//! remote store, playback math and the engine configuration. Everything in
//! here is synchronous and free of I/O.

pub mod annotation;
pub mod config;
pub mod error;
pub mod geometry;
pub mod playback;
pub mod types;

pub use annotation::{Annotation, NewAnnotation, Stream};
pub use config::SyncConfig;
pub use error::CoreError;
pub use geometry::{BoundingBox, Point};
