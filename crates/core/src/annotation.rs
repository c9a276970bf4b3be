//! Annotation records exchanged with the remote annotation store.
//!
//! [`NewAnnotation`] is the create request built by the box capture flow;
//! [`Annotation`] is the stored record the store hands back. The engine
//! only ever reads an [`Annotation`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geometry::BoundingBox;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Which of the two synchronized streams an annotation was drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Rgb,
    Depth,
}

/// All valid stream strings.
const VALID_STREAM_STRINGS: &[&str] = &["rgb", "depth"];

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Depth => "depth",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "rgb" => Ok(Self::Rgb),
            "depth" => Ok(Self::Depth),
            _ => Err(CoreError::Validation(format!(
                "Invalid stream '{s}'. Must be one of: {}",
                VALID_STREAM_STRINGS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Create request for a single box annotation.
///
/// Geometry is integral: the draft is normalized and rounded before it is
/// packaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub frame_index: i64,
    pub time_sec: f64,
    pub stream: Stream,
    pub label: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl NewAnnotation {
    /// Package a normalized box drawn at the given playback position.
    ///
    /// The box is rounded to integer pixels; callers are expected to have
    /// normalized it already.
    pub fn from_box(
        bbox: &BoundingBox,
        frame_index: i64,
        time_sec: f64,
        stream: Stream,
        label: impl Into<String>,
    ) -> Self {
        let r = bbox.rounded();
        Self {
            frame_index,
            time_sec,
            stream,
            label: label.into(),
            x: r.x as i64,
            y: r.y as i64,
            width: r.width as i64,
            height: r.height as i64,
        }
    }

    /// Check the request the way the store's model validation does.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.frame_index < 0 {
            return Err(CoreError::Validation(format!(
                "frame_index must be non-negative, got {}",
                self.frame_index
            )));
        }
        if !self.time_sec.is_finite() || self.time_sec < 0.0 {
            return Err(CoreError::Validation(format!(
                "time_sec must be a non-negative finite number, got {}",
                self.time_sec
            )));
        }
        if self.label.trim().is_empty() {
            return Err(CoreError::Validation("label must not be blank".to_string()));
        }
        if self.width <= 0 || self.height <= 0 {
            return Err(CoreError::Validation(format!(
                "box must have positive extents, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        )
    }
}

/// A stored annotation as returned by the store's list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: DbId,
    pub scenario_id: DbId,
    pub frame_index: i64,
    pub time_sec: f64,
    pub stream: Stream,
    pub label: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub created_at: Timestamp,
}

impl Annotation {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        )
    }
}

/// Sort annotations by `frame_index` ascending, keeping insertion order
/// for equal frames.
pub fn sort_by_frame(annotations: &mut [Annotation]) {
    annotations.sort_by_key(|a| a.frame_index);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
