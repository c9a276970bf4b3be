//! Playback math shared by the sync engine and its tests.

use serde::Serialize;

/// Margin kept between a seek target and the end of the stream.
pub const END_OF_STREAM_EPSILON: f64 = 0.001;

/// Derived playback position of the authoritative stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackState {
    pub current_time: f64,
    pub frame_index: i64,
    /// `None` until a stream has reported its duration.
    pub duration: Option<f64>,
    pub is_playing: bool,
}

/// Frame containing `time` at a fixed `fps`.
///
/// Uses `floor`, so `0.999s` at 30 fps is frame 29. Negative or non-finite
/// inputs land on frame 0.
pub fn frame_index(time: f64, fps: f64) -> i64 {
    if !time.is_finite() || !fps.is_finite() || time <= 0.0 || fps <= 0.0 {
        return 0;
    }
    (time * fps).floor() as i64
}

/// Start time of `frame` at a fixed `fps`.
pub fn frame_start(frame: i64, fps: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    frame as f64 / fps
}

/// `Some(duration)` when it is finite and positive.
pub fn known_duration(duration: f64) -> Option<f64> {
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Clamp a seek target into `[0, duration - ε]`.
///
/// Without a known duration only the lower bound applies. Non-finite
/// targets map to 0.
pub fn clamp_seek_target(target: f64, duration: Option<f64>) -> f64 {
    if !target.is_finite() {
        return 0.0;
    }
    let t = target.max(0.0);
    match duration {
        Some(d) => t.min((d - END_OF_STREAM_EPSILON).max(0.0)),
        None => t,
    }
}

/// Absolute time for a slider position given in percent.
///
/// Returns `None` when the duration is unknown, matching a slider that has
/// nothing to seek into yet.
pub fn slider_target(percent: f64, duration: Option<f64>) -> Option<f64> {
    let d = duration?;
    let p = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    Some(d * (p / 100.0))
}

/// Text shown next to the scrubber, e.g. `"1.25s"`.
pub fn format_time(time: f64) -> String {
    format!("{time:.2}s")
}

/// Text shown for the current frame, e.g. `"frame 37"`.
pub fn format_frame(frame: i64) -> String {
    format!("frame {frame}")
}
