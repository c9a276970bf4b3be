//! Presentation state projected from the authoritative stream.
//!
//! Nothing in here feeds back into synchronization; it is what a UI would
//! bind its slider, scrubber, labels and play button to.

use rgbd_core::playback::{format_frame, format_time};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayLabel {
    Play,
    Pause,
}

impl PlayLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Pause => "Pause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackDisplay {
    /// Slider position in percent of the duration.
    pub slider_percent: f64,
    /// Scrubber value in seconds.
    pub scrubber_value: f64,
    /// Scrubber upper bound: the longest known stream duration.
    pub scrubber_max: Option<f64>,
    pub time_text: String,
    pub frame_text: String,
    pub play_label: PlayLabel,
}

impl Default for PlaybackDisplay {
    fn default() -> Self {
        Self {
            slider_percent: 0.0,
            scrubber_value: 0.0,
            scrubber_max: None,
            time_text: format_time(0.0),
            frame_text: format_frame(0),
            play_label: PlayLabel::Play,
        }
    }
}

impl PlaybackDisplay {
    /// Project a playback position.
    ///
    /// `duration` falls back to one second when unknown so the slider
    /// ratio stays defined.
    pub fn project(&mut self, current_time: f64, frame_index: i64, duration: Option<f64>) {
        let duration = duration.unwrap_or(1.0);
        self.slider_percent = if duration > 0.0 {
            current_time / duration * 100.0
        } else {
            0.0
        };
        self.scrubber_value = current_time;
        self.time_text = format_time(current_time);
        self.frame_text = format_frame(frame_index);
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.play_label = if playing {
            PlayLabel::Pause
        } else {
            PlayLabel::Play
        };
    }
}
