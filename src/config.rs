//! Construction-time configuration, passed through unchanged from whoever
//! builds the session (CLI, service config file, tests).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};
use crate::media::{MediaKind, Rational, SampleFormat};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::ring_buffer::DEFAULT_RING_CAPACITY;

/// Which kinds of track the session captures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSelection {
    pub video: bool,
    pub audio: bool,
    pub subtitle: bool,
}

impl CaptureSelection {
    pub fn all() -> Self {
        Self {
            video: true,
            audio: true,
            subtitle: true,
        }
    }

    pub fn wants(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.video,
            MediaKind::Audio => self.audio,
            MediaKind::Subtitle => self.subtitle,
            _ => false,
        }
    }
}

impl Default for CaptureSelection {
    fn default() -> Self {
        Self::all()
    }
}

/// Crop margins in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

/// Video filter hints for the codec engine. The core never reads them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoFilterConfig {
    /// Output width, height follows the aspect ratio. None = source width.
    pub width: Option<u32>,
    /// Output frame rate. None = source rate.
    pub fps: Option<u32>,
    pub crop: Margins,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target audio sample rate in Hz.
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    /// Ring slots, power of two.
    pub ring_capacity: usize,
    /// Slots of each unit queue.
    pub queue_capacity: usize,
    /// Seconds of video to deliver; 0 or None streams until the input ends.
    pub duration_secs: Option<u64>,
    /// Frame rate used for the video budget. None = routed video track rate.
    pub frame_rate: Option<Rational>,
    /// Time base used to pace video. None = routed video track time base.
    pub time_base: Option<Rational>,
    pub capture: CaptureSelection,
    pub video_filter: VideoFilterConfig,
    /// Let the codec engine log warnings, not only errors.
    pub codec_warnings: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            sample_format: SampleFormat::F32,
            ring_capacity: DEFAULT_RING_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            duration_secs: None,
            frame_rate: None,
            time_base: None,
            capture: CaptureSelection::all(),
            video_filter: VideoFilterConfig::default(),
            codec_warnings: false,
        }
    }
}

impl CaptureConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::config(format!("parse: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::config(format!("read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(CaptureError::config("sample_rate must be positive"));
        }
        if self.ring_capacity == 0 || !self.ring_capacity.is_power_of_two() {
            return Err(CaptureError::config(format!(
                "ring_capacity must be a power of two, got {}",
                self.ring_capacity
            )));
        }
        if self.queue_capacity == 0 {
            return Err(CaptureError::config("queue_capacity must be positive"));
        }
        if let Some(rate) = self.frame_rate {
            if rate.num <= 0 || rate.den <= 0 {
                return Err(CaptureError::config(format!("invalid frame_rate {}", rate)));
            }
        }
        if let Some(tb) = self.time_base {
            if !tb.is_valid() {
                return Err(CaptureError::config(format!("invalid time_base {}", tb)));
            }
        }
        Ok(())
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = format;
        self
    }

    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_frame_rate(mut self, rate: Rational) -> Self {
        self.frame_rate = Some(rate);
        self
    }

    pub fn with_capacities(mut self, ring_capacity: usize, queue_capacity: usize) -> Self {
        self.ring_capacity = ring_capacity;
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_capture(mut self, capture: CaptureSelection) -> Self {
        self.capture = capture;
        self
    }
}
