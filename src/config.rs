//! Remuxer configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Which tracks the remuxer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackMode {
    Video,
    Audio,
    #[default]
    Both,
}

impl TrackMode {
    pub fn has_video(&self) -> bool {
        matches!(self, TrackMode::Video | TrackMode::Both)
    }

    pub fn has_audio(&self) -> bool {
        matches!(self, TrackMode::Audio | TrackMode::Both)
    }
}

/// Remuxer configuration options
#[derive(Debug, Clone)]
pub struct RemuxConfig {
    /// Tracks to create
    pub mode: TrackMode,

    /// Live stream: declare an unknown movie duration
    pub streaming: bool,

    /// Periodically ask the sink to evict played-out media
    pub evict_buffer: bool,

    /// Period of the release/eviction task
    pub flush_interval: Duration,

    /// Nominal frame rate, used when a chunk carries no duration
    pub fps: u32,

    /// Minimum time between two eviction passes
    pub eviction_interval: Duration,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            mode: TrackMode::Both,
            streaming: true,
            evict_buffer: true,
            flush_interval: Duration::from_millis(1500),
            fps: 30,
            eviction_interval: Duration::from_secs(10),
        }
    }
}

impl RemuxConfig {
    /// Create a new config for the given track mode
    pub fn with_mode(mode: TrackMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Set the track mode
    pub fn mode(mut self, mode: TrackMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set streaming (unknown duration) mode
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Enable or disable buffer eviction
    pub fn evict_buffer(mut self, enabled: bool) -> Self {
        self.evict_buffer = enabled;
        self
    }

    /// Set the periodic task interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the nominal frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the minimum time between eviction passes
    pub fn eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    /// Sample duration in milliseconds used when no duration hint is given
    pub fn nominal_duration(&self) -> u32 {
        1000 / self.fps.max(1)
    }

    /// Reject settings the remuxer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(Error::Config("fps must be greater than zero".into()));
        }
        if self.fps > 1000 {
            return Err(Error::Config(format!(
                "fps {} exceeds the millisecond timescale",
                self.fps
            )));
        }
        if self.flush_interval.is_zero() {
            return Err(Error::Config("flush_interval must be non-zero".into()));
        }
        if self.eviction_interval.is_zero() {
            return Err(Error::Config("eviction_interval must be non-zero".into()));
        }
        Ok(())
    }
}
