//! Statistics for a remuxing session

use std::time::{Duration, Instant};

use crate::segment::{Segment, SegmentKind};

/// Counters kept by a [`Remuxer`](crate::Remuxer)
#[derive(Debug, Clone)]
pub struct RemuxStats {
    /// Creation time
    pub started_at: Instant,
    /// Raw bytes passed to `feed`
    pub bytes_received: u64,
    /// Video samples appended to the track
    pub video_samples: u64,
    /// Audio samples appended to the track
    pub audio_samples: u64,
    /// Keyframes accepted
    pub keyframes: u64,
    /// Samples discarded before their track was configured
    pub dropped_samples: u64,
    /// Initialization segments emitted
    pub init_segments: u64,
    /// Media segments emitted
    pub media_segments: u64,
    /// Total bytes handed to the sink
    pub bytes_emitted: u64,
    /// Eviction passes that produced a cutoff
    pub evictions: u64,
    /// Video codec string (e.g. `avc1.42c01e`)
    pub video_codec: Option<String>,
    /// Audio codec string (e.g. `mp4a.40.2`)
    pub audio_codec: Option<String>,
    /// Video width
    pub width: Option<u32>,
    /// Video height
    pub height: Option<u32>,
    /// Audio sample rate
    pub audio_sample_rate: Option<u32>,
    /// Audio channels
    pub audio_channels: Option<u8>,
}

impl Default for RemuxStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RemuxStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_received: 0,
            video_samples: 0,
            audio_samples: 0,
            keyframes: 0,
            dropped_samples: 0,
            init_segments: 0,
            media_segments: 0,
            bytes_emitted: 0,
            evictions: 0,
            video_codec: None,
            audio_codec: None,
            width: None,
            height: None,
            audio_sample_rate: None,
            audio_channels: None,
        }
    }

    /// Count a segment handed to the sink
    pub fn record_segment(&mut self, segment: &Segment) {
        match segment.kind {
            SegmentKind::Init => self.init_segments += 1,
            SegmentKind::Video | SegmentKind::Audio => self.media_segments += 1,
        }
        self.bytes_emitted += segment.len() as u64;
    }

    /// Get duration since the session started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Output bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_emitted * 8) / secs
        } else {
            0
        }
    }
}
