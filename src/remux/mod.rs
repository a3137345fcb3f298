//! Per-track sample accumulation
//!
//! Each media type has its own remuxer implementing [`Track`]. Both keep
//! their shared bookkeeping (sample table, sequence number, decode time) in
//! a [`TrackState`]. The orchestrator holds them through the closed
//! [`TrackRemuxer`] enum.

pub mod audio;
pub mod sample;
pub mod video;

use bytes::{Bytes, BytesMut};

use crate::media::aac::AudioSpecificConfig;
use crate::media::h264::AvcConfig;

pub use audio::AacRemuxer;
pub use sample::{distribute_durations, Sample, SampleData, SampleFlags};
pub use video::H264Remuxer;

/// Ticks per second for both tracks (durations are milliseconds)
pub const TIMESCALE: u32 = 1000;

/// Media type of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// `hdlr` handler type
    pub fn handler_type(&self) -> &'static [u8; 4] {
        match self {
            TrackKind::Video => b"vide",
            TrackKind::Audio => b"soun",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Codec configuration fixed from the first parameter sets seen
#[derive(Debug, Clone)]
pub enum CodecConfig {
    Avc {
        config: AvcConfig,
        width: u32,
        height: u32,
    },
    Aac {
        config: AudioSpecificConfig,
    },
}

/// Everything the initialization segment needs to describe one track
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub id: u32,
    pub kind: TrackKind,
    pub timescale: u32,
    pub codec: CodecConfig,
}

/// Sample table view handed to the fragment generator
#[derive(Debug, Clone, Copy)]
pub struct TrackFragment<'a> {
    pub track_id: u32,
    pub kind: TrackKind,
    pub sequence_number: u32,
    /// Decode time of the first sample, in track timescale
    pub base_decode_time: u64,
    pub samples: &'a [Sample],
}

/// Result of one `remux` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemuxOutcome {
    /// Samples appended to the sample table
    pub accepted: usize,
    /// Samples discarded because the track was not configured yet
    pub dropped: usize,
    /// Decode times (track timescale) of accepted keyframes
    pub keyframes: Vec<u64>,
}

/// Bookkeeping shared by every track type
#[derive(Debug)]
pub struct TrackState {
    id: u32,
    timescale: u32,
    samples: Vec<Sample>,
    byte_len: usize,
    sequence_number: u32,
    decode_time: u64,
}

impl TrackState {
    pub fn new(id: u32, timescale: u32) -> Self {
        Self {
            id,
            timescale,
            samples: Vec::new(),
            byte_len: 0,
            sequence_number: 1,
            decode_time: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Decode time of the first buffered sample
    pub fn decode_time(&self) -> u64 {
        self.decode_time
    }

    /// Decode time right after the last buffered sample
    pub fn pending_end(&self) -> u64 {
        self.decode_time + self.samples.iter().map(|s| s.duration as u64).sum::<u64>()
    }

    pub fn push(&mut self, sample: Sample) {
        self.byte_len += sample.size as usize;
        self.samples.push(sample);
    }

    /// Concatenate buffered sample payloads in order
    pub fn payload(&self) -> Option<Bytes> {
        if self.samples.is_empty() {
            return None;
        }
        let mut buf = BytesMut::with_capacity(self.byte_len);
        for sample in &self.samples {
            sample.write_to(&mut buf);
        }
        Some(buf.freeze())
    }

    pub fn fragment(&self, kind: TrackKind) -> TrackFragment<'_> {
        TrackFragment {
            track_id: self.id,
            kind,
            sequence_number: self.sequence_number,
            base_decode_time: self.decode_time,
            samples: &self.samples,
        }
    }

    /// Advance past the buffered samples and start the next fragment
    pub fn flush(&mut self) {
        self.decode_time = self.pending_end();
        self.sequence_number += 1;
        self.samples.clear();
        self.byte_len = 0;
    }

    /// Back to the freshly constructed state, keeping the track id
    pub fn reset(&mut self) {
        *self = Self::new(self.id, self.timescale);
    }
}

/// Common interface of the per-media-type remuxers
pub trait Track {
    /// Units one sample is built from
    type Input;

    /// Append samples, spreading `duration_hint` ticks over them
    fn remux(&mut self, samples: Vec<Self::Input>, duration_hint: Option<u32>) -> RemuxOutcome;

    /// Buffered samples in `mdat` layout, `None` when there is nothing to emit
    fn payload(&self) -> Option<Bytes>;

    /// Called after a fragment was produced from the current sample table
    fn flush(&mut self);

    /// Configuration known and at least one sample buffered
    fn is_ready(&self) -> bool;

    /// Configuration known
    fn is_configured(&self) -> bool;

    /// Track description for the initialization segment
    fn info(&self) -> Option<TrackInfo>;

    fn fragment(&self) -> TrackFragment<'_>;

    fn reset(&mut self);
}

/// The track types the orchestrator composes
#[derive(Debug)]
pub enum TrackRemuxer {
    Video(H264Remuxer),
    Audio(AacRemuxer),
}

impl TrackRemuxer {
    pub fn kind(&self) -> TrackKind {
        match self {
            TrackRemuxer::Video(_) => TrackKind::Video,
            TrackRemuxer::Audio(_) => TrackKind::Audio,
        }
    }

    pub fn payload(&self) -> Option<Bytes> {
        match self {
            TrackRemuxer::Video(t) => t.payload(),
            TrackRemuxer::Audio(t) => t.payload(),
        }
    }

    pub fn flush(&mut self) {
        match self {
            TrackRemuxer::Video(t) => t.flush(),
            TrackRemuxer::Audio(t) => t.flush(),
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            TrackRemuxer::Video(t) => t.is_ready(),
            TrackRemuxer::Audio(t) => t.is_ready(),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self {
            TrackRemuxer::Video(t) => t.is_configured(),
            TrackRemuxer::Audio(t) => t.is_configured(),
        }
    }

    pub fn info(&self) -> Option<TrackInfo> {
        match self {
            TrackRemuxer::Video(t) => t.info(),
            TrackRemuxer::Audio(t) => t.info(),
        }
    }

    pub fn fragment(&self) -> TrackFragment<'_> {
        match self {
            TrackRemuxer::Video(t) => t.fragment(),
            TrackRemuxer::Audio(t) => t.fragment(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            TrackRemuxer::Video(t) => t.reset(),
            TrackRemuxer::Audio(t) => t.reset(),
        }
    }

    pub fn timescale(&self) -> u32 {
        match self {
            TrackRemuxer::Video(t) => t.state().timescale(),
            TrackRemuxer::Audio(t) => t.state().timescale(),
        }
    }
}
