//! Produced segments and the collaborators that consume them
//!
//! The remuxer never owns a playback buffer. It hands every segment to a
//! [`SegmentSink`] as soon as it is serialized and reads the playback
//! position from a [`PlaybackClock`] on each periodic cycle.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::remux::TrackKind;

/// What a segment contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// `ftyp` + `moov` describing every track
    Init,
    /// `moof` + `mdat` of the video track
    Video,
    /// `moof` + `mdat` of the audio track
    Audio,
}

impl From<TrackKind> for SegmentKind {
    fn from(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Video => SegmentKind::Video,
            TrackKind::Audio => SegmentKind::Audio,
        }
    }
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentKind::Init => f.write_str("init"),
            SegmentKind::Video => f.write_str("video"),
            SegmentKind::Audio => f.write_str("audio"),
        }
    }
}

/// One serialized segment, immutable once produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub payload: Bytes,
    /// Base decode time of a media segment, in milliseconds
    pub dts: Option<u64>,
}

impl Segment {
    pub fn init(payload: Bytes) -> Self {
        Self {
            kind: SegmentKind::Init,
            payload,
            dts: None,
        }
    }

    pub fn media(kind: TrackKind, payload: Bytes, dts: u64) -> Self {
        Self {
            kind: kind.into(),
            payload,
            dts: Some(dts),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Consumer of produced segments
///
/// Calls are synchronous and arrive in emission order. Each segment is
/// delivered at most once.
pub trait SegmentSink {
    /// A segment was produced
    fn on_segment(&mut self, segment: Segment);

    /// Periodic cue to append whatever the sink has queued
    fn on_release(&mut self) {}

    /// Media before `cutoff` seconds may be removed from the playback buffer
    fn on_evict(&mut self, _cutoff: f64) {}
}

impl SegmentSink for Vec<Segment> {
    fn on_segment(&mut self, segment: Segment) {
        self.push(segment);
    }
}

impl SegmentSink for mpsc::UnboundedSender<Segment> {
    fn on_segment(&mut self, segment: Segment) {
        if self.send(segment).is_err() {
            tracing::debug!("Segment receiver dropped");
        }
    }
}

/// Adapts a closure into a [`SegmentSink`]
///
/// ```ignore
/// let sink = FnSink(|segment: Segment| println!("{} bytes", segment.len()));
/// ```
pub struct FnSink<F>(pub F);

impl<F> SegmentSink for FnSink<F>
where
    F: FnMut(Segment),
{
    fn on_segment(&mut self, segment: Segment) {
        (self.0)(segment)
    }
}

impl<F> std::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnSink")
    }
}

/// Host playback position
pub trait PlaybackClock: Send + 'static {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;
}

impl<F> PlaybackClock for F
where
    F: Fn() -> f64 + Send + 'static,
{
    fn current_time(&self) -> f64 {
        self()
    }
}
