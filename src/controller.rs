//! Remux orchestration
//!
//! The controller owns one [`TrackRemuxer`] per enabled media type and runs
//! one cycle per batch of parsed media:
//!
//! ```text
//!            remux(batch)
//!                 │
//!                 ▼
//!   append samples (video first, audio once video is configured)
//!                 │
//!   Uninitialized ├── every track ready? ──► init segment ──► Initialized
//!                 │
//!     Initialized └── per track with samples: moof+mdat ──► sink, flush
//! ```

use crate::config::TrackMode;
use crate::media::aac::AacFrame;
use crate::media::h264::AccessUnit;
use crate::mp4::{self, MovieDuration};
use crate::remux::{AacRemuxer, H264Remuxer, RemuxOutcome, Track, TrackRemuxer, TIMESCALE};
use crate::segment::{Segment, SegmentSink};

/// Parsed media from one feed
#[derive(Debug, Clone, Default)]
pub struct MediaBatch {
    pub video: Vec<AccessUnit>,
    pub audio: Vec<AacFrame>,
    /// Total duration in milliseconds, spread over each media type's samples
    pub duration: Option<u32>,
}

impl MediaBatch {
    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty()
    }
}

/// What one cycle did
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub video: RemuxOutcome,
    pub audio: RemuxOutcome,
    /// Audio frames discarded while the video track was unconfigured
    pub withheld_audio: usize,
    /// Keyframe decode times, in seconds
    pub keyframes: Vec<f64>,
    /// Whether this cycle produced the initialization segment
    pub initialized: bool,
    /// Segments handed to the sink
    pub segments: usize,
    /// Bytes handed to the sink
    pub bytes: usize,
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No initialization segment emitted yet
    Uninitialized,
    /// Initialization segment emitted; every cycle emits fragments
    Initialized,
}

/// Drives the tracks through the readiness/flush cycle
#[derive(Debug)]
pub struct RemuxController {
    /// Video first, then audio
    tracks: Vec<TrackRemuxer>,
    state: ControllerState,
    duration: MovieDuration,
    next_track_id: u32,
}

impl RemuxController {
    pub fn new(mode: TrackMode, duration: MovieDuration, nominal_duration: u32) -> Self {
        let mut controller = Self {
            tracks: Vec::with_capacity(2),
            state: ControllerState::Uninitialized,
            duration,
            next_track_id: 1,
        };

        if mode.has_video() {
            let id = controller.allocate_track_id();
            controller.tracks.push(TrackRemuxer::Video(H264Remuxer::new(
                id,
                TIMESCALE,
                nominal_duration,
            )));
        }
        if mode.has_audio() {
            let id = controller.allocate_track_id();
            controller.tracks.push(TrackRemuxer::Audio(AacRemuxer::new(
                id,
                TIMESCALE,
                nominal_duration,
            )));
        }

        controller
    }

    fn allocate_track_id(&mut self) -> u32 {
        let id = self.next_track_id;
        self.next_track_id += 1;
        id
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ControllerState::Initialized
    }

    pub fn tracks(&self) -> &[TrackRemuxer] {
        &self.tracks
    }

    pub fn video(&self) -> Option<&H264Remuxer> {
        self.tracks.iter().find_map(|t| match t {
            TrackRemuxer::Video(v) => Some(v),
            _ => None,
        })
    }

    pub fn audio(&self) -> Option<&AacRemuxer> {
        self.tracks.iter().find_map(|t| match t {
            TrackRemuxer::Audio(a) => Some(a),
            _ => None,
        })
    }

    /// Every track is configured and has samples buffered
    pub fn is_ready(&self) -> bool {
        !self.tracks.is_empty() && self.tracks.iter().all(|t| t.is_ready())
    }

    /// Audio may be appended: no video track, or the video track is configured
    fn accepts_audio(&self) -> bool {
        self.video().map_or(true, |v| v.is_configured())
    }

    /// Append one batch and emit whatever became available
    pub fn remux<S>(&mut self, batch: MediaBatch, sink: &mut S) -> CycleReport
    where
        S: SegmentSink + ?Sized,
    {
        let mut report = CycleReport::default();
        let MediaBatch {
            video,
            audio,
            duration,
        } = batch;

        let mut video = Some(video);
        let mut audio = Some(audio);
        for index in 0..self.tracks.len() {
            let accepts_audio = self.accepts_audio();
            match &mut self.tracks[index] {
                TrackRemuxer::Video(track) => {
                    let units = video.take().unwrap_or_default();
                    if !units.is_empty() {
                        report.video = track.remux(units, duration);
                    }
                }
                TrackRemuxer::Audio(track) => {
                    let frames = audio.take().unwrap_or_default();
                    if frames.is_empty() {
                        continue;
                    }
                    if accepts_audio {
                        report.audio = track.remux(frames, duration);
                    } else {
                        tracing::debug!(
                            frames = frames.len(),
                            "Withholding audio until the video track is configured"
                        );
                        report.withheld_audio += frames.len();
                    }
                }
            }
        }

        report.keyframes = report
            .video
            .keyframes
            .iter()
            .map(|&t| t as f64 / TIMESCALE as f64)
            .collect();

        self.flush(sink, &mut report);
        report
    }

    /// Emit the initialization segment once ready, then one fragment per
    /// track with buffered samples.
    pub fn flush<S>(&mut self, sink: &mut S, report: &mut CycleReport)
    where
        S: SegmentSink + ?Sized,
    {
        if self.state == ControllerState::Uninitialized {
            if !self.is_ready() {
                return;
            }
            self.emit_init(sink, report);
        }
        self.emit_fragments(sink, report);
    }

    fn emit_init<S>(&mut self, sink: &mut S, report: &mut CycleReport)
    where
        S: SegmentSink + ?Sized,
    {
        let infos: Vec<_> = self.tracks.iter().filter_map(|t| t.info()).collect();
        let payload = mp4::init_segment(&infos, self.duration);

        tracing::info!(
            tracks = infos.len(),
            size = payload.len(),
            "Initialization segment generated"
        );

        report.segments += 1;
        report.bytes += payload.len();
        report.initialized = true;
        sink.on_segment(Segment::init(payload));
        self.state = ControllerState::Initialized;
    }

    fn emit_fragments<S>(&mut self, sink: &mut S, report: &mut CycleReport)
    where
        S: SegmentSink + ?Sized,
    {
        for track in &mut self.tracks {
            let Some(payload) = track.payload() else {
                continue;
            };
            if payload.is_empty() {
                continue;
            }

            let kind = track.kind();
            let fragment = track.fragment();
            let dts = fragment.base_decode_time;
            let segment = mp4::media_segment(&fragment, &payload);

            tracing::debug!(
                kind = %kind,
                seq = fragment.sequence_number,
                dts = dts,
                samples = fragment.samples.len(),
                clock = %format_clock(dts),
                "Fragment emitted"
            );

            report.segments += 1;
            report.bytes += segment.len();
            sink.on_segment(Segment::media(kind, segment, dts));
            track.flush();
        }
    }

    /// Return every track to its initial state and wait for a new
    /// initialization segment.
    pub fn reset(&mut self) {
        for track in &mut self.tracks {
            track.reset();
        }
        self.state = ControllerState::Uninitialized;
        tracing::debug!("Remux controller reset");
    }
}

/// Render a millisecond timestamp as `[hh:]mm:ss`
pub fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
