//! Remuxer facade
//!
//! High-level API that turns raw H.264/AAC chunks into fMP4 segments.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::config::{RemuxConfig, TrackMode};
use crate::controller::{CycleReport, MediaBatch, RemuxController};
use crate::error::{Error, Result};
use crate::eviction::EvictionPolicy;
use crate::media::aac::extract_aac_frames;
use crate::media::h264::{extract_nal_units, group_access_units};
use crate::mp4::MovieDuration;
use crate::remux::{CodecConfig, Track};
use crate::segment::{Segment, SegmentSink};
use crate::stats::RemuxStats;

/// Remuxer shared between the feeding task and the [`FlushTask`](super::FlushTask)
pub type SharedRemuxer<S> = Arc<Mutex<Remuxer<S>>>;

/// One delivery of raw media
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// Annex-B H.264 bytes
    pub video: Option<Bytes>,
    /// ADTS AAC bytes
    pub audio: Option<Bytes>,
    /// Total duration of this chunk's samples, in milliseconds
    pub duration: Option<u32>,
}

impl Chunk {
    /// Chunk carrying only video
    pub fn video(data: impl Into<Bytes>) -> Self {
        Self {
            video: Some(data.into()),
            ..Default::default()
        }
    }

    /// Chunk carrying only audio
    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self {
            audio: Some(data.into()),
            ..Default::default()
        }
    }

    /// Add video data
    pub fn with_video(mut self, data: impl Into<Bytes>) -> Self {
        self.video = Some(data.into());
        self
    }

    /// Add audio data
    pub fn with_audio(mut self, data: impl Into<Bytes>) -> Self {
        self.audio = Some(data.into());
        self
    }

    /// Set the duration hint in milliseconds
    pub fn with_duration(mut self, ms: u32) -> Self {
        self.duration = Some(ms);
        self
    }

    fn len(&self) -> usize {
        self.video.as_ref().map_or(0, Bytes::len) + self.audio.as_ref().map_or(0, Bytes::len)
    }
}

/// H.264/AAC to fMP4 remuxer
///
/// Every segment is handed to the sink as soon as it is produced. The
/// periodic part (release cue and buffer eviction) runs through [`tick`]
/// and is normally driven by a [`FlushTask`](super::FlushTask).
///
/// # Example
/// ```no_run
/// use fmp4_remux::{Chunk, RemuxConfig, Remuxer, Segment};
///
/// # fn example(annexb: Vec<u8>) -> fmp4_remux::Result<()> {
/// let sink: Vec<Segment> = Vec::new();
/// let mut remuxer = Remuxer::new(RemuxConfig::default().fps(25), sink)?;
///
/// remuxer.feed(Chunk::video(annexb).with_duration(40))?;
///
/// for segment in remuxer.sink() {
///     println!("{} segment, {} bytes", segment.kind, segment.len());
/// }
/// # Ok(())
/// # }
/// ```
///
/// [`tick`]: Remuxer::tick
pub struct Remuxer<S> {
    config: RemuxConfig,
    /// `None` once closed
    controller: Option<RemuxController>,
    eviction: EvictionPolicy,
    stats: RemuxStats,
    sink: S,
}

impl<S: SegmentSink> Remuxer<S> {
    /// Create a remuxer delivering segments to `sink`
    pub fn new(config: RemuxConfig, sink: S) -> Result<Self> {
        config.validate()?;

        let controller = RemuxController::new(
            config.mode,
            MovieDuration::for_mode(config.streaming),
            config.nominal_duration(),
        );
        let eviction = EvictionPolicy::new(
            config.evict_buffer,
            config.mode == TrackMode::Audio,
            config.eviction_interval,
        );

        tracing::info!(
            mode = ?config.mode,
            streaming = config.streaming,
            fps = config.fps,
            evict_buffer = config.evict_buffer,
            "Remuxer created"
        );

        Ok(Self {
            config,
            controller: Some(controller),
            eviction,
            stats: RemuxStats::new(),
            sink,
        })
    }

    /// Wrap into the shared form used with a [`FlushTask`](super::FlushTask)
    pub fn into_shared(self) -> SharedRemuxer<S> {
        Arc::new(Mutex::new(self))
    }

    /// Parse, remux and emit one chunk.
    ///
    /// Fails with [`Error::EmptyInput`] when neither media field yields a
    /// unit for an enabled track. Nothing is mutated in that case.
    pub fn feed(&mut self, chunk: Chunk) -> Result<()> {
        let Some(controller) = self.controller.as_mut() else {
            return Err(Error::Closed);
        };
        let mode = self.config.mode;
        let received = chunk.len();

        let units = match &chunk.video {
            Some(data) if mode.has_video() => extract_nal_units(data),
            _ => Vec::new(),
        };
        let frames = match &chunk.audio {
            Some(data) if mode.has_audio() => extract_aac_frames(data),
            _ => Vec::new(),
        };

        if units.is_empty() && frames.is_empty() {
            tracing::warn!(
                bytes = received,
                "Chunk yielded no NAL units or AAC frames"
            );
            return Err(Error::EmptyInput);
        }

        let batch = MediaBatch {
            video: group_access_units(units),
            audio: frames,
            duration: chunk.duration.filter(|&d| d > 0),
        };

        let report = {
            let mut tap = StatsTap {
                sink: &mut self.sink,
                stats: &mut self.stats,
            };
            controller.remux(batch, &mut tap)
        };

        self.stats.bytes_received += received as u64;
        self.eviction.record(report.keyframes.iter().copied());
        self.record_cycle(&report);
        Ok(())
    }

    fn record_cycle(&mut self, report: &CycleReport) {
        let stats = &mut self.stats;
        stats.video_samples += report.video.accepted as u64;
        stats.audio_samples += report.audio.accepted as u64;
        stats.keyframes += report.video.keyframes.len() as u64;
        stats.dropped_samples +=
            (report.video.dropped + report.audio.dropped + report.withheld_audio) as u64;

        if !report.initialized {
            return;
        }
        let Some(controller) = self.controller.as_ref() else {
            return;
        };
        if let Some(info) = controller.video().and_then(|v| v.info()) {
            if let CodecConfig::Avc {
                config,
                width,
                height,
            } = info.codec
            {
                stats.video_codec = Some(config.codec_string());
                stats.width = Some(width);
                stats.height = Some(height);
            }
        }
        if let Some(config) = controller.audio().and_then(|a| a.config()) {
            stats.audio_codec = Some(config.codec_string());
            stats.audio_sample_rate = Some(config.sampling_frequency);
            stats.audio_channels = Some(config.channels());
        }
    }

    /// Run one periodic cycle at the current time.
    ///
    /// `position` is the playback position in seconds. Returns the eviction
    /// cutoff when a pass ran and found one.
    pub fn tick(&mut self, position: f64) -> Option<f64> {
        self.tick_at(Instant::now(), position)
    }

    /// [`tick`](Self::tick) with an explicit clock reading
    pub fn tick_at(&mut self, now: Instant, position: f64) -> Option<f64> {
        if self.is_closed() {
            return None;
        }
        self.sink.on_release();

        let cutoff = self.eviction.poll(now, position)?;
        self.stats.evictions += 1;
        tracing::debug!(position = position, cutoff = cutoff, "Evicting buffered media");
        self.sink.on_evict(cutoff);
        Some(cutoff)
    }

    /// Drop all track state and wait for a new initialization segment
    pub fn reset(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.reset();
        }
        self.eviction.reset(Instant::now());
        tracing::info!("Remuxer reset");
    }

    /// Release track state. Further `feed` calls fail with [`Error::Closed`].
    pub fn close(&mut self) {
        if self.controller.take().is_none() {
            return;
        }
        self.eviction.reset(Instant::now());
        tracing::info!(
            segments = self.stats.init_segments + self.stats.media_segments,
            bytes = self.stats.bytes_emitted,
            "Remuxer closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.controller.is_none()
    }

    /// Whether the initialization segment was emitted
    pub fn is_initialized(&self) -> bool {
        self.controller
            .as_ref()
            .is_some_and(|c| c.is_initialized())
    }

    pub fn config(&self) -> &RemuxConfig {
        &self.config
    }

    pub fn stats(&self) -> &RemuxStats {
        &self.stats
    }

    pub fn eviction(&self) -> &EvictionPolicy {
        &self.eviction
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S> std::fmt::Debug for Remuxer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remuxer")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Counts segments on their way to the sink
struct StatsTap<'a, S> {
    sink: &'a mut S,
    stats: &'a mut RemuxStats,
}

impl<S: SegmentSink> SegmentSink for StatsTap<'_, S> {
    fn on_segment(&mut self, segment: Segment) {
        self.stats.record_segment(&segment);
        self.sink.on_segment(segment);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::media::aac::tests::adts_stream;
    use crate::media::h264::tests::{annex_b, sps_with_size, IDR, NON_IDR, PPS, SPS_640X480};
    use crate::segment::SegmentKind;

    #[derive(Debug, Default)]
    struct Recorder {
        segments: Vec<Segment>,
        releases: usize,
        evictions: Vec<f64>,
    }

    impl SegmentSink for Recorder {
        fn on_segment(&mut self, segment: Segment) {
            self.segments.push(segment);
        }

        fn on_release(&mut self) {
            self.releases += 1;
        }

        fn on_evict(&mut self, cutoff: f64) {
            self.evictions.push(cutoff);
        }
    }

    fn video_config() -> RemuxConfig {
        RemuxConfig::with_mode(TrackMode::Video)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Remuxer::new(RemuxConfig::default().fps(0), Vec::<Segment>::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_feed_emits_init_and_fragment() {
        let mut remuxer = Remuxer::new(video_config(), Vec::<Segment>::new()).unwrap();
        remuxer
            .feed(Chunk::video(annex_b(&[SPS_640X480, PPS, IDR])))
            .unwrap();

        assert!(remuxer.is_initialized());
        let kinds: Vec<SegmentKind> = remuxer.sink().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SegmentKind::Init, SegmentKind::Video]);

        let stats = remuxer.stats();
        assert_eq!(stats.video_samples, 1);
        assert_eq!(stats.keyframes, 1);
        assert_eq!(stats.init_segments, 1);
        assert_eq!(stats.media_segments, 1);
        assert_eq!(stats.video_codec.as_deref(), Some("avc1.42c01e"));
        assert_eq!(stats.width, Some(640));
        assert_eq!(stats.height, Some(480));
        assert_eq!(
            stats.bytes_emitted,
            remuxer.sink().iter().map(|s| s.len() as u64).sum::<u64>()
        );
    }

    #[test]
    fn test_oversized_sps_is_skipped() {
        let mut remuxer = Remuxer::new(video_config(), Vec::<Segment>::new()).unwrap();
        let bad_sps = sps_with_size((1 << 29) - 2, 29);

        remuxer
            .feed(Chunk::video(annex_b(&[bad_sps.as_slice(), PPS, IDR])))
            .unwrap();
        assert!(!remuxer.is_initialized());
        assert!(remuxer.sink().is_empty());
        assert_eq!(remuxer.stats().dropped_samples, 1);

        // A valid SPS later in the stream still configures the track
        remuxer
            .feed(Chunk::video(annex_b(&[SPS_640X480, IDR])))
            .unwrap();
        assert!(remuxer.is_initialized());
        assert_eq!(remuxer.sink()[0].kind, SegmentKind::Init);
        assert_eq!(remuxer.stats().width, Some(640));
    }

    #[test]
    fn test_truncated_sps_and_garbage_emit_nothing() {
        let mut remuxer = Remuxer::new(video_config(), Vec::<Segment>::new()).unwrap();

        remuxer
            .feed(Chunk::video(annex_b(&[&SPS_640X480[..5], PPS, IDR])))
            .unwrap();
        remuxer
            .feed(Chunk::video(Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x03])))
            .unwrap();
        remuxer
            .feed(Chunk::video(annex_b(&[&[0x67][..], &[0x7F, 0xFF][..], NON_IDR])))
            .unwrap();

        assert!(!remuxer.is_initialized());
        assert!(remuxer.sink().is_empty());
        assert_eq!(remuxer.stats().video_samples, 0);
        assert_eq!(remuxer.stats().dropped_samples, 2);
    }

    #[test]
    fn test_empty_chunk_is_rejected() {
        let mut remuxer = Remuxer::new(video_config(), Vec::<Segment>::new()).unwrap();

        assert!(matches!(
            remuxer.feed(Chunk::default()),
            Err(Error::EmptyInput)
        ));
        assert!(matches!(
            remuxer.feed(Chunk::video(Bytes::new())),
            Err(Error::EmptyInput)
        ));
        assert!(remuxer.sink().is_empty());
        assert_eq!(remuxer.stats().bytes_received, 0);
    }

    #[test]
    fn test_media_for_disabled_track_is_ignored() {
        let mut remuxer = Remuxer::new(video_config(), Vec::<Segment>::new()).unwrap();
        let chunk = Chunk::audio(adts_stream(&[&[1, 2, 3]]));

        assert!(matches!(remuxer.feed(chunk), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_feed_after_close() {
        let mut remuxer = Remuxer::new(video_config(), Vec::<Segment>::new()).unwrap();
        remuxer.close();
        remuxer.close();

        assert!(remuxer.is_closed());
        let result = remuxer.feed(Chunk::video(annex_b(&[SPS_640X480, PPS, IDR])));
        assert!(matches!(result, Err(Error::Closed)));
        assert_eq!(remuxer.tick(10.0), None);
    }

    #[test]
    fn test_tick_releases_and_evicts() {
        let config = video_config().eviction_interval(Duration::from_secs(10));
        let mut remuxer = Remuxer::new(config, Recorder::default()).unwrap();
        remuxer
            .feed(
                Chunk::video(annex_b(&[SPS_640X480, PPS, IDR, NON_IDR, NON_IDR, IDR]))
                    .with_duration(400),
            )
            .unwrap();

        let keyframes: Vec<f64> = remuxer.eviction().index().iter().collect();
        assert_eq!(keyframes, vec![0.0, 0.3]);

        let start = Instant::now();
        assert_eq!(remuxer.tick_at(start, 5.0), None);
        assert_eq!(remuxer.sink().releases, 1);

        let later = start + Duration::from_secs(11);
        assert_eq!(remuxer.tick_at(later, 5.0), Some(0.3));
        assert_eq!(remuxer.sink().releases, 2);
        assert_eq!(remuxer.sink().evictions, vec![0.3]);
        assert_eq!(remuxer.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_disabled() {
        let config = video_config().evict_buffer(false);
        let mut remuxer = Remuxer::new(config, Recorder::default()).unwrap();
        remuxer
            .feed(Chunk::video(annex_b(&[SPS_640X480, PPS, IDR])))
            .unwrap();

        let later = Instant::now() + Duration::from_secs(60);
        assert_eq!(remuxer.tick_at(later, 5.0), None);
        assert_eq!(remuxer.sink().releases, 1);
        assert!(remuxer.sink().evictions.is_empty());
    }

    #[test]
    fn test_reset_starts_a_new_stream() {
        let mut remuxer = Remuxer::new(video_config(), Vec::<Segment>::new()).unwrap();
        remuxer
            .feed(Chunk::video(annex_b(&[SPS_640X480, PPS, IDR])))
            .unwrap();
        remuxer.reset();
        assert!(!remuxer.is_initialized());

        remuxer
            .feed(Chunk::video(annex_b(&[SPS_640X480, PPS, IDR])))
            .unwrap();
        let inits = remuxer
            .sink()
            .iter()
            .filter(|s| s.kind == SegmentKind::Init)
            .count();
        assert_eq!(inits, 2);
    }

    #[test]
    fn test_audio_stats() {
        let config = RemuxConfig::with_mode(TrackMode::Audio);
        let mut remuxer = Remuxer::new(config, Vec::<Segment>::new()).unwrap();
        remuxer
            .feed(Chunk::audio(adts_stream(&[&[1, 2], &[3, 4]])))
            .unwrap();

        let stats = remuxer.stats();
        assert_eq!(stats.audio_samples, 2);
        assert_eq!(stats.audio_codec.as_deref(), Some("mp4a.40.2"));
        assert_eq!(stats.audio_sample_rate, Some(44100));
        assert_eq!(stats.audio_channels, Some(2));
    }
}
