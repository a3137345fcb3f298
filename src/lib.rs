//! # fmp4-remux
//!
//! Real-time remuxer from raw H.264 (Annex-B) and AAC (ADTS) elementary
//! streams to fragmented MP4, for playback buffers that accept media
//! incrementally.
//!
//! ```text
//!  Chunk { video, audio, duration }
//!         │ feed()
//!         ▼
//!  media::h264 / media::aac      (NAL units, ADTS frames)
//!         ▼
//!  remux::{H264Remuxer, AacRemuxer}   (samples, codec config)
//!         ▼
//!  controller::RemuxController   (init once ready, then moof+mdat)
//!         ▼
//!  SegmentSink::on_segment()
//!
//!  FlushTask ── every flush_interval ──► on_release(), on_evict(cutoff)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use fmp4_remux::{Chunk, FlushTask, RemuxConfig, Remuxer, Segment};
//!
//! # async fn example(chunks: Vec<Vec<u8>>) -> fmp4_remux::Result<()> {
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Segment>();
//! let remuxer = Remuxer::new(RemuxConfig::default(), tx)?.into_shared();
//! let _task = FlushTask::spawn(&remuxer, || 0.0_f64);
//!
//! tokio::spawn(async move {
//!     while let Some(segment) = rx.recv().await {
//!         println!("{} segment: {} bytes", segment.kind, segment.len());
//!     }
//! });
//!
//! for data in chunks {
//!     remuxer.lock().await.feed(Chunk::video(data))?;
//! }
//! remuxer.lock().await.close();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod eviction;
pub mod media;
pub mod mp4;
pub mod remux;
pub mod segment;
pub mod stats;

pub use client::{Chunk, FlushTask, Remuxer, SharedRemuxer};
pub use config::{RemuxConfig, TrackMode};
pub use controller::{MediaBatch, RemuxController};
pub use error::{Error, MediaError, Result};
pub use eviction::{EvictionPolicy, KeyframeIndex};
pub use segment::{FnSink, PlaybackClock, Segment, SegmentKind, SegmentSink};
pub use stats::RemuxStats;
