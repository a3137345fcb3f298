//! AAC track remuxer

use bytes::Bytes;

use super::{
    distribute_durations, CodecConfig, RemuxOutcome, Sample, Track, TrackFragment, TrackInfo,
    TrackKind, TrackState,
};
use crate::media::aac::{AacFrame, AudioSpecificConfig};

/// Accumulates raw AAC frames into audio samples
#[derive(Debug)]
pub struct AacRemuxer {
    state: TrackState,
    nominal_duration: u32,
    config: Option<AudioSpecificConfig>,
}

impl AacRemuxer {
    pub fn new(track_id: u32, timescale: u32, nominal_duration: u32) -> Self {
        Self {
            state: TrackState::new(track_id, timescale),
            nominal_duration,
            config: None,
        }
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn config(&self) -> Option<&AudioSpecificConfig> {
        self.config.as_ref()
    }

    fn observe(&mut self, frame: &AacFrame) {
        if self.config.is_some() {
            return;
        }
        match AudioSpecificConfig::from_adts(&frame.header) {
            Ok(config) => {
                tracing::info!(
                    track = self.state.id(),
                    profile = config.profile().map(|p| p.name()).unwrap_or("Unknown"),
                    codec = %config.codec_string(),
                    sample_rate = config.sampling_frequency,
                    channels = config.channels(),
                    "Audio track configured"
                );
                self.config = Some(config);
            }
            Err(e) => {
                tracing::debug!(track = self.state.id(), error = %e, "Ignoring ADTS header");
            }
        }
    }
}

impl Track for AacRemuxer {
    type Input = AacFrame;

    fn remux(&mut self, samples: Vec<AacFrame>, duration_hint: Option<u32>) -> RemuxOutcome {
        let durations = distribute_durations(samples.len(), duration_hint, self.nominal_duration);
        let mut outcome = RemuxOutcome::default();

        for (frame, duration) in samples.into_iter().zip(durations) {
            self.observe(&frame);
            if self.config.is_none() {
                outcome.dropped += 1;
                continue;
            }
            self.state.push(Sample::audio(frame.data, duration));
            outcome.accepted += 1;
        }

        outcome
    }

    fn payload(&self) -> Option<Bytes> {
        if !self.is_configured() {
            return None;
        }
        self.state.payload()
    }

    fn flush(&mut self) {
        self.state.flush();
    }

    fn is_ready(&self) -> bool {
        self.is_configured() && !self.state.samples().is_empty()
    }

    fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn info(&self) -> Option<TrackInfo> {
        self.config.as_ref().map(|config| TrackInfo {
            id: self.state.id(),
            kind: TrackKind::Audio,
            timescale: self.state.timescale(),
            codec: CodecConfig::Aac {
                config: config.clone(),
            },
        })
    }

    fn fragment(&self) -> TrackFragment<'_> {
        self.state.fragment(TrackKind::Audio)
    }

    fn reset(&mut self) {
        self.state.reset();
        self.config = None;
    }
}
