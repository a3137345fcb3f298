//! H.264 track remuxer

use bytes::Bytes;

use super::{
    distribute_durations, CodecConfig, RemuxOutcome, Sample, Track, TrackFragment, TrackInfo,
    TrackKind, TrackState,
};
use crate::media::h264::{AccessUnit, AvcConfig, NalUnit, NaluType, SpsInfo};

/// Accumulates access units into AVC samples
#[derive(Debug)]
pub struct H264Remuxer {
    state: TrackState,
    nominal_duration: u32,
    sps: Option<(Bytes, SpsInfo)>,
    pps: Option<Bytes>,
    codec: Option<CodecConfig>,
}

impl H264Remuxer {
    pub fn new(track_id: u32, timescale: u32, nominal_duration: u32) -> Self {
        Self {
            state: TrackState::new(track_id, timescale),
            nominal_duration,
            sps: None,
            pps: None,
            codec: None,
        }
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    /// Coded picture size, once an SPS was accepted
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.sps.as_ref().map(|(_, info)| (info.width, info.height))
    }

    fn observe_sps(&mut self, unit: &NalUnit) {
        if self.sps.is_some() {
            return;
        }
        match SpsInfo::parse(unit.data()) {
            Ok(info) => {
                self.sps = Some((unit.data().clone(), info));
                self.try_configure();
            }
            Err(e) => {
                tracing::debug!(track = self.state.id(), error = %e, "Ignoring unparsable SPS");
            }
        }
    }

    fn observe_pps(&mut self, unit: &NalUnit) {
        if self.pps.is_some() {
            return;
        }
        self.pps = Some(unit.data().clone());
        self.try_configure();
    }

    fn try_configure(&mut self) {
        let (Some((sps, info)), Some(pps)) = (&self.sps, &self.pps) else {
            return;
        };
        match AvcConfig::from_parameter_sets(sps.clone(), pps.clone()) {
            Ok(config) => {
                tracing::info!(
                    track = self.state.id(),
                    profile = config.profile_name(),
                    level = %config.level_string(),
                    codec = %config.codec_string(),
                    width = info.width,
                    height = info.height,
                    "Video track configured"
                );
                self.codec = Some(CodecConfig::Avc {
                    config,
                    width: info.width,
                    height: info.height,
                });
            }
            Err(e) => {
                tracing::debug!(track = self.state.id(), error = %e, "Invalid parameter sets");
                self.sps = None;
                self.pps = None;
            }
        }
    }
}

impl Track for H264Remuxer {
    type Input = AccessUnit;

    fn remux(&mut self, samples: Vec<AccessUnit>, duration_hint: Option<u32>) -> RemuxOutcome {
        let count = samples.iter().filter(|au| au.has_slice()).count();
        let mut durations =
            distribute_durations(count, duration_hint, self.nominal_duration).into_iter();
        let mut cursor = self.state.pending_end();
        let mut outcome = RemuxOutcome::default();

        for access_unit in samples {
            let closed = access_unit.has_slice();
            let mut keyframe = false;
            let mut units = Vec::with_capacity(access_unit.units.len());

            for unit in access_unit.units {
                match unit.nalu_type() {
                    Some(NaluType::Sps) => self.observe_sps(&unit),
                    Some(NaluType::Pps) => self.observe_pps(&unit),
                    Some(NaluType::Idr) => keyframe = true,
                    Some(NaluType::Slice) | Some(NaluType::Sei) => {}
                    other => {
                        tracing::trace!(nalu_type = ?other, "Dropping NAL unit");
                        continue;
                    }
                }
                units.push(unit);
            }

            if !closed {
                continue;
            }
            let duration = durations.next().unwrap_or(self.nominal_duration);

            if self.codec.is_none() {
                outcome.dropped += 1;
                continue;
            }
            if keyframe {
                outcome.keyframes.push(cursor);
            }
            cursor += duration as u64;
            self.state.push(Sample::video(units, duration, keyframe));
            outcome.accepted += 1;
        }

        if outcome.dropped > 0 {
            tracing::debug!(
                track = self.state.id(),
                dropped = outcome.dropped,
                "Dropped video samples received before SPS/PPS"
            );
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
        self.codec.is_some()
    }

    fn info(&self) -> Option<TrackInfo> {
        self.codec.as_ref().map(|codec| TrackInfo {
            id: self.state.id(),
            kind: TrackKind::Video,
            timescale: self.state.timescale(),
            codec: codec.clone(),
        })
    }

    fn fragment(&self) -> TrackFragment<'_> {
        self.state.fragment(TrackKind::Video)
    }

    fn reset(&mut self) {
        self.state.reset();
        self.sps = None;
        self.pps = None;
        self.codec = None;
    }
}
