//! Timed samples held in a track's sample table

use bytes::{BufMut, Bytes, BytesMut};

use crate::media::h264::NalUnit;

/// Per-sample flags as laid out in `trun`/`trex`
///
/// ```text
/// reserved (4) | is_leading (2) | sample_depends_on (2)
/// | sample_is_depended_on (2) | sample_has_redundancy (2)
/// | padding (3) | sample_is_non_sync (1) | degradation_priority (16)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleFlags {
    pub is_leading: u8,
    pub depends_on: u8,
    pub is_depended_on: u8,
    pub has_redundancy: u8,
    pub is_non_sync: bool,
    pub degradation_priority: u16,
}

impl SampleFlags {
    /// Sync sample that references nothing
    pub fn sync() -> Self {
        Self {
            depends_on: 2,
            ..Default::default()
        }
    }

    /// Non-sync sample predicted from earlier pictures
    pub fn delta() -> Self {
        Self {
            depends_on: 1,
            is_non_sync: true,
            ..Default::default()
        }
    }

    pub fn to_u32(self) -> u32 {
        ((self.is_leading as u32 & 0x03) << 26)
            | ((self.depends_on as u32 & 0x03) << 24)
            | ((self.is_depended_on as u32 & 0x03) << 22)
            | ((self.has_redundancy as u32 & 0x03) << 20)
            | ((self.is_non_sync as u32) << 16)
            | self.degradation_priority as u32
    }
}

/// Sample payload: NAL units for video, one raw frame for audio
#[derive(Debug, Clone)]
pub enum SampleData {
    Nal(Vec<NalUnit>),
    Raw(Bytes),
}

/// One access unit or audio frame with its timing
#[derive(Debug, Clone)]
pub struct Sample {
    pub data: SampleData,
    /// Size in the `mdat`, length prefixes included
    pub size: u32,
    /// Duration in track timescale ticks
    pub duration: u32,
    pub keyframe: bool,
    pub flags: SampleFlags,
}

impl Sample {
    /// Video sample in AVC sample format
    pub fn video(units: Vec<NalUnit>, duration: u32, keyframe: bool) -> Self {
        let size = units.iter().map(|u| u.prefixed_len()).sum::<usize>() as u32;
        Self {
            data: SampleData::Nal(units),
            size,
            duration,
            keyframe,
            flags: if keyframe {
                SampleFlags::sync()
            } else {
                SampleFlags::delta()
            },
        }
    }

    /// Audio sample (every AAC frame is a sync sample)
    pub fn audio(frame: Bytes, duration: u32) -> Self {
        Self {
            size: frame.len() as u32,
            data: SampleData::Raw(frame),
            duration,
            keyframe: true,
            flags: SampleFlags::sync(),
        }
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        match &self.data {
            SampleData::Nal(units) => {
                for unit in units {
                    unit.write_prefixed(buf);
                }
            }
            SampleData::Raw(frame) => buf.put_slice(frame),
        }
    }
}

/// Split `total` ticks over `count` samples.
///
/// The first `total % count` samples get one extra tick, so the sum is
/// exactly `total`. Without a total (or a zero total) every sample gets
/// `nominal`.
pub fn distribute_durations(count: usize, total: Option<u32>, nominal: u32) -> Vec<u32> {
    match total {
        Some(total) if total > 0 && count > 0 => {
            let count_u32 = count as u32;
            let base = total / count_u32;
            let remainder = (total % count_u32) as usize;
            (0..count)
                .map(|i| if i < remainder { base + 1 } else { base })
                .collect()
        }
        _ => vec![nominal; count],
    }
}
