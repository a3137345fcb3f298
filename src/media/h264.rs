//! H.264/AVC elementary stream parsing
//!
//! Video arrives as an Annex-B byte stream: NAL units separated by 3- or
//! 4-byte start codes.
//!
//! ```text
//! +-------------+------------+-------------+------------+----
//! | 00 00 00 01 | NAL unit   | 00 00 01    | NAL unit   | ...
//! +-------------+------------+-------------+------------+----
//! ```
//!
//! NAL unit header (1 byte):
//! ```text
//! forbidden_zero_bit (1) | nal_ref_idc (2) | nal_unit_type (5)
//! ```
//!
//! fMP4 carries the same units in AVC sample format (4-byte big-endian
//! length prefix instead of a start code) and the parameter sets in an
//! AVCDecoderConfigurationRecord:
//! ```text
//! configurationVersion (1) | AVCProfileIndication (1) | profile_compatibility (1)
//! | AVCLevelIndication (1) | lengthSizeMinusOne (1, lower 2 bits)
//! | numOfSPS (1, lower 5 bits) | { spsLength (2) | spsNALUnit }*
//! | numOfPPS (1) | { ppsLength (2) | ppsNALUnit }*
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::MediaError;

/// NAL unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    /// Non-IDR slice
    Slice = 1,
    /// Slice data partition A
    SlicePartA = 2,
    /// Slice data partition B
    SlicePartB = 3,
    /// Slice data partition C
    SlicePartC = 4,
    /// IDR slice (keyframe)
    Idr = 5,
    /// Supplemental enhancement information
    Sei = 6,
    /// Sequence parameter set
    Sps = 7,
    /// Picture parameter set
    Pps = 8,
    /// Access unit delimiter
    Aud = 9,
    /// End of sequence
    EndSeq = 10,
    /// End of stream
    EndStream = 11,
    /// Filler data
    Filler = 12,
}

impl NaluType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            1 => Some(NaluType::Slice),
            2 => Some(NaluType::SlicePartA),
            3 => Some(NaluType::SlicePartB),
            4 => Some(NaluType::SlicePartC),
            5 => Some(NaluType::Idr),
            6 => Some(NaluType::Sei),
            7 => Some(NaluType::Sps),
            8 => Some(NaluType::Pps),
            9 => Some(NaluType::Aud),
            10 => Some(NaluType::EndSeq),
            11 => Some(NaluType::EndStream),
            12 => Some(NaluType::Filler),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, NaluType::Idr)
    }

    /// Slice units close the access unit they belong to
    pub fn is_slice(&self) -> bool {
        matches!(self, NaluType::Idr | NaluType::Slice)
    }
}

/// A single NAL unit without its start code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    data: Bytes,
}

impl NalUnit {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Unit type, `None` for reserved/unspecified types
    pub fn nalu_type(&self) -> Option<NaluType> {
        self.data.first().and_then(|b| NaluType::from_byte(*b))
    }

    pub fn is_slice(&self) -> bool {
        self.nalu_type().is_some_and(|t| t.is_slice())
    }

    pub fn is_keyframe(&self) -> bool {
        self.nalu_type().is_some_and(|t| t.is_keyframe())
    }

    /// Raw unit bytes, header included
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in AVC sample format (4-byte length prefix + unit)
    pub fn prefixed_len(&self) -> usize {
        4 + self.data.len()
    }

    /// Write the unit in AVC sample format
    pub fn write_prefixed(&self, buf: &mut BytesMut) {
        buf.put_u32(self.data.len() as u32);
        buf.put_slice(&self.data);
    }
}

/// Split an Annex-B buffer into NAL units.
///
/// Bytes before the first start code are returned as a unit of their own.
/// The last unit runs to the end of the buffer. Nothing is carried over
/// between calls, so a unit split across two buffers comes out as two
/// fragments.
pub fn extract_nal_units(data: &Bytes) -> Vec<NalUnit> {
    let mut units = Vec::new();
    let len = data.len();
    let mut start = 0;
    let mut i = 0;

    while i + 3 <= len {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            push_unit(&mut units, data, start, trim_trailing_zeros(data, start, i));
            i += 3;
            start = i;
        } else {
            i += 1;
        }
    }
    push_unit(&mut units, data, start, len);

    units
}

/// End of the unit preceding a start code at `end`.
///
/// Zeros right before a start code are the leading zero of a 4-byte start
/// code or trailing_zero_8bits. A unit running to the end of the buffer
/// keeps its bytes.
fn trim_trailing_zeros(data: &Bytes, start: usize, mut end: usize) -> usize {
    while end > start && data[end - 1] == 0 {
        end -= 1;
    }
    end
}

fn push_unit(units: &mut Vec<NalUnit>, data: &Bytes, start: usize, end: usize) {
    if end > start {
        units.push(NalUnit::new(data.slice(start..end)));
    }
}

/// NAL units belonging to one picture
#[derive(Debug, Clone, Default)]
pub struct AccessUnit {
    pub units: Vec<NalUnit>,
}

impl AccessUnit {
    /// Whether the group was closed by a slice
    pub fn has_slice(&self) -> bool {
        self.units.last().is_some_and(|u| u.is_slice())
    }

    pub fn is_keyframe(&self) -> bool {
        self.units.iter().any(|u| u.is_keyframe())
    }
}

/// Group units into access units, closing a group after every slice.
///
/// Units following the last slice form a trailing group without a slice.
/// It is still returned so that parameter sets in it are observed.
pub fn group_access_units(units: Vec<NalUnit>) -> Vec<AccessUnit> {
    let mut groups = Vec::new();
    let mut current = AccessUnit::default();

    for unit in units {
        let closes = unit.is_slice();
        current.units.push(unit);
        if closes {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.units.is_empty() {
        groups.push(current);
    }

    groups
}

/// Upper bound on `pic_width_in_mbs` and `pic_height_in_map_units`
/// (8192 pixels; level 6.2 tops out at 8192x4320)
const MAX_DIMENSION_IN_MBS: u32 = 512;

/// `num_ref_frames_in_pic_order_cnt_cycle` range
const MAX_REF_FRAMES_IN_POC_CYCLE: u32 = 255;

/// Fields of a sequence parameter set needed for the sample description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile: u8,
    pub compatibility: u8,
    pub level: u8,
    /// Display width after cropping
    pub width: u32,
    /// Display height after cropping
    pub height: u32,
}

impl SpsInfo {
    /// Parse an SPS NAL unit (header byte included)
    pub fn parse(nal: &[u8]) -> Result<Self, MediaError> {
        if nal.len() < 4 || NaluType::from_byte(nal[0]) != Some(NaluType::Sps) {
            return Err(MediaError::InvalidSps);
        }

        let rbsp = strip_emulation_prevention(&nal[1..]);
        let mut r = BitReader::new(&rbsp);

        let profile = r.read_bits(8)? as u8;
        let compatibility = r.read_bits(8)? as u8;
        let level = r.read_bits(8)? as u8;
        r.read_ue()?; // seq_parameter_set_id

        let mut chroma_format_idc = 1;
        let mut separate_colour_plane = false;
        if matches!(
            profile,
            100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
        ) {
            chroma_format_idc = r.read_ue()?;
            if chroma_format_idc == 3 {
                separate_colour_plane = r.read_bit()?;
            }
            r.read_ue()?; // bit_depth_luma_minus8
            r.read_ue()?; // bit_depth_chroma_minus8
            r.read_bit()?; // qpprime_y_zero_transform_bypass_flag
            if r.read_bit()? {
                let lists = if chroma_format_idc == 3 { 12 } else { 8 };
                for i in 0..lists {
                    if r.read_bit()? {
                        r.skip_scaling_list(if i < 6 { 16 } else { 64 })?;
                    }
                }
            }
        }

        r.read_ue()?; // log2_max_frame_num_minus4
        match r.read_ue()? {
            0 => {
                r.read_ue()?; // log2_max_pic_order_cnt_lsb_minus4
            }
            1 => {
                r.read_bit()?; // delta_pic_order_always_zero_flag
                r.read_se()?; // offset_for_non_ref_pic
                r.read_se()?; // offset_for_top_to_bottom_field
                let cycle = r.read_ue()?;
                if cycle > MAX_REF_FRAMES_IN_POC_CYCLE {
                    return Err(MediaError::InvalidSps);
                }
                for _ in 0..cycle {
                    r.read_se()?;
                }
            }
            _ => {}
        }
        r.read_ue()?; // max_num_ref_frames
        r.read_bit()?; // gaps_in_frame_num_value_allowed_flag

        let width_in_mbs = r.read_ue()?.saturating_add(1);
        let height_in_map_units = r.read_ue()?.saturating_add(1);
        if width_in_mbs > MAX_DIMENSION_IN_MBS || height_in_map_units > MAX_DIMENSION_IN_MBS {
            return Err(MediaError::InvalidSps);
        }
        let frame_mbs_only = r.read_bit()?;
        if !frame_mbs_only {
            r.read_bit()?; // mb_adaptive_frame_field_flag
        }
        r.read_bit()?; // direct_8x8_inference_flag

        let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0, 0, 0, 0);
        if r.read_bit()? {
            crop_left = r.read_ue()?;
            crop_right = r.read_ue()?;
            crop_top = r.read_ue()?;
            crop_bottom = r.read_ue()?;
        }

        let field_factor = if frame_mbs_only { 1 } else { 2 };
        let chroma_array_type = if separate_colour_plane {
            0
        } else {
            chroma_format_idc
        };
        let (crop_unit_x, crop_unit_y) = match chroma_array_type {
            0 => (1, field_factor),
            1 => (2, 2 * field_factor),
            2 => (2, field_factor),
            _ => (1, field_factor),
        };

        let width = cropped_size(width_in_mbs * 16, crop_unit_x, crop_left, crop_right)?;
        let height = cropped_size(
            field_factor * height_in_map_units * 16,
            crop_unit_y,
            crop_top,
            crop_bottom,
        )?;

        Ok(SpsInfo {
            profile,
            compatibility,
            level,
            width,
            height,
        })
    }
}

/// Coded size minus the cropping window
fn cropped_size(coded: u32, unit: u32, start: u32, end: u32) -> Result<u32, MediaError> {
    start
        .checked_add(end)
        .and_then(|crop| crop.checked_mul(unit))
        .and_then(|crop| coded.checked_sub(crop))
        .ok_or(MediaError::InvalidSps)
}

/// Remove emulation prevention bytes (00 00 03 -> 00 00)
fn strip_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &b in data {
        if zeros >= 2 && b == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        out.push(b);
    }
    out
}

/// MSB-first bit reader over an RBSP
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bit(&mut self) -> Result<bool, MediaError> {
        let byte = self
            .data
            .get(self.pos / 8)
            .ok_or(MediaError::UnexpectedEof)?;
        let bit = (byte >> (7 - (self.pos % 8))) & 1;
        self.pos += 1;
        Ok(bit == 1)
    }

    fn read_bits(&mut self, n: u32) -> Result<u32, MediaError> {
        let mut value = 0;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Ok(value)
    }

    /// Unsigned Exp-Golomb
    fn read_ue(&mut self) -> Result<u32, MediaError> {
        let mut leading_zeros = 0;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(MediaError::InvalidSps);
            }
        }
        Ok(((1u64 << leading_zeros) - 1) as u32 + self.read_bits(leading_zeros)?)
    }

    /// Signed Exp-Golomb
    fn read_se(&mut self) -> Result<i32, MediaError> {
        let k = self.read_ue()? as i64;
        Ok(if k % 2 == 1 {
            ((k + 1) / 2) as i32
        } else {
            -(k / 2) as i32
        })
    }

    fn skip_scaling_list(&mut self, size: usize) -> Result<(), MediaError> {
        let mut last = 8i64;
        let mut next = 8i64;
        for _ in 0..size {
            if next != 0 {
                let delta = self.read_se()? as i64;
                next = (last + delta).rem_euclid(256);
            }
            if next != 0 {
                last = next;
            }
        }
        Ok(())
    }
}

/// AVC decoder configuration (the `avcC` payload)
#[derive(Debug, Clone)]
pub struct AvcConfig {
    /// AVC profile (66=Baseline, 77=Main, 100=High, etc.)
    pub profile: u8,
    /// Profile compatibility flags
    pub compatibility: u8,
    /// AVC level (e.g., 31 = 3.1)
    pub level: u8,
    /// Sequence Parameter Sets
    pub sps: Vec<Bytes>,
    /// Picture Parameter Sets
    pub pps: Vec<Bytes>,
    /// Raw AVCDecoderConfigurationRecord bytes
    pub raw: Bytes,
}

impl AvcConfig {
    /// Build a decoder configuration record from one SPS and one PPS
    pub fn from_parameter_sets(sps: Bytes, pps: Bytes) -> Result<Self, MediaError> {
        if sps.len() < 4 || sps.len() > u16::MAX as usize || pps.len() > u16::MAX as usize {
            return Err(MediaError::InvalidSps);
        }

        let mut buf = BytesMut::with_capacity(11 + sps.len() + pps.len());
        buf.put_u8(1); // configurationVersion
        buf.put_u8(sps[1]);
        buf.put_u8(sps[2]);
        buf.put_u8(sps[3]);
        buf.put_u8(0xFC | 3); // lengthSizeMinusOne = 3
        buf.put_u8(0xE0 | 1); // one SPS
        buf.put_u16(sps.len() as u16);
        buf.put_slice(&sps);
        buf.put_u8(1); // one PPS
        buf.put_u16(pps.len() as u16);
        buf.put_slice(&pps);

        Ok(AvcConfig {
            profile: sps[1],
            compatibility: sps[2],
            level: sps[3],
            sps: vec![sps],
            pps: vec![pps],
            raw: buf.freeze(),
        })
    }

    /// Get profile name
    pub fn profile_name(&self) -> &'static str {
        match self.profile {
            66 => "Baseline",
            77 => "Main",
            88 => "Extended",
            100 => "High",
            110 => "High 10",
            122 => "High 4:2:2",
            244 => "High 4:4:4",
            _ => "Unknown",
        }
    }

    /// Get level as string (e.g., "3.1")
    pub fn level_string(&self) -> String {
        format!("{}.{}", self.level / 10, self.level % 10)
    }

    /// RFC 6381 codec string, e.g. `avc1.42c01e`
    pub fn codec_string(&self) -> String {
        format!(
            "avc1.{:02x}{:02x}{:02x}",
            self.profile, self.compatibility, self.level
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Baseline profile, level 3.0, 640x480, no VUI
    pub(crate) const SPS_640X480: &[u8] = &[0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x02, 0x80, 0xF6, 0x40];
    pub(crate) const PPS: &[u8] = &[0x68, 0xCE, 0x3C, 0x80];
    pub(crate) const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x21, 0xA0];
    pub(crate) const NON_IDR: &[u8] = &[0x41, 0x9A, 0x02, 0x14];

    /// Join units with 4-byte start codes
    pub(crate) fn annex_b(units: &[&[u8]]) -> Bytes {
        let mut buf = BytesMut::new();
        for unit in units {
            buf.put_slice(&[0, 0, 0, 1]);
            buf.put_slice(unit);
        }
        buf.freeze()
    }

    /// Split AVC sample data into its length-prefixed units
    pub(crate) fn length_prefixed(mut data: &[u8]) -> Vec<&[u8]> {
        let mut units = Vec::new();
        while data.len() >= 4 {
            let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
            if data.len() < 4 + len {
                break;
            }
            units.push(&data[4..4 + len]);
            data = &data[4 + len..];
        }
        units
    }

    /// SPS and PPS lists of an AVCDecoderConfigurationRecord
    pub(crate) fn avcc_parameter_sets(record: &[u8]) -> (Vec<&[u8]>, Vec<&[u8]>) {
        fn take<'a>(data: &mut &'a [u8], count: usize) -> Vec<&'a [u8]> {
            (0..count)
                .map(|_| {
                    let bytes: &'a [u8] = data;
                    let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
                    *data = &bytes[2 + len..];
                    &bytes[2..2 + len]
                })
                .collect()
        }

        assert_eq!(record[0], 1, "configurationVersion");
        let mut rest = &record[6..];
        let sps = take(&mut rest, (record[5] & 0x1F) as usize);
        let num_pps = rest[0] as usize;
        rest = &rest[1..];
        let pps = take(&mut rest, num_pps);
        (sps, pps)
    }

    struct BitWriter {
        bytes: Vec<u8>,
        bits: usize,
    }

    impl BitWriter {
        fn new() -> Self {
            Self {
                bytes: Vec::new(),
                bits: 0,
            }
        }

        fn bit(&mut self, b: bool) {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if b {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 1 << (7 - (self.bits % 8));
            }
            self.bits += 1;
        }

        fn bits(&mut self, value: u32, n: u32) {
            for i in (0..n).rev() {
                self.bit((value >> i) & 1 == 1);
            }
        }

        fn ue(&mut self, value: u32) {
            let v = value + 1;
            let len = 32 - v.leading_zeros();
            self.bits(0, len - 1);
            self.bits(v, len);
        }

        fn finish(mut self) -> Vec<u8> {
            self.bit(true);
            self.bytes
        }
    }

    /// High profile 1920x1080 (1088 coded rows cropped by 8)
    fn sps_1080p() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.bits(100, 8); // profile_idc
        w.bits(0, 8); // constraint flags
        w.bits(40, 8); // level_idc
        w.ue(0); // sps id
        w.ue(1); // chroma_format_idc 4:2:0
        w.ue(0); // bit_depth_luma_minus8
        w.ue(0); // bit_depth_chroma_minus8
        w.bit(false); // qpprime
        w.bit(false); // seq_scaling_matrix_present
        w.ue(0); // log2_max_frame_num_minus4
        w.ue(0); // pic_order_cnt_type
        w.ue(2); // log2_max_pic_order_cnt_lsb_minus4
        w.ue(4); // max_num_ref_frames
        w.bit(false); // gaps
        w.ue(119); // pic_width_in_mbs_minus1
        w.ue(67); // pic_height_in_map_units_minus1
        w.bit(true); // frame_mbs_only
        w.bit(true); // direct_8x8
        w.bit(true); // frame_cropping_flag
        w.ue(0);
        w.ue(0);
        w.ue(0);
        w.ue(4); // bottom crop in 2-row units
        w.bit(false); // vui
        let mut nal = vec![0x67];
        nal.extend(w.finish());
        nal
    }

    #[test]
    fn test_nalu_type() {
        assert_eq!(NaluType::from_byte(0x65), Some(NaluType::Idr));
        assert_eq!(NaluType::from_byte(0x67), Some(NaluType::Sps));
        assert_eq!(NaluType::from_byte(0x68), Some(NaluType::Pps));
        assert_eq!(NaluType::from_byte(0x41), Some(NaluType::Slice));
        assert_eq!(NaluType::from_byte(0x09), Some(NaluType::Aud));
        assert_eq!(NaluType::from_byte(0x06), Some(NaluType::Sei));
        assert_eq!(NaluType::from_byte(0x18), None);
    }

    #[test]
    fn test_nalu_type_predicates() {
        assert!(NaluType::Idr.is_keyframe());
        assert!(!NaluType::Slice.is_keyframe());
        assert!(NaluType::Idr.is_slice());
        assert!(NaluType::Slice.is_slice());
        assert!(!NaluType::Sei.is_slice());
        assert!(!NaluType::SlicePartA.is_slice());
    }

    #[test]
    fn test_extract_four_byte_start_codes() {
        let data = annex_b(&[SPS_640X480, PPS, IDR]);
        let units = extract_nal_units(&data);

        assert_eq!(units.len(), 3);
        assert_eq!(units[0].data().as_ref(), SPS_640X480);
        assert_eq!(units[1].data().as_ref(), PPS);
        assert_eq!(units[2].data().as_ref(), IDR);
        assert_eq!(units[2].nalu_type(), Some(NaluType::Idr));
    }

    #[test]
    fn test_extract_mixed_start_codes() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0, 0, 1]);
        buf.put_slice(PPS);
        buf.put_slice(&[0, 0, 0, 1]);
        buf.put_slice(NON_IDR);
        buf.put_slice(&[0, 0, 1]);
        buf.put_slice(IDR);

        let units = extract_nal_units(&buf.freeze());
        let types: Vec<_> = units.iter().map(|u| u.nalu_type()).collect();
        assert_eq!(
            types,
            vec![Some(NaluType::Pps), Some(NaluType::Slice), Some(NaluType::Idr)]
        );
    }

    #[test]
    fn test_extract_without_leading_marker() {
        let mut buf = BytesMut::new();
        buf.put_slice(NON_IDR);
        buf.put_slice(&[0, 0, 0, 1]);
        buf.put_slice(IDR);

        let units = extract_nal_units(&buf.freeze());
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].data().as_ref(), NON_IDR);
        assert_eq!(units[1].data().as_ref(), IDR);
    }

    #[test]
    fn test_extract_empty_and_marker_only() {
        assert!(extract_nal_units(&Bytes::new()).is_empty());
        assert!(extract_nal_units(&Bytes::from_static(&[0, 0, 0, 1])).is_empty());
        assert!(extract_nal_units(&Bytes::from_static(&[0, 0, 1, 0, 0, 1])).is_empty());
    }

    #[test]
    fn test_extract_reconstructs_unit_content() {
        let originals: Vec<&[u8]> = vec![SPS_640X480, PPS, IDR, NON_IDR, NON_IDR, IDR];
        let data = annex_b(&originals);

        let units = extract_nal_units(&data);
        let joined: Vec<u8> = units.iter().flat_map(|u| u.data().to_vec()).collect();
        let expected: Vec<u8> = originals.concat();
        assert_eq!(joined, expected);
    }

    #[test]
    fn test_extract_keeps_zero_bytes_at_buffer_end() {
        let tail: &[u8] = &[0x41, 0x9A, 0x00, 0x00];
        let data = annex_b(&[IDR, tail]);

        let units = extract_nal_units(&data);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].data().as_ref(), tail);
    }

    #[test]
    fn test_extract_strips_trailing_zero_bytes_before_start_code() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0, 0, 1]);
        buf.put_slice(IDR);
        buf.put_slice(&[0, 0, 0, 0, 0, 1]);
        buf.put_slice(NON_IDR);

        let units = extract_nal_units(&buf.freeze());
        assert_eq!(units[0].data().as_ref(), IDR);
        assert_eq!(units[1].data().as_ref(), NON_IDR);
    }

    #[test]
    fn test_extract_is_zero_copy() {
        let data = annex_b(&[IDR]);
        let units = extract_nal_units(&data);
        assert_eq!(units[0].data().as_ptr(), data[4..].as_ptr());
    }

    #[test]
    fn test_group_access_units() {
        let data = annex_b(&[SPS_640X480, PPS, IDR, NON_IDR, &[0x06, 0x05, 0x01], NON_IDR]);
        let groups = group_access_units(extract_nal_units(&data));

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].units.len(), 3);
        assert!(groups[0].is_keyframe());
        assert!(groups[0].has_slice());
        assert_eq!(groups[1].units.len(), 1);
        assert!(!groups[1].is_keyframe());
        assert_eq!(groups[2].units.len(), 2);
        assert_eq!(groups[2].units[0].nalu_type(), Some(NaluType::Sei));
    }

    #[test]
    fn test_group_keeps_trailing_units() {
        let data = annex_b(&[IDR, SPS_640X480, PPS]);
        let groups = group_access_units(extract_nal_units(&data));

        assert_eq!(groups.len(), 2);
        assert!(groups[0].has_slice());
        assert!(!groups[1].has_slice());
        assert_eq!(groups[1].units.len(), 2);
    }

    #[test]
    fn test_sps_parse_baseline() {
        let sps = SpsInfo::parse(SPS_640X480).unwrap();
        assert_eq!(sps.profile, 66);
        assert_eq!(sps.compatibility, 0xC0);
        assert_eq!(sps.level, 30);
        assert_eq!(sps.width, 640);
        assert_eq!(sps.height, 480);
    }

    #[test]
    fn test_sps_parse_high_profile_with_cropping() {
        let nal = sps_1080p();
        let sps = SpsInfo::parse(&nal).unwrap();
        assert_eq!(sps.profile, 100);
        assert_eq!(sps.level, 40);
        assert_eq!(sps.width, 1920);
        assert_eq!(sps.height, 1080);
    }

    #[test]
    fn test_sps_parse_rejects_bad_input() {
        assert_eq!(SpsInfo::parse(&[0x67, 0x42]), Err(MediaError::InvalidSps));
        assert_eq!(SpsInfo::parse(PPS), Err(MediaError::InvalidSps));
        // Truncated after the level byte
        assert!(SpsInfo::parse(&[0x67, 0x42, 0xC0, 0x1E, 0x00]).is_err());
    }

    /// Baseline SPS with caller-chosen size fields
    pub(crate) fn sps_with_size(
        width_in_mbs_minus1: u32,
        height_in_map_units_minus1: u32,
    ) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.bits(66, 8);
        w.bits(0xC0, 8);
        w.bits(30, 8);
        w.ue(0); // sps id
        w.ue(0); // log2_max_frame_num_minus4
        w.ue(0); // pic_order_cnt_type
        w.ue(0); // log2_max_pic_order_cnt_lsb_minus4
        w.ue(1); // max_num_ref_frames
        w.bit(false);
        w.ue(width_in_mbs_minus1);
        w.ue(height_in_map_units_minus1);
        w.bit(true); // frame_mbs_only
        w.bit(true);
        w.bit(false); // no cropping
        w.bit(false); // vui
        let mut nal = vec![0x67];
        nal.extend(w.finish());
        nal
    }

    #[test]
    fn test_sps_parse_rejects_oversized_picture() {
        assert_eq!(
            SpsInfo::parse(&sps_with_size((1 << 29) - 2, 29)),
            Err(MediaError::InvalidSps)
        );
        assert_eq!(
            SpsInfo::parse(&sps_with_size(39, u32::MAX - 1)),
            Err(MediaError::InvalidSps)
        );

        let sps = SpsInfo::parse(&sps_with_size(39, 29)).unwrap();
        assert_eq!((sps.width, sps.height), (640, 480));
    }

    #[test]
    fn test_sps_parse_rejects_overflowing_crop() {
        let mut w = BitWriter::new();
        w.bits(66, 8);
        w.bits(0, 8);
        w.bits(30, 8);
        w.ue(0);
        w.ue(0);
        w.ue(0);
        w.ue(0);
        w.ue(1);
        w.bit(false);
        w.ue(39);
        w.ue(29);
        w.bit(true);
        w.bit(true);
        w.bit(true); // frame_cropping_flag
        w.ue(u32::MAX - 1);
        w.ue(u32::MAX - 1);
        w.ue(0);
        w.ue(0);
        w.bit(false);
        let mut nal = vec![0x67];
        nal.extend(w.finish());

        assert_eq!(SpsInfo::parse(&nal), Err(MediaError::InvalidSps));
    }

    #[test]
    fn test_sps_parse_survives_extreme_scaling_deltas() {
        let mut w = BitWriter::new();
        w.bits(100, 8);
        w.bits(0, 8);
        w.bits(40, 8);
        w.ue(0); // sps id
        w.ue(1); // chroma_format_idc
        w.ue(0);
        w.ue(0);
        w.bit(false);
        w.bit(true); // seq_scaling_matrix_present
        w.bit(true); // first list present
        w.ue(u32::MAX - 2); // delta_scale = 2^31 - 1
        w.ue(u32::MAX - 1); // delta_scale = -(2^31 - 1)

        let mut nal = vec![0x67];
        nal.extend(w.finish());
        assert!(SpsInfo::parse(&nal).is_err());
    }

    #[test]
    fn test_strip_emulation_prevention() {
        assert_eq!(
            strip_emulation_prevention(&[0x11, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03]),
            vec![0x11, 0x00, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(strip_emulation_prevention(&[0x00, 0x03]), vec![0x00, 0x03]);
    }

    #[test]
    fn test_avc_config_from_parameter_sets() {
        let config = AvcConfig::from_parameter_sets(
            Bytes::from_static(SPS_640X480),
            Bytes::from_static(PPS),
        )
        .unwrap();

        assert_eq!(config.profile, 66);
        assert_eq!(config.level, 30);
        assert_eq!(config.profile_name(), "Baseline");
        assert_eq!(config.level_string(), "3.0");
        assert_eq!(config.codec_string(), "avc1.42c01e");
        assert_eq!(&config.raw[..6], &[0x01, 0x42, 0xC0, 0x1E, 0xFF, 0xE1]);
        assert_eq!(config.raw.len(), 11 + SPS_640X480.len() + PPS.len());

        let (sps, pps) = avcc_parameter_sets(&config.raw);
        assert_eq!(config.raw[4] & 0x03, 3); // 4-byte lengths
        assert_eq!(sps, vec![SPS_640X480]);
        assert_eq!(pps, vec![PPS]);
    }

    #[test]
    fn test_avc_config_invalid() {
        assert!(AvcConfig::from_parameter_sets(Bytes::from_static(&[0x67]), Bytes::new()).is_err());
        let oversized = Bytes::from(vec![0x67; u16::MAX as usize + 1]);
        assert!(AvcConfig::from_parameter_sets(oversized, Bytes::from_static(PPS)).is_err());
    }

    #[test]
    fn test_prefixed_write() {
        let unit = NalUnit::new(Bytes::from_static(IDR));
        let mut buf = BytesMut::new();
        unit.write_prefixed(&mut buf);

        assert_eq!(buf.len(), unit.prefixed_len());
        assert_eq!(length_prefixed(&buf), vec![IDR]);
    }

    #[test]
    fn test_length_prefixed_stops_at_truncated_unit() {
        let data: &[u8] = &[0x00, 0x00, 0x00, 0x0A, 0x67, 0x64, 0x00];
        assert!(length_prefixed(data).is_empty());
    }
}
