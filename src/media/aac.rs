//! AAC audio parsing
//!
//! Audio arrives as an ADTS stream: every raw AAC frame is preceded by a
//! 7-byte header (9 bytes when a CRC is present).
//!
//! ADTS header:
//! ```text
//! syncword (12) | ID (1) | layer (2) | protection_absent (1)
//! | profile (2) | sampling_frequency_index (4) | private (1)
//! | channel_configuration (3) | original (1) | home (1)
//! | copyright_id_bit (1) | copyright_id_start (1)
//! | aac_frame_length (13) | buffer_fullness (11) | raw_data_blocks (2)
//! ```
//!
//! fMP4 stores the raw frames and carries the codec parameters once, as an
//! AudioSpecificConfig inside the `esds` box.

use bytes::Bytes;

use crate::error::MediaError;

/// AAC profile (audio object type)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    /// AAC Main
    Main = 1,
    /// AAC LC (Low Complexity) - most common
    Lc = 2,
    /// AAC SSR (Scalable Sample Rate)
    Ssr = 3,
    /// AAC LTP (Long Term Prediction)
    Ltp = 4,
    /// SBR (Spectral Band Replication) - HE-AAC
    Sbr = 5,
    /// AAC Scalable
    Scalable = 6,
}

impl AacProfile {
    pub fn from_object_type(ot: u8) -> Option<Self> {
        match ot {
            1 => Some(AacProfile::Main),
            2 => Some(AacProfile::Lc),
            3 => Some(AacProfile::Ssr),
            4 => Some(AacProfile::Ltp),
            5 => Some(AacProfile::Sbr),
            6 => Some(AacProfile::Scalable),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AacProfile::Main => "AAC Main",
            AacProfile::Lc => "AAC LC",
            AacProfile::Ssr => "AAC SSR",
            AacProfile::Ltp => "AAC LTP",
            AacProfile::Sbr => "HE-AAC",
            AacProfile::Scalable => "AAC Scalable",
        }
    }
}

/// Standard sampling frequencies by index
const SAMPLING_FREQUENCIES: [u32; 16] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350, 0, 0,
    0,
];

/// Fixed part of an ADTS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// ADTS profile (audio object type minus one)
    pub profile: u8,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
    /// Total frame length, header included
    pub frame_length: usize,
    /// 7, or 9 when a CRC follows the header
    pub header_length: usize,
}

impl AdtsHeader {
    /// Parse the header at the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self, MediaError> {
        if data.len() < 7 || data[0] != 0xFF || data[1] & 0xF6 != 0xF0 {
            return Err(MediaError::InvalidAdtsHeader);
        }

        let protection_absent = data[1] & 0x01 != 0;
        let profile = data[2] >> 6;
        let sampling_frequency_index = (data[2] >> 2) & 0x0F;
        let channel_configuration = ((data[2] & 0x01) << 2) | (data[3] >> 6);
        let frame_length = (((data[3] & 0x03) as usize) << 11)
            | ((data[4] as usize) << 3)
            | ((data[5] as usize) >> 5);
        let header_length = if protection_absent { 7 } else { 9 };

        if SAMPLING_FREQUENCIES[sampling_frequency_index as usize] == 0
            || frame_length < header_length
        {
            return Err(MediaError::InvalidAdtsHeader);
        }

        Ok(AdtsHeader {
            profile,
            sampling_frequency_index,
            channel_configuration,
            frame_length,
            header_length,
        })
    }

    pub fn sampling_frequency(&self) -> u32 {
        SAMPLING_FREQUENCIES[self.sampling_frequency_index as usize]
    }
}

/// A raw AAC frame (ADTS header removed) with the header it came with
#[derive(Debug, Clone)]
pub struct AacFrame {
    pub header: AdtsHeader,
    pub data: Bytes,
}

/// Split an ADTS buffer into raw AAC frames.
///
/// A bad sync word skips one byte and rescans. A frame running past the end
/// of the buffer is dropped.
pub fn extract_aac_frames(data: &Bytes) -> Vec<AacFrame> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset + 7 <= data.len() {
        let header = match AdtsHeader::parse(&data[offset..]) {
            Ok(header) => header,
            Err(_) => {
                offset += 1;
                continue;
            }
        };

        if offset + header.frame_length > data.len() {
            tracing::trace!(
                offset = offset,
                frame_length = header.frame_length,
                available = data.len() - offset,
                "Dropping truncated ADTS frame"
            );
            break;
        }

        let payload = data.slice(offset + header.header_length..offset + header.frame_length);
        if !payload.is_empty() {
            frames.push(AacFrame {
                header,
                data: payload,
            });
        }
        offset += header.frame_length;
    }

    frames
}

/// AudioSpecificConfig (the `esds` decoder-specific info)
#[derive(Debug, Clone)]
pub struct AudioSpecificConfig {
    /// Audio object type (profile)
    pub audio_object_type: u8,
    /// Sampling frequency index
    pub sampling_frequency_index: u8,
    /// Sampling frequency in Hz
    pub sampling_frequency: u32,
    /// Channel configuration (1=mono, 2=stereo, etc.)
    pub channel_configuration: u8,
    /// Frame length flag (960 or 1024 samples)
    pub frame_length_flag: bool,
    /// Depends on core coder flag
    pub depends_on_core_coder: bool,
    /// Extension flag
    pub extension_flag: bool,
    /// Raw config bytes
    pub raw: Bytes,
}

impl AudioSpecificConfig {
    /// Derive the config carried by an ADTS header
    pub fn from_adts(header: &AdtsHeader) -> Result<Self, MediaError> {
        let object_type = header.profile + 1;
        let raw = [
            (object_type << 3) | (header.sampling_frequency_index >> 1),
            ((header.sampling_frequency_index & 0x01) << 7) | (header.channel_configuration << 3),
        ];
        Self::parse(Bytes::copy_from_slice(&raw))
    }

    /// Parse from AudioSpecificConfig bytes
    pub fn parse(data: Bytes) -> Result<Self, MediaError> {
        if data.len() < 2 {
            return Err(MediaError::InvalidAudioConfig);
        }

        // audioObjectType: 5 bits
        // samplingFrequencyIndex: 4 bits
        // if (samplingFrequencyIndex == 0xf) samplingFrequency: 24 bits
        // channelConfiguration: 4 bits

        let b0 = data[0];
        let b1 = data[1];

        let audio_object_type = (b0 >> 3) & 0x1F;
        let sampling_frequency_index = ((b0 & 0x07) << 1) | ((b1 >> 7) & 0x01);

        let sampling_frequency = if sampling_frequency_index == 0x0F {
            // Explicit frequency in next 24 bits
            if data.len() < 5 {
                return Err(MediaError::InvalidAudioConfig);
            }
            let f0 = (data[1] & 0x7F) as u32;
            let f1 = data[2] as u32;
            let f2 = data[3] as u32;
            let f3 = (data[4] >> 1) as u32;
            (f0 << 17) | (f1 << 9) | (f2 << 1) | f3
        } else {
            match SAMPLING_FREQUENCIES[sampling_frequency_index as usize] {
                0 => return Err(MediaError::InvalidAudioConfig),
                freq => freq,
            }
        };

        let channel_configuration = (b1 >> 3) & 0x0F;
        let frame_length_flag = (b1 & 0x04) != 0;
        let depends_on_core_coder = (b1 & 0x02) != 0;
        let extension_flag = (b1 & 0x01) != 0;

        Ok(AudioSpecificConfig {
            audio_object_type,
            sampling_frequency_index,
            sampling_frequency,
            channel_configuration,
            frame_length_flag,
            depends_on_core_coder,
            extension_flag,
            raw: data,
        })
    }

    /// Get the profile
    pub fn profile(&self) -> Option<AacProfile> {
        AacProfile::from_object_type(self.audio_object_type)
    }

    /// Get channel count
    pub fn channels(&self) -> u8 {
        match self.channel_configuration {
            0 => 0, // Defined in stream
            1 => 1, // Mono
            2 => 2, // Stereo
            3 => 3, // 3.0
            4 => 4, // 4.0
            5 => 5, // 5.0
            6 => 6, // 5.1
            7 => 8, // 7.1
            _ => 0,
        }
    }

    /// RFC 6381 codec string, e.g. `mp4a.40.2`
    pub fn codec_string(&self) -> String {
        format!("mp4a.40.{}", self.audio_object_type)
    }
}

/// Generate ADTS header for a raw AAC frame
///
/// This is useful when writing AAC to a file that requires ADTS headers.
pub fn generate_adts_header(config: &AudioSpecificConfig, frame_length: usize) -> [u8; 7] {
    let profile = config.audio_object_type.saturating_sub(1); // ADTS uses profile - 1
    let freq_idx = config.sampling_frequency_index;
    let channels = config.channel_configuration;

    // ADTS header is 7 bytes (without CRC)
    let frame_len = frame_length + 7;

    let mut header = [0u8; 7];

    // Syncword (12 bits) + ID (1 bit) + Layer (2 bits) + Protection (1 bit)
    header[0] = 0xFF;
    header[1] = 0xF1; // MPEG-4, Layer 0, no CRC

    // Profile (2 bits) + Freq (4 bits) + Private (1 bit) + Channels (1 bit)
    header[2] = ((profile & 0x03) << 6) | ((freq_idx & 0x0F) << 2) | ((channels >> 2) & 0x01);

    // Channels (2 bits) + Original (1 bit) + Home (1 bit) + Copyright (2 bits) + Length (2 bits)
    header[3] = ((channels & 0x03) << 6) | ((frame_len >> 11) & 0x03) as u8;

    // Length (8 bits)
    header[4] = ((frame_len >> 3) & 0xFF) as u8;

    // Length (3 bits) + Buffer fullness (5 bits)
    header[5] = (((frame_len & 0x07) << 5) | 0x1F) as u8;

    // Buffer fullness (6 bits) + Number of frames (2 bits)
    header[6] = 0xFC;

    header
}
