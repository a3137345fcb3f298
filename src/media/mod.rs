//! Elementary stream parsing
//!
//! This module provides:
//! - H.264 Annex-B NAL unit extraction, access unit grouping, SPS parsing
//! - AAC ADTS frame extraction and AudioSpecificConfig construction
//!
//! Both scanners are stateless: each call sees one chunk and never keeps
//! partial units for the next one.

pub mod aac;
pub mod h264;

pub use aac::{extract_aac_frames, AacFrame, AdtsHeader, AudioSpecificConfig};
pub use h264::{
    extract_nal_units, group_access_units, AccessUnit, AvcConfig, NalUnit, NaluType, SpsInfo,
};
