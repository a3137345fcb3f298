//! Fragmented ISO-BMFF serialization
//!
//! ```text
//! Initialization segment:
//!   ftyp
//!   moov { mvhd, trak*, mvex { trex* } }
//!
//! Media segment (one per track and flush):
//!   moof { mfhd, traf { tfhd, tfdt, trun } }
//!   mdat
//! ```
//!
//! Every box is written with a size placeholder that is patched once its
//! children are in place. All fields are big-endian.

pub mod fragment;
pub mod init;

use bytes::{BufMut, BytesMut};

pub use fragment::{media_segment, write_mdat, write_moof};
pub use init::init_segment;

/// Movie duration declared in `mvhd`/`tkhd`/`mdhd`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieDuration {
    /// Live stream, length not known
    Unknown,
    /// Fixed duration in movie timescale ticks
    Fixed(u32),
}

impl MovieDuration {
    /// Placeholder duration declared outside streaming mode
    pub const PLACEHOLDER: MovieDuration = MovieDuration::Fixed(1000);

    pub fn for_mode(streaming: bool) -> Self {
        if streaming {
            MovieDuration::Unknown
        } else {
            MovieDuration::PLACEHOLDER
        }
    }

    pub fn ticks(&self) -> u32 {
        match self {
            MovieDuration::Unknown => u32::MAX,
            MovieDuration::Fixed(ticks) => *ticks,
        }
    }
}

/// Write a box, filling in its size after `body` ran
pub(crate) fn write_box<F>(buf: &mut BytesMut, kind: &[u8; 4], body: F)
where
    F: FnOnce(&mut BytesMut),
{
    let start = buf.len();
    buf.put_u32(0);
    buf.put_slice(kind);
    body(buf);
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

/// Write a full box (version + 24-bit flags header)
pub(crate) fn write_full_box<F>(
    buf: &mut BytesMut,
    kind: &[u8; 4],
    version: u8,
    flags: u32,
    body: F,
) where
    F: FnOnce(&mut BytesMut),
{
    write_box(buf, kind, |buf| {
        buf.put_u32(((version as u32) << 24) | (flags & 0x00FF_FFFF));
        body(buf);
    });
}

/// Unity transformation matrix used by `mvhd` and `tkhd`
pub(crate) fn write_unity_matrix(buf: &mut BytesMut) {
    for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        buf.put_u32(value);
    }
}

/// Walk the boxes of a buffer, yielding `(type, body)` pairs
#[cfg(test)]
pub(crate) fn boxes(data: &[u8]) -> Vec<([u8; 4], &[u8])> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset + 8 <= data.len() {
        let size = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        assert!(size >= 8 && offset + size <= data.len(), "bad box size");
        let mut kind = [0u8; 4];
        kind.copy_from_slice(&data[offset + 4..offset + 8]);
        out.push((kind, &data[offset + 8..offset + size]));
        offset += size;
    }
    assert_eq!(offset, data.len(), "trailing bytes after last box");
    out
}

/// Find a box by path (e.g. `[b"moov", b"trak", b"mdia"]`), returning its body
#[cfg(test)]
pub(crate) fn find_box<'a>(data: &'a [u8], path: &[&[u8; 4]]) -> Option<&'a [u8]> {
    let (first, rest) = path.split_first()?;
    let body = boxes(data)
        .into_iter()
        .find(|(kind, _)| kind == *first)
        .map(|(_, body)| body)?;
    if rest.is_empty() {
        Some(body)
    } else {
        find_box(body, rest)
    }
}
