//! Media segments (`moof` + `mdat`)

use bytes::{BufMut, Bytes, BytesMut};

use super::{write_box, write_full_box};
use crate::remux::TrackFragment;

/// tfhd: sample offsets are relative to the enclosing moof
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

/// trun: data-offset-present
const TRUN_DATA_OFFSET: u32 = 0x00_0001;
/// trun: sample-duration-present
const TRUN_SAMPLE_DURATION: u32 = 0x00_0100;
/// trun: sample-size-present
const TRUN_SAMPLE_SIZE: u32 = 0x00_0200;
/// trun: sample-flags-present
const TRUN_SAMPLE_FLAGS: u32 = 0x00_0400;

/// Render `moof` + `mdat` for one track fragment
pub fn media_segment(fragment: &TrackFragment<'_>, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 128 + fragment.samples.len() * 12);
    write_moof(&mut buf, fragment);
    write_mdat(&mut buf, payload);
    buf.freeze()
}

/// Write a `moof` whose `trun` data offset points just past the `mdat`
/// header that must follow it.
pub fn write_moof(buf: &mut BytesMut, fragment: &TrackFragment<'_>) {
    let start = buf.len();
    let mut data_offset_pos = 0;

    write_box(buf, b"moof", |buf| {
        write_full_box(buf, b"mfhd", 0, 0, |buf| {
            buf.put_u32(fragment.sequence_number);
        });
        write_box(buf, b"traf", |buf| {
            write_full_box(buf, b"tfhd", 0, TFHD_DEFAULT_BASE_IS_MOOF, |buf| {
                buf.put_u32(fragment.track_id);
            });
            write_full_box(buf, b"tfdt", 1, 0, |buf| {
                buf.put_u64(fragment.base_decode_time);
            });
            let flags =
                TRUN_DATA_OFFSET | TRUN_SAMPLE_DURATION | TRUN_SAMPLE_SIZE | TRUN_SAMPLE_FLAGS;
            write_full_box(buf, b"trun", 0, flags, |buf| {
                buf.put_u32(fragment.samples.len() as u32);
                data_offset_pos = buf.len();
                buf.put_i32(0); // patched below
                for sample in fragment.samples {
                    buf.put_u32(sample.duration);
                    buf.put_u32(sample.size);
                    buf.put_u32(sample.flags.to_u32());
                }
            });
        });
    });

    let moof_len = buf.len() - start;
    let data_offset = (moof_len + 8) as i32;
    buf[data_offset_pos..data_offset_pos + 4].copy_from_slice(&data_offset.to_be_bytes());
}

pub fn write_mdat(buf: &mut BytesMut, payload: &[u8]) {
    write_box(buf, b"mdat", |buf| buf.put_slice(payload));
}
