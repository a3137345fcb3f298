//! Initialization segment (`ftyp` + `moov`)

use bytes::{BufMut, Bytes, BytesMut};

use super::{write_box, write_full_box, write_unity_matrix, MovieDuration};
use crate::media::aac::AudioSpecificConfig;
use crate::media::h264::AvcConfig;
use crate::remux::{CodecConfig, TrackInfo, TrackKind, TIMESCALE};

/// ISO-639-2/T "und", packed as three 5-bit letters
const LANGUAGE_UNDETERMINED: u16 = 0x55C4;

/// Render the initialization segment describing `tracks`
pub fn init_segment(tracks: &[TrackInfo], duration: MovieDuration) -> Bytes {
    let mut buf = BytesMut::with_capacity(1024);
    write_ftyp(&mut buf);
    write_moov(&mut buf, tracks, duration);
    buf.freeze()
}

fn write_ftyp(buf: &mut BytesMut) {
    write_box(buf, b"ftyp", |buf| {
        buf.put_slice(b"isom"); // major brand
        buf.put_u32(1); // minor version
        for brand in [b"isom", b"avc1", b"mp42"] {
            buf.put_slice(brand);
        }
    });
}

fn write_moov(buf: &mut BytesMut, tracks: &[TrackInfo], duration: MovieDuration) {
    write_box(buf, b"moov", |buf| {
        write_mvhd(buf, duration);
        for track in tracks {
            write_trak(buf, track, duration);
        }
        write_box(buf, b"mvex", |buf| {
            for track in tracks {
                write_trex(buf, track.id);
            }
        });
    });
}

fn write_mvhd(buf: &mut BytesMut, duration: MovieDuration) {
    write_full_box(buf, b"mvhd", 0, 0, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(TIMESCALE);
        buf.put_u32(duration.ticks());
        buf.put_u32(0x0001_0000); // rate 1.0
        buf.put_u16(0x0100); // volume 1.0
        buf.put_bytes(0, 10); // reserved
        write_unity_matrix(buf);
        buf.put_bytes(0, 24); // pre_defined
        buf.put_u32(0xFFFF_FFFF); // next_track_ID
    });
}

fn write_trak(buf: &mut BytesMut, track: &TrackInfo, duration: MovieDuration) {
    write_box(buf, b"trak", |buf| {
        write_tkhd(buf, track, duration);
        write_box(buf, b"mdia", |buf| {
            write_mdhd(buf, track.timescale, duration);
            write_hdlr(buf, track.kind);
            write_minf(buf, track);
        });
    });
}

fn write_tkhd(buf: &mut BytesMut, track: &TrackInfo, duration: MovieDuration) {
    let (width, height) = match &track.codec {
        CodecConfig::Avc { width, height, .. } => (*width, *height),
        CodecConfig::Aac { .. } => (0, 0),
    };

    // enabled | in_movie | in_preview
    write_full_box(buf, b"tkhd", 0, 0x000007, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(track.id);
        buf.put_u32(0); // reserved
        buf.put_u32(duration.ticks());
        buf.put_bytes(0, 8); // reserved
        buf.put_u16(0); // layer
        buf.put_u16(0); // alternate_group
        buf.put_u16(if track.kind == TrackKind::Audio { 0x0100 } else { 0 });
        buf.put_u16(0); // reserved
        write_unity_matrix(buf);
        buf.put_u32(width << 16); // 16.16 fixed point
        buf.put_u32(height << 16);
    });
}

fn write_mdhd(buf: &mut BytesMut, timescale: u32, duration: MovieDuration) {
    write_full_box(buf, b"mdhd", 0, 0, |buf| {
        buf.put_u32(0); // creation_time
        buf.put_u32(0); // modification_time
        buf.put_u32(timescale);
        buf.put_u32(duration.ticks());
        buf.put_u16(LANGUAGE_UNDETERMINED);
        buf.put_u16(0); // pre_defined
    });
}

fn write_hdlr(buf: &mut BytesMut, kind: TrackKind) {
    let name: &[u8] = match kind {
        TrackKind::Video => b"VideoHandler\0",
        TrackKind::Audio => b"SoundHandler\0",
    };
    write_full_box(buf, b"hdlr", 0, 0, |buf| {
        buf.put_u32(0); // pre_defined
        buf.put_slice(kind.handler_type());
        buf.put_bytes(0, 12); // reserved
        buf.put_slice(name);
    });
}

fn write_minf(buf: &mut BytesMut, track: &TrackInfo) {
    write_box(buf, b"minf", |buf| {
        match track.kind {
            TrackKind::Video => write_full_box(buf, b"vmhd", 0, 1, |buf| {
                buf.put_u16(0); // graphicsmode
                buf.put_bytes(0, 6); // opcolor
            }),
            TrackKind::Audio => write_full_box(buf, b"smhd", 0, 0, |buf| {
                buf.put_u16(0); // balance
                buf.put_u16(0); // reserved
            }),
        }
        write_box(buf, b"dinf", |buf| {
            write_full_box(buf, b"dref", 0, 0, |buf| {
                buf.put_u32(1); // entry_count
                write_full_box(buf, b"url ", 0, 1, |_| {}); // self-contained
            });
        });
        write_stbl(buf, track);
    });
}

fn write_stbl(buf: &mut BytesMut, track: &TrackInfo) {
    write_box(buf, b"stbl", |buf| {
        write_full_box(buf, b"stsd", 0, 0, |buf| {
            buf.put_u32(1); // entry_count
            match &track.codec {
                CodecConfig::Avc {
                    config,
                    width,
                    height,
                } => write_avc1(buf, config, *width, *height),
                CodecConfig::Aac { config } => write_mp4a(buf, config),
            }
        });
        // Samples live in the fragments, so the tables stay empty
        write_full_box(buf, b"stts", 0, 0, |buf| buf.put_u32(0));
        write_full_box(buf, b"stsc", 0, 0, |buf| buf.put_u32(0));
        write_full_box(buf, b"stsz", 0, 0, |buf| {
            buf.put_u32(0); // sample_size
            buf.put_u32(0); // sample_count
        });
        write_full_box(buf, b"stco", 0, 0, |buf| buf.put_u32(0));
    });
}

fn write_avc1(buf: &mut BytesMut, config: &AvcConfig, width: u32, height: u32) {
    write_box(buf, b"avc1", |buf| {
        buf.put_bytes(0, 6); // reserved
        buf.put_u16(1); // data_reference_index
        buf.put_u16(0); // pre_defined
        buf.put_u16(0); // reserved
        buf.put_bytes(0, 12); // pre_defined
        buf.put_u16(width as u16);
        buf.put_u16(height as u16);
        buf.put_u32(0x0048_0000); // horizresolution 72 dpi
        buf.put_u32(0x0048_0000); // vertresolution 72 dpi
        buf.put_u32(0); // reserved
        buf.put_u16(1); // frame_count
        buf.put_bytes(0, 32); // compressorname
        buf.put_u16(0x0018); // depth
        buf.put_i16(-1); // pre_defined
        write_box(buf, b"avcC", |buf| buf.put_slice(&config.raw));
    });
}

fn write_mp4a(buf: &mut BytesMut, config: &AudioSpecificConfig) {
    write_box(buf, b"mp4a", |buf| {
        buf.put_bytes(0, 6); // reserved
        buf.put_u16(1); // data_reference_index
        buf.put_bytes(0, 8); // reserved
        buf.put_u16(config.channels() as u16);
        buf.put_u16(16); // samplesize
        buf.put_u16(0); // pre_defined
        buf.put_u16(0); // reserved
        buf.put_u32(config.sampling_frequency << 16); // 16.16 fixed point
        write_esds(buf, config);
    });
}

/// Elementary stream descriptor wrapping the AudioSpecificConfig
fn write_esds(buf: &mut BytesMut, config: &AudioSpecificConfig) {
    let asc = &config.raw;
    let asc_len = asc.len() as u8;

    write_full_box(buf, b"esds", 0, 0, |buf| {
        buf.put_u8(0x03); // ES_Descriptor
        buf.put_u8(0x17 + asc_len);
        buf.put_u16(1); // ES_ID
        buf.put_u8(0x00); // flags

        buf.put_u8(0x04); // DecoderConfigDescriptor
        buf.put_u8(0x0F + asc_len);
        buf.put_u8(0x40); // objectTypeIndication: MPEG-4 audio
        buf.put_u8(0x15); // streamType audio, upStream 0, reserved 1
        buf.put_bytes(0, 3); // bufferSizeDB
        buf.put_u32(0); // maxBitrate
        buf.put_u32(0); // avgBitrate

        buf.put_u8(0x05); // DecoderSpecificInfo
        buf.put_u8(asc_len);
        buf.put_slice(asc);

        buf.put_u8(0x06); // SLConfigDescriptor
        buf.put_u8(0x01);
        buf.put_u8(0x02);
    });
}

fn write_trex(buf: &mut BytesMut, track_id: u32) {
    write_full_box(buf, b"trex", 0, 0, |buf| {
        buf.put_u32(track_id);
        buf.put_u32(1); // default_sample_description_index
        buf.put_u32(0); // default_sample_duration
        buf.put_u32(0); // default_sample_size
        buf.put_u32(0x0001_0001); // default_sample_flags
    });
}
