//! Annex-B to fMP4 - Remuxes a raw H.264 file (optionally with ADTS audio)
//! into a fragmented MP4 file
//!
//! Run with: cargo run --example annexb_to_fmp4 -- <input.h264> [output.mp4] [input.aac]
//!
//! Produce inputs with ffmpeg:
//!   ffmpeg -i input.mp4 -c:v copy -bsf:v h264_mp4toannexb -an -f h264 input.h264
//!   ffmpeg -i input.mp4 -c:a copy -vn -f adts input.aac
//!
//! The input is fed in chunks cut at start codes (ADTS sync words for
//! audio), so no NAL unit or AAC frame spans two chunks. Every segment the
//! remuxer produces is appended to the output file in order.
//!
//! # Output Layout
//!
//! ```text
//! +======+======+======+======+======+======+=====
//! | ftyp | moov | moof | mdat | moof | mdat | ...
//! +======+======+======+======+======+======+=====
//!  init segment  fragment 1    fragment 2
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use fmp4_remux::{Chunk, FlushTask, RemuxConfig, Remuxer, Segment, TrackMode};

/// Pictures (or AAC frames) per fed chunk
const UNITS_PER_CHUNK: usize = 30;

/// Cut an Annex-B stream at the start code following every
/// `UNITS_PER_CHUNK`-th slice, so each chunk ends with a complete picture.
fn split_video(data: &[u8]) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut chunk_start = 0;
    let mut slices = 0;
    let mut i = 0;

    while i + 3 < data.len() {
        if data[i..i + 3] != [0, 0, 1] {
            i += 1;
            continue;
        }
        // Include the leading zero of a 4-byte start code
        let code_start = if i > 0 && data[i - 1] == 0 { i - 1 } else { i };
        if slices >= UNITS_PER_CHUNK && code_start > chunk_start {
            chunks.push(&data[chunk_start..code_start]);
            chunk_start = code_start;
            slices = 0;
        }
        if matches!(data[i + 3] & 0x1F, 1 | 5) {
            slices += 1;
        }
        i += 3;
    }
    if chunk_start < data.len() {
        chunks.push(&data[chunk_start..]);
    }
    chunks
}

/// Cut an ADTS stream every `UNITS_PER_CHUNK` frames, following the
/// frame-length field.
fn split_audio(data: &[u8]) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut chunk_start = 0;
    let mut frames = 0;
    let mut offset = 0;

    while offset + 7 <= data.len() {
        let header = &data[offset..];
        if header[0] != 0xFF || header[1] & 0xF6 != 0xF0 {
            offset += 1;
            continue;
        }
        let frame_length = (((header[3] & 0x03) as usize) << 11)
            | ((header[4] as usize) << 3)
            | ((header[5] >> 5) as usize);
        if frame_length < 7 {
            offset += 1;
            continue;
        }
        offset += frame_length;
        frames += 1;
        if frames == UNITS_PER_CHUNK && offset < data.len() {
            chunks.push(&data[chunk_start..offset]);
            chunk_start = offset;
            frames = 0;
        }
    }
    if chunk_start < data.len() {
        chunks.push(&data[chunk_start..]);
    }
    chunks
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fmp4_remux=info".parse()?)
                .add_directive("annexb_to_fmp4=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .ok_or("usage: annexb_to_fmp4 <input.h264> [output.mp4] [input.aac]")?;
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.with_extension("mp4"));
    let audio_input = args.next().map(PathBuf::from);

    let video = std::fs::read(&input)?;
    let audio = match &audio_input {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };

    let mode = if audio.is_some() {
        TrackMode::Both
    } else {
        TrackMode::Video
    };
    let config = RemuxConfig::with_mode(mode)
        .streaming(false)
        .fps(30)
        .flush_interval(Duration::from_millis(200));

    println!("Annex-B to fMP4");
    println!("===============");
    println!("Input:  {}", input.display());
    if let Some(path) = &audio_input {
        println!("Audio:  {}", path.display());
    }
    println!("Output: {}", output.display());
    println!();

    // Segments flow through a channel to a writer task
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Segment>();
    let remuxer = Remuxer::new(config, tx)?.into_shared();
    let task = FlushTask::spawn(&remuxer, || 0.0_f64);

    let mut writer = BufWriter::new(File::create(&output)?);
    let write_task = tokio::task::spawn_blocking(move || -> std::io::Result<usize> {
        let mut segments = 0;
        while let Some(segment) = rx.blocking_recv() {
            writer.write_all(&segment.payload)?;
            segments += 1;
        }
        writer.flush()?;
        Ok(segments)
    });

    let video_chunks = split_video(&video);
    let audio_chunks = audio
        .as_deref()
        .map(split_audio)
        .unwrap_or_default();

    for i in 0..video_chunks.len().max(audio_chunks.len()) {
        let mut chunk = Chunk::default();
        if let Some(data) = video_chunks.get(i) {
            chunk = chunk.with_video(data.to_vec());
        }
        if let Some(data) = audio_chunks.get(i) {
            chunk = chunk.with_audio(data.to_vec());
        }

        if let Err(e) = remuxer.lock().await.feed(chunk) {
            eprintln!("Skipping chunk {}: {}", i, e);
        }
    }

    let stats = {
        let mut remuxer = remuxer.lock().await;
        let stats = remuxer.stats().clone();
        remuxer.close();
        stats
    };
    task.join(Duration::from_secs(1)).await;

    // Closing the last sender ends the writer loop
    drop(remuxer);
    let segments = write_task.await??;

    println!("Segments written: {}", segments);
    println!(
        "Video: {} samples, {} keyframes, {}x{} {}",
        stats.video_samples,
        stats.keyframes,
        stats.width.unwrap_or(0),
        stats.height.unwrap_or(0),
        stats.video_codec.as_deref().unwrap_or("-"),
    );
    println!(
        "Audio: {} samples {}",
        stats.audio_samples,
        stats.audio_codec.as_deref().unwrap_or("-"),
    );
    println!("Dropped: {}", stats.dropped_samples);
    println!("Bytes:   {}", stats.bytes_emitted);

    Ok(())
}
