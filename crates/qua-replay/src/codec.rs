//! Compact frame encoding.
//!
//! Each frame is 12 bytes: time as little-endian f64, then the key bitmask as
//! little-endian u32. The byte stream is gzip-compressed and base64 (URL-safe)
//! encoded.

use std::fmt::Write as _;
use std::io::{Read, Write};

use anyhow::{Context, Result, ensure};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::frame::InputFrame;

const FRAME_BYTES: usize = 12;

/// Encode frames into a base64(gzip(binary)) string.
pub fn shrink(frames: &[InputFrame]) -> Result<String> {
    let mut raw = Vec::with_capacity(frames.len() * FRAME_BYTES);
    for frame in frames {
        raw.extend_from_slice(&frame.time.to_le_bytes());
        raw.extend_from_slice(&frame.keys.to_le_bytes());
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .context("failed to compress replay frames")?;
    let gzip = encoder
        .finish()
        .context("failed to finish replay frame compression")?;

    Ok(URL_SAFE.encode(gzip))
}

/// Decode a string produced by [`shrink`].
pub fn expand(encoded: &str) -> Result<Vec<InputFrame>> {
    let gzip = URL_SAFE
        .decode(encoded)
        .context("replay frames are not valid base64")?;

    let mut raw = Vec::new();
    GzDecoder::new(&gzip[..])
        .read_to_end(&mut raw)
        .context("failed to decompress replay frames")?;

    ensure!(
        raw.len() % FRAME_BYTES == 0,
        "replay frame data has {} trailing bytes",
        raw.len() % FRAME_BYTES
    );

    let frames = raw
        .chunks_exact(FRAME_BYTES)
        .map(|chunk| {
            let mut time = [0u8; 8];
            let mut keys = [0u8; 4];
            time.copy_from_slice(&chunk[..8]);
            keys.copy_from_slice(&chunk[8..]);
            InputFrame::new(f64::from_le_bytes(time), u32::from_le_bytes(keys))
        })
        .collect();
    Ok(frames)
}

/// Human-readable dump, one `time|keys` line per frame with keys in binary
/// (lane 1 rightmost).
pub fn dump_frames(frames: &[InputFrame], key_count: usize) -> String {
    let mut out = String::new();
    for frame in frames {
        let _ = writeln!(
            out,
            "{:.3}|{:0width$b}",
            frame.time,
            frame.keys,
            width = key_count
        );
    }
    out
}
