//! FLAC decoding into [`AudioClip`].
//!
//! Integer samples of any bit depth are scaled to `[-1, 1]` by their
//! full-scale value, matching [`decode_wav`](super::decode_wav).

use std::path::Path;

use super::{AudioClip, DecodeError};

/// Decode a FLAC file.
pub fn decode_flac(path: &Path) -> Result<AudioClip, DecodeError> {
    let wrap = |source| DecodeError::Flac {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = claxon::FlacReader::open(path).map_err(wrap)?;
    let info = reader.streaminfo();
    if info.channels == 0 {
        return Err(DecodeError::InvalidHeader {
            path: path.to_path_buf(),
            reason: "zero channels",
        });
    }
    if info.sample_rate == 0 {
        return Err(DecodeError::InvalidHeader {
            path: path.to_path_buf(),
            reason: "zero sample rate",
        });
    }
    if info.bits_per_sample == 0 || info.bits_per_sample > 32 {
        return Err(DecodeError::UnsupportedFormat {
            path: path.to_path_buf(),
            bits: info.bits_per_sample as u16,
            format: "flac",
        });
    }

    let full_scale = (1u64 << (info.bits_per_sample - 1)) as f64;
    let samples = reader
        .samples()
        .map(|s| s.map(|v| (v as f64 / full_scale) as f32))
        .collect::<Result<Vec<_>, _>>()
        .map_err(wrap)?;

    log::trace!(
        "flac: {} → {} samples, {} ch @ {} Hz",
        path.display(),
        samples.len(),
        info.channels,
        info.sample_rate
    );

    Ok(AudioClip {
        samples,
        sample_rate: info.sample_rate,
        channels: info.channels as u16,
    })
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Write interleaved `f32` samples as an uncompressed (verbatim-subframe)
/// 16-bit FLAC stream.
#[cfg(test)]
pub(crate) fn write_flac_pcm16(path: &Path, samples: &[f32], channels: u16, sample_rate: u32) {
    const BLOCK: usize = 4_096;

    fn crc8(data: &[u8]) -> u8 {
        data.iter().fold(0u8, |mut crc, &b| {
            crc ^= b;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
            }
            crc
        })
    }

    fn crc16(data: &[u8]) -> u16 {
        data.iter().fold(0u16, |mut crc, &b| {
            crc ^= (b as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
            }
            crc
        })
    }

    fn coded_number(n: usize, out: &mut Vec<u8>) {
        match n {
            0..=0x7f => out.push(n as u8),
            0x80..=0x7ff => out.extend([0xc0 | (n >> 6) as u8, 0x80 | (n & 0x3f) as u8]),
            _ => out.extend([
                0xe0 | (n >> 12) as u8,
                0x80 | ((n >> 6) & 0x3f) as u8,
                0x80 | (n & 0x3f) as u8,
            ]),
        }
    }

    let ch = channels as usize;
    let pcm: Vec<i16> = samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();
    let frames = pcm.len() / ch;

    let mut out = b"fLaC".to_vec();
    out.extend([0x80, 0, 0, 34]);
    out.extend(16u16.to_be_bytes());
    out.extend((BLOCK as u16).to_be_bytes());
    out.extend([0u8; 6]);
    let packed = (sample_rate as u64) << 44
        | ((ch as u64 - 1) << 41)
        | (15u64 << 36)
        | frames as u64;
    out.extend(packed.to_be_bytes());
    out.extend([0u8; 16]);

    for (index, block) in pcm.chunks(BLOCK * ch).enumerate() {
        let len = block.len() / ch;
        let mut frame = vec![0xff, 0xf8, 0x70, ((ch as u8 - 1) << 4) | 0x08];
        coded_number(index, &mut frame);
        frame.extend(((len - 1) as u16).to_be_bytes());
        frame.push(crc8(&frame));

        for c in 0..ch {
            frame.push(0x02);
            for i in 0..len {
                frame.extend(block[i * ch + c].to_be_bytes());
            }
        }
        let crc = crc16(&frame);
        frame.extend(crc.to_be_bytes());
        out.extend(frame);
    }

    std::fs::write(path, out).unwrap();
}
