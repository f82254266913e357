//! WAV decoding into [`AudioClip`] and 16-bit PCM encoding.
//!
//! Clips are read fresh on every access; nothing here caches decoded audio.

use std::path::{Path, PathBuf};

use thiserror::Error;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// A clip that cannot be turned into samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be opened or its header parsed.
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The header parsed but sample data is truncated or corrupt.
    #[error("cannot read samples from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// Channel count or sample rate is zero.
    #[error("invalid header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: &'static str },

    /// Bit depth / sample format combination not handled.
    #[error("unsupported sample format in {path}: {bits}-bit {format}")]
    UnsupportedFormat {
        path: PathBuf,
        bits: u16,
        format: &'static str,
    },

    /// A FLAC stream could not be opened or decoded.
    #[error("cannot decode FLAC {path}: {source}")]
    Flac {
        path: PathBuf,
        #[source]
        source: claxon::Error,
    },

    /// The band-limited resampler rejected the input.
    #[error("resampling {from} Hz -> {to} Hz failed: {reason}")]
    Resample { from: u32, to: u32, reason: String },
}

/// Failure while writing a WAV file.
#[derive(Debug, Error)]
#[error("cannot write {path}: {source}")]
pub struct EncodeError {
    pub path: PathBuf,
    #[source]
    pub source: hound::Error,
}

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// A decoded waveform: interleaved `f32` samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Decode a WAV or FLAC file, chosen by extension (any case).  Anything that
/// is not `.flac` is read as WAV.
pub fn decode_file(path: &Path) -> Result<AudioClip, DecodeError> {
    let is_flac = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("flac"));
    if is_flac {
        super::flac::decode_flac(path)
    } else {
        decode_wav(path)
    }
}

// ---------------------------------------------------------------------------
// decode_wav
// ---------------------------------------------------------------------------

/// Decode a PCM or IEEE-float WAV file.
///
/// Integer samples are scaled to `[-1, 1]` by their full-scale value;
/// 32-bit float samples are passed through.
pub fn decode_wav(path: &Path) -> Result<AudioClip, DecodeError> {
    let reader = hound::WavReader::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(DecodeError::InvalidHeader {
            path: path.to_path_buf(),
            reason: "zero channels",
        });
    }
    if spec.sample_rate == 0 {
        return Err(DecodeError::InvalidHeader {
            path: path.to_path_buf(),
            reason: "zero sample rate",
        });
    }

    let samples = read_samples(reader, spec, path)?;

    log::trace!(
        "wav: {} → {} samples, {} ch @ {} Hz",
        path.display(),
        samples.len(),
        spec.channels,
        spec.sample_rate
    );

    Ok(AudioClip {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn read_samples<R: std::io::Read>(
    mut reader: hound::WavReader<R>,
    spec: hound::WavSpec,
    path: &Path,
) -> Result<Vec<f32>, DecodeError> {
    let read_err = |source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    };

    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err),
        (hound::SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err),
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32_768.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err),
        (hound::SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err),
        (hound::SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v as f64 / 2_147_483_648.0) as f32))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err),
        (format, bits) => Err(DecodeError::UnsupportedFormat {
            path: path.to_path_buf(),
            bits,
            format: match format {
                hound::SampleFormat::Float => "float",
                hound::SampleFormat::Int => "int",
            },
        }),
    }
}

// ---------------------------------------------------------------------------
// write_wav_pcm16
// ---------------------------------------------------------------------------

/// Write mono `f32` samples as a 16-bit PCM WAV file, clamping to `[-1, 1]`.
pub fn write_wav_pcm16(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), EncodeError> {
    let wrap = |source| EncodeError {
        path: path.to_path_buf(),
        source,
    };

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(wrap)?;
    for &sample in samples {
        let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(amplitude).map_err(wrap)?;
    }
    writer.finalize().map_err(wrap)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pcm16_round_trip_keeps_shape_and_scale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..1_600).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();

        write_wav_pcm16(&path, &samples, 16_000).unwrap();
        let clip = decode_wav(&path).unwrap();

        assert_eq!(clip.sample_rate, 16_000);
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.frames(), 1_600);
        for (a, b) in samples.iter().zip(&clip.samples) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn stereo_float_file_keeps_interleaving() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            w.write_sample(0.25_f32).unwrap();
            w.write_sample(-0.25_f32).unwrap();
        }
        w.finalize().unwrap();

        let clip = decode_wav(&path).unwrap();
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.frames(), 100);
        assert_eq!(clip.samples[0], 0.25);
        assert_eq!(clip.samples[1], -0.25);
        assert!((clip.duration_secs() - 100.0 / 22_050.0).abs() < 1e-6);
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        assert!(matches!(decode_wav(&path), Err(DecodeError::Open { .. })));
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let dir = tempdir().unwrap();
        assert!(decode_wav(&dir.path().join("absent.wav")).is_err());
    }
}
