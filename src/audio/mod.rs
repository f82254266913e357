//! Audio front end: file decoding → channel folding → resampling → trim.
//!
//! # Pipeline
//!
//! ```text
//! *.wav  → decode_wav  ┐
//! *.flac → decode_flac ┴→ AudioClip (interleaved, native rate)
//!       → to_mono → resample(target rate) → [EnergyTrimmer, preprocess only]
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_spoof_trainer::audio::{decode_wav, resample, to_mono};
//!
//! let clip = decode_wav("data/raw/train/real/a.wav".as_ref()).unwrap();
//! let mono = to_mono(&clip.samples, clip.channels);
//! let pcm = resample(&mono, clip.sample_rate, 16_000).unwrap();
//! println!("{} samples @ 16 kHz", pcm.len());
//! ```

pub mod flac;
pub mod resample;
pub mod vad;
pub mod wav;

pub use flac::decode_flac;
pub use resample::{resample, resample_interleaved, to_mono};
pub use vad::EnergyTrimmer;
pub use wav::{decode_file, decode_wav, write_wav_pcm16, AudioClip, DecodeError, EncodeError};
