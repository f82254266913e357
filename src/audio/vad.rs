//! Energy-based voice-activity trim.
//!
//! [`EnergyTrimmer`] cuts leading and trailing low-energy audio before
//! framing.  It belongs to the standalone preprocessing pipeline only; the
//! training dataset path never trims.
//!
//! ## Algorithm
//!
//! Audio is split into frames of `frame_len` samples.  A frame's energy is
//! `10·log10(mean(x²))` dBFS (floored at −100 dB).  The output keeps the
//! contiguous span from the first to the last frame above the threshold.
//! With `frame_len == 1` this is a per-sample `20·log10|x|` envelope.

/// Energy floor applied before the logarithm (−100 dBFS).
const ENERGY_FLOOR: f32 = 1e-10;

// ---------------------------------------------------------------------------
// EnergyTrimmer
// ---------------------------------------------------------------------------

/// dB-threshold silence trimmer.
///
/// # Example
///
/// ```rust
/// use voice_spoof_trainer::audio::EnergyTrimmer;
///
/// let vad = EnergyTrimmer::new(-40.0, 480);
///
/// let mut audio = vec![0.0_f32; 480];
/// audio.extend(vec![0.5_f32; 480]);
/// audio.extend(vec![0.0_f32; 480]);
///
/// assert_eq!(vad.trim(&audio).len(), 480);
/// ```
#[derive(Debug, Clone)]
pub struct EnergyTrimmer {
    threshold_db: f32,
    frame_len: usize,
}

impl EnergyTrimmer {
    /// Create a trimmer.  `frame_len` of zero is treated as one sample.
    pub fn new(threshold_db: f32, frame_len: usize) -> Self {
        Self {
            threshold_db,
            frame_len: frame_len.max(1),
        }
    }

    /// Threshold currently in use, in dBFS.
    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Energy of one frame in dBFS.
    pub fn frame_energy_db(chunk: &[f32]) -> f32 {
        if chunk.is_empty() {
            return 10.0 * ENERGY_FLOOR.log10();
        }
        let mean_sq = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
        10.0 * mean_sq.max(ENERGY_FLOOR).log10()
    }

    fn is_voice_frame(&self, chunk: &[f32]) -> bool {
        Self::frame_energy_db(chunk) > self.threshold_db
    }

    /// Trim leading and trailing low-energy audio.
    ///
    /// Returns a sub-slice of `audio`.  If no frame exceeds the threshold
    /// the whole input is returned unchanged.
    pub fn trim<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        if audio.is_empty() {
            return audio;
        }

        let frame_len = self.frame_len;
        let total_frames = audio.len().div_ceil(frame_len);
        let frame = |i: usize| &audio[i * frame_len..((i + 1) * frame_len).min(audio.len())];

        let Some(start_frame) = (0..total_frames).find(|&i| self.is_voice_frame(frame(i))) else {
            return audio;
        };
        let end_frame = (0..total_frames)
            .rfind(|&i| self.is_voice_frame(frame(i)))
            .unwrap_or(start_frame);

        let start = start_frame * frame_len;
        let end = ((end_frame + 1) * frame_len).min(audio.len());
        &audio[start..end]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
