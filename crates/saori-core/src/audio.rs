//! Audio buffers and loudness math.
//!
//! Pure functions with no I/O and no async runtime.

/// Default loudness target for [`normalize`], in dBFS RMS.
pub const DEFAULT_TARGET_DB: f32 = -20.0;

/// Peak level a buffer is pulled back to when normalization would clip.
pub const CLIP_HEADROOM_PEAK: f32 = 0.95;

/// Mono audio: samples in [-1.0, 1.0] at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// A fresh all-zero segment lasting `duration_ms`.
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        Self::new(vec![0.0; silence_len(duration_ms, sample_rate)], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds. Zero for a zero sample rate.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Number of samples in `duration_ms` of audio at `sample_rate`.
pub fn silence_len(duration_ms: u32, sample_rate: u32) -> usize {
    (duration_ms as f64 / 1000.0 * sample_rate as f64).round() as usize
}

/// Root-mean-square level of `samples`. Zero for empty input.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

/// Scale `samples` so their RMS sits at `target_db` dBFS.
///
/// Silent input is returned as-is. If the gain would push the peak above
/// 1.0, the whole buffer is rescaled so the peak lands on
/// [`CLIP_HEADROOM_PEAK`] instead.
pub fn normalize(samples: &[f32], target_db: f32) -> Vec<f32> {
    let rms = compute_rms(samples) as f64;
    if rms == 0.0 {
        return samples.to_vec();
    }

    let target_rms = 10f64.powf(target_db as f64 / 20.0);
    let gain = target_rms / rms;
    let mut out: Vec<f32> = samples.iter().map(|&s| (s as f64 * gain) as f32).collect();

    let max = peak(&out);
    if max > 1.0 {
        let rescale = CLIP_HEADROOM_PEAK / max;
        for s in &mut out {
            *s *= rescale;
        }
    }

    out
}

/// Drop leading and trailing frames quieter than `top_db` below the loudest
/// frame. Frames are 2048 samples with a 512-sample hop.
///
/// Returns an empty buffer when everything is silent.
pub fn trim_silence(samples: &[f32], top_db: f32) -> Vec<f32> {
    const FRAME: usize = 2048;
    const HOP: usize = 512;

    if samples.is_empty() {
        return Vec::new();
    }

    let frames: Vec<f32> = (0..samples.len().div_ceil(HOP))
        .map(|i| {
            let start = i * HOP;
            let end = (start + FRAME).min(samples.len());
            compute_rms(&samples[start..end])
        })
        .collect();

    let loudest = frames.iter().cloned().fold(0.0f32, f32::max);
    if loudest == 0.0 {
        return Vec::new();
    }

    let threshold = loudest * 10f32.powf(-top_db / 20.0);
    let voiced = |rms: &f32| *rms > threshold;

    let (Some(first), Some(last)) = (frames.iter().position(voiced), frames.iter().rposition(voiced))
    else {
        return Vec::new();
    };

    let start = first * HOP;
    let end = (last * HOP + FRAME).min(samples.len());
    samples[start..end].to_vec()
}
