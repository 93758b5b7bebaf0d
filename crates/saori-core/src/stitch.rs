//! Audio stitching: joins per-chunk segments into one normalized waveform.
//!
//! ```text
//! [seg0] [silence] [seg1] [silence] ... [segN-1]   → normalize → final
//! ```
//!
//! Every segment is brought to the first segment's rate, a fresh silence
//! buffer goes between neighbours (never after the last), and the whole
//! buffer is loudness-normalized once. A single segment is passed through
//! untouched.

use tracing::debug;

use crate::audio::{AudioSegment, DEFAULT_TARGET_DB, normalize};
use crate::error::AudioError;
use crate::resample::Resampler;

/// Stitching parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StitchOptions {
    /// Gap inserted between consecutive segments.
    pub silence_ms: u32,
    /// Loudness target for the joined buffer, dBFS RMS.
    pub target_db: f32,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            silence_ms: 100,
            target_db: DEFAULT_TARGET_DB,
        }
    }
}

/// Join `segments` in order with `silence_ms` gaps, normalized to
/// [`DEFAULT_TARGET_DB`].
pub fn concatenate(segments: Vec<AudioSegment>, silence_ms: u32) -> Result<AudioSegment, AudioError> {
    stitch(
        segments,
        StitchOptions {
            silence_ms,
            target_db: DEFAULT_TARGET_DB,
        },
    )
}

/// Join `segments` in order according to `opts`.
///
/// Fails with [`AudioError::InvalidInput`] for an empty list and with
/// [`AudioError::AudioDecode`] if a segment cannot be resampled.
pub fn stitch(segments: Vec<AudioSegment>, opts: StitchOptions) -> Result<AudioSegment, AudioError> {
    stitch_with(&Resampler::default(), segments, opts)
}

/// [`stitch`] with an explicit resampler.
pub fn stitch_with(
    resampler: &Resampler,
    segments: Vec<AudioSegment>,
    opts: StitchOptions,
) -> Result<AudioSegment, AudioError> {
    let count = segments.len();
    let mut iter = segments.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| AudioError::InvalidInput("no audio segments to concatenate".into()))?;

    if count == 1 {
        return Ok(first);
    }

    let target_rate = first.sample_rate;
    if target_rate == 0 {
        return Err(AudioError::AudioDecode("first segment has a zero sample rate".into()));
    }

    let mut joined = first.samples;
    for (i, segment) in iter.enumerate() {
        let segment = if segment.sample_rate == target_rate {
            segment
        } else {
            debug!(
                "stitch: resampling segment {} from {} Hz to {target_rate} Hz",
                i + 1,
                segment.sample_rate
            );
            resampler.resample(&segment, target_rate)?
        };

        let gap = AudioSegment::silence(opts.silence_ms, target_rate);
        joined.reserve(gap.len() + segment.len());
        joined.extend_from_slice(&gap.samples);
        joined.extend_from_slice(&segment.samples);
    }

    debug!("stitch: joined {count} segments into {} samples", joined.len());

    Ok(AudioSegment::new(normalize(&joined, opts.target_db), target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CLIP_HEADROOM_PEAK, compute_rms, peak, silence_len};

    fn constant(value: f32, len: usize, rate: u32) -> AudioSegment {
        AudioSegment::new(vec![value; len], rate)
    }

    #[test]
    fn empty_list_is_invalid_input() {
        let err = concatenate(Vec::new(), 100).unwrap_err();
        assert!(matches!(err, AudioError::InvalidInput(_)));
    }

    #[test]
    fn single_segment_passthrough() {
        let a = AudioSegment::new(vec![0.9, -0.9, 0.001, 0.5], 22_050);
        let out = concatenate(vec![a.clone()], 100).unwrap();
        // Bit-identical: no silence, no normalization.
        assert_eq!(out, a);
    }

    #[test]
    fn order_and_silence_preserved() {
        let rate = 1000;
        let a = constant(0.1, 10, rate);
        let b = constant(0.2, 20, rate);
        let c = constant(0.3, 30, rate);

        let out = concatenate(vec![a, b, c], 5).unwrap();
        let gap = silence_len(5, rate);
        assert_eq!(gap, 5);
        assert_eq!(out.sample_rate, rate);
        assert_eq!(out.len(), 10 + gap + 20 + gap + 30);

        // Normalization scales uniformly, so ratios between regions survive.
        let unit = out.samples[0];
        assert!(unit > 0.0);
        let s = &out.samples;
        assert!(s[..10].iter().all(|&x| (x - unit).abs() < 1e-6));
        assert!(s[10..15].iter().all(|&x| x == 0.0));
        assert!(s[15..35].iter().all(|&x| (x - 2.0 * unit).abs() < 1e-5));
        assert!(s[35..40].iter().all(|&x| x == 0.0));
        assert!(s[40..70].iter().all(|&x| (x - 3.0 * unit).abs() < 1e-5));
    }

    #[test]
    fn no_trailing_silence() {
        let out = concatenate(vec![constant(0.2, 8, 1000), constant(0.2, 8, 1000)], 10).unwrap();
        assert_eq!(out.len(), 8 + 10 + 8);
        assert_ne!(*out.samples.last().unwrap(), 0.0);
    }

    #[test]
    fn output_is_normalized() {
        let rate = 16_000;
        let out = concatenate(vec![constant(0.01, 1600, rate), constant(0.02, 1600, rate)], 50).unwrap();
        let target = 10f32.powf(-20.0 / 20.0);
        assert!((compute_rms(&out.samples) - target).abs() < 1e-4);
    }

    #[test]
    fn loud_input_hits_clip_guard() {
        let mut a = constant(0.0005, 4000, 8000);
        a.samples[100] = 1.0;
        let out = concatenate(vec![a, constant(0.0005, 4000, 8000)], 10).unwrap();
        assert!((peak(&out.samples) - CLIP_HEADROOM_PEAK).abs() < 1e-6);
    }

    #[test]
    fn mismatched_rate_is_resampled() {
        let a = constant(0.1, 2400, 24_000);
        let b = constant(0.1, 1600, 16_000); // 0.1 s at 16 kHz → 2400 at 24 kHz
        let out = concatenate(vec![a, b], 100).unwrap();
        assert_eq!(out.sample_rate, 24_000);
        assert_eq!(out.len(), 2400 + 2400 + 2400);
    }

    #[test]
    fn zero_length_segment_keeps_silence() {
        let rate = 1000;
        let out = concatenate(
            vec![constant(0.1, 10, rate), AudioSegment::new(Vec::new(), rate), constant(0.1, 10, rate)],
            5,
        )
        .unwrap();
        assert_eq!(out.len(), 10 + 5 + 0 + 5 + 10);
        assert!(out.samples[10..20].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn zero_length_segment_at_other_rate() {
        let out = concatenate(
            vec![constant(0.1, 100, 24_000), AudioSegment::new(Vec::new(), 16_000)],
            10,
        )
        .unwrap();
        assert_eq!(out.len(), 100 + 240);
    }

    #[test]
    fn unreadable_rate_is_decode_error() {
        let err = concatenate(vec![constant(0.1, 10, 16_000), constant(0.1, 10, 0)], 10).unwrap_err();
        assert!(matches!(err, AudioError::AudioDecode(_)));
    }

    #[test]
    fn custom_target_db() {
        let opts = StitchOptions { silence_ms: 0, target_db: -12.0 };
        let out = stitch(vec![constant(0.05, 500, 8000), constant(0.05, 500, 8000)], opts).unwrap();
        let target = 10f32.powf(-12.0 / 20.0);
        assert!((compute_rms(&out.samples) - target).abs() < 1e-4);
    }
}
