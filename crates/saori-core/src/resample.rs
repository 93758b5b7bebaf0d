//! Sample-rate conversion using rubato.
//!
//! Output length is pinned to `round(len * target / source)` so stitched
//! segments keep their duration regardless of the resampler's chunking and
//! filter delay.

use rubato::{
    FastFixedIn, PolynomialDegree, Resampler as RubatoResampler, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio::AudioSegment;
use crate::error::AudioError;

const CHUNK_SIZE: usize = 1024;

/// Resampling quality preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResampleQuality {
    /// Cubic polynomial interpolation.
    Fast,
    /// Sinc interpolation, 128 taps.
    #[default]
    Normal,
    /// Sinc interpolation, 256 taps.
    High,
}

/// Band-limited mono resampler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resampler {
    quality: ResampleQuality,
}

impl Resampler {
    pub fn new(quality: ResampleQuality) -> Self {
        Self { quality }
    }

    /// Resample `audio` to `target_rate`. Matching rates return a copy.
    pub fn resample(&self, audio: &AudioSegment, target_rate: u32) -> Result<AudioSegment, AudioError> {
        if audio.sample_rate == 0 || target_rate == 0 {
            return Err(AudioError::AudioDecode(format!(
                "unusable sample rate ({} Hz -> {} Hz)",
                audio.sample_rate, target_rate
            )));
        }
        if audio.sample_rate == target_rate {
            return Ok(audio.clone());
        }

        let ratio = target_rate as f64 / audio.sample_rate as f64;
        let expected = (audio.len() as f64 * ratio).round() as usize;
        if expected == 0 {
            return Ok(AudioSegment::new(Vec::new(), target_rate));
        }

        let samples = match self.quality {
            ResampleQuality::Fast => {
                let mut resampler =
                    FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK_SIZE, 1)
                        .map_err(|e| AudioError::AudioDecode(format!("resampler setup: {e}")))?;
                process_chunks(&mut resampler, &audio.samples, expected)?
            }
            ResampleQuality::Normal | ResampleQuality::High => {
                let taps = if self.quality == ResampleQuality::High { 256 } else { 128 };
                let params = SincInterpolationParameters {
                    sinc_len: taps,
                    f_cutoff: 0.95,
                    interpolation: SincInterpolationType::Linear,
                    oversampling_factor: taps,
                    window: WindowFunction::BlackmanHarris2,
                };
                let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
                    .map_err(|e| AudioError::AudioDecode(format!("resampler setup: {e}")))?;
                process_chunks(&mut resampler, &audio.samples, expected)?
            }
        };

        Ok(AudioSegment::new(samples, target_rate))
    }
}

/// Feed `samples` through the resampler in fixed chunks, zero-padding past
/// the end until the delayed output covers `expected` samples.
fn process_chunks<R: RubatoResampler<f32>>(
    resampler: &mut R,
    samples: &[f32],
    expected: usize,
) -> Result<Vec<f32>, AudioError> {
    let delay = resampler.output_delay();
    let wanted = delay + expected;
    let mut output = Vec::with_capacity(wanted + CHUNK_SIZE);
    let mut input = vec![0.0f32; CHUNK_SIZE];
    let mut pos = 0;

    while output.len() < wanted {
        input.fill(0.0);
        if pos < samples.len() {
            let end = (pos + CHUNK_SIZE).min(samples.len());
            input[..end - pos].copy_from_slice(&samples[pos..end]);
            pos = end;
        }

        let result = resampler
            .process(&[&input[..]], None)
            .map_err(|e| AudioError::AudioDecode(format!("resampling failed: {e}")))?;

        match result.first() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
            _ => return Err(AudioError::AudioDecode("resampler produced no output".into())),
        }
    }

    Ok(output[delay..wanted].to_vec())
}

/// Resample with the default quality.
pub fn resample(audio: &AudioSegment, target_rate: u32) -> Result<AudioSegment, AudioError> {
    Resampler::default().resample(audio, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::compute_rms;

    fn sine(freq: f32, len: usize, rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn no_resample_needed() {
        let audio = AudioSegment::new(vec![0.25; 1000], 24_000);
        let result = resample(&audio, 24_000).unwrap();
        assert_eq!(result, audio);
    }

    #[test]
    fn downsample_exact_length() {
        let audio = AudioSegment::new(vec![0.0; 4800], 48_000);
        let result = resample(&audio, 24_000).unwrap();
        assert_eq!(result.sample_rate, 24_000);
        assert_eq!(result.len(), 2400);
    }

    #[test]
    fn upsample_exact_length() {
        let audio = AudioSegment::new(vec![0.0; 1600], 16_000);
        let result = resample(&audio, 24_000).unwrap();
        assert_eq!(result.sample_rate, 24_000);
        assert_eq!(result.len(), 2400);
    }

    #[test]
    fn odd_ratio_rounds_length() {
        let audio = AudioSegment::new(vec![0.0; 1000], 22_050);
        let result = resample(&audio, 24_000).unwrap();
        assert_eq!(result.len(), 1088); // 1088.43
    }

    #[test]
    fn fast_quality_exact_length() {
        let audio = AudioSegment::new(sine(200.0, 3000, 16_000), 16_000);
        let result = Resampler::new(ResampleQuality::Fast).resample(&audio, 22_050).unwrap();
        assert_eq!(result.len(), 4134); // 4134.375
    }

    #[test]
    fn preserves_tone_level() {
        let rate = 48_000;
        let audio = AudioSegment::new(sine(440.0, rate as usize, rate), rate);
        let result = resample(&audio, 24_000).unwrap();
        // Skip the edges where the filter rings.
        let body = &result.samples[1000..result.len() - 1000];
        let rms = compute_rms(body);
        assert!((rms - 0.3536).abs() < 0.03, "rms={rms}");
    }

    #[test]
    fn empty_input() {
        let audio = AudioSegment::new(Vec::new(), 16_000);
        let result = resample(&audio, 24_000).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.sample_rate, 24_000);
    }

    #[test]
    fn zero_rate_is_decode_error() {
        let audio = AudioSegment::new(vec![0.0; 10], 0);
        assert!(matches!(resample(&audio, 24_000), Err(AudioError::AudioDecode(_))));
    }
}
