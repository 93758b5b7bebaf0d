//! WAV encoding and decoding for in-memory buffers.
//!
//! Pure functions: no filesystem access, no async runtime. Callers read and write
//! the bytes themselves.

use std::borrow::Cow;
use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::audio::AudioSegment;
use crate::error::AudioError;

const SIZE_SENTINEL: u32 = 0xFFFF_FFFF;

/// Decode a WAV file into a mono [`AudioSegment`].
///
/// Integer and float PCM are accepted; multi-channel audio is averaged down
/// to mono. Streaming-style sentinel sizes are patched first, see
/// [`fix_wav_sizes`].
pub fn decode_wav(bytes: &[u8]) -> Result<AudioSegment, AudioError> {
    let bytes: Cow<'_, [u8]> = if has_sentinel_sizes(bytes) {
        Cow::Owned(fix_wav_sizes(bytes.to_vec()))
    } else {
        Cow::Borrowed(bytes)
    };

    let reader = WavReader::new(Cursor::new(bytes.as_ref()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AudioError::AudioDecode("WAV header reports a zero sample rate".into()));
    }
    if spec.channels == 0 {
        return Err(AudioError::AudioDecode("WAV header reports zero channels".into()));
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    Ok(AudioSegment::new(mono, spec.sample_rate))
}

/// Encode `audio` as 16-bit mono PCM. Samples are clamped to [-1, 1].
pub fn encode_wav(audio: &AudioSegment) -> Result<Vec<u8>, AudioError> {
    if audio.sample_rate == 0 {
        return Err(AudioError::InvalidInput("cannot encode audio with a zero sample rate".into()));
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in &audio.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

fn has_sentinel_sizes(wav: &[u8]) -> bool {
    wav.len() >= 8 && &wav[0..4] == b"RIFF" && wav[4..8] == SIZE_SENTINEL.to_le_bytes()
        || find_data_chunk(wav).is_some_and(|pos| wav[pos + 4..pos + 8] == SIZE_SENTINEL.to_le_bytes())
}

fn find_data_chunk(wav: &[u8]) -> Option<usize> {
    if wav.len() < 12 || &wav[0..4] != b"RIFF" {
        return None;
    }
    let mut pos = 12;
    while pos + 8 <= wav.len() {
        if &wav[pos..pos + 4] == b"data" {
            return Some(pos);
        }
        let chunk_size = u32::from_le_bytes([wav[pos + 4], wav[pos + 5], wav[pos + 6], wav[pos + 7]]);
        let skip = if chunk_size == SIZE_SENTINEL { 0 } else { chunk_size as usize };
        // RIFF chunks are word-aligned.
        pos += 8 + skip + (skip & 1);
    }
    None
}

/// Fix WAV files with indeterminate sizes (`0xFFFFFFFF`).
///
/// Model servers that stream their response write the sentinel for the RIFF
/// and `data` chunk sizes. Once the whole body is buffered the real sizes are
/// known, so patch them in.
pub fn fix_wav_sizes(mut wav: Vec<u8>) -> Vec<u8> {
    if wav.len() < 44 || &wav[0..4] != b"RIFF" {
        return wav;
    }
    let riff_size = (wav.len() - 8) as u32;
    wav[4..8].copy_from_slice(&riff_size.to_le_bytes());

    if let Some(pos) = find_data_chunk(&wav) {
        let data_size = (wav.len() - pos - 8) as u32;
        wav[pos + 4..pos + 8].copy_from_slice(&data_size.to_le_bytes());
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_offset(wav: &[u8]) -> usize {
        find_data_chunk(wav).unwrap()
    }

    #[test]
    fn encode_produces_valid_header() {
        let wav = encode_wav(&AudioSegment::new(vec![0.0; 100], 16_000)).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), data_offset(&wav) + 8 + 200);
    }

    #[test]
    fn decode_encoded_audio() {
        let original = AudioSegment::new(vec![0.0, 0.5, -0.5, 0.25], 24_000);
        let decoded = decode_wav(&encode_wav(&original).unwrap()).unwrap();
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.len(), 4);
        for (d, o) in decoded.samples.iter().zip(&original.samples) {
            assert!((d - o).abs() < 1e-3);
        }
    }

    #[test]
    fn encode_clamps_out_of_range() {
        let wav = encode_wav(&AudioSegment::new(vec![2.0, -3.0], 8000)).unwrap();
        let decoded = decode_wav(&wav).unwrap();
        assert!(decoded.samples[0] <= 1.0 && decoded.samples[0] > 0.99);
        assert!(decoded.samples[1] >= -1.0 && decoded.samples[1] < -0.99);
    }

    #[test]
    fn decode_stereo_float_downmixes() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for (l, r) in [(0.2f32, 0.4f32), (-0.6, 0.0)] {
                writer.write_sample(l).unwrap();
                writer.write_sample(r).unwrap();
            }
            writer.finalize().unwrap();
        }
        let decoded = decode_wav(&cursor.into_inner()).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.len(), 2);
        assert!((decoded.samples[0] - 0.3).abs() < 1e-6);
        assert!((decoded.samples[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn decode_garbage_is_error() {
        assert!(matches!(decode_wav(b"not a wav file at all"), Err(AudioError::AudioDecode(_))));
        assert!(decode_wav(&[]).is_err());
    }

    #[test]
    fn encode_zero_rate_is_invalid() {
        let err = encode_wav(&AudioSegment::new(vec![0.0], 0)).unwrap_err();
        assert!(matches!(err, AudioError::InvalidInput(_)));
    }

    #[test]
    fn fix_wav_sizes_patches_sentinel() {
        let mut wav = encode_wav(&AudioSegment::new(vec![0.0; 50], 16_000)).unwrap();
        let data = data_offset(&wav);
        wav[4..8].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());
        wav[data + 4..data + 8].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());

        let fixed = fix_wav_sizes(wav.clone());
        let riff_size = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        assert_eq!(riff_size, (fixed.len() - 8) as u32);
        let data_size = u32::from_le_bytes(fixed[data + 4..data + 8].try_into().unwrap());
        assert_eq!(data_size, 100);
    }

    #[test]
    fn fix_wav_sizes_noop_on_good_wav() {
        let wav = encode_wav(&AudioSegment::new(vec![0.1; 50], 16_000)).unwrap();
        assert_eq!(fix_wav_sizes(wav.clone()), wav);
    }

    #[test]
    fn decode_streamed_wav_with_sentinels() {
        let mut wav = encode_wav(&AudioSegment::new(vec![0.5; 30], 24_000)).unwrap();
        let data = data_offset(&wav);
        wav[4..8].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());
        wav[data + 4..data + 8].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());

        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.len(), 30);
        assert_eq!(decoded.sample_rate, 24_000);
    }
}
