//! Minimal RIFF/WAVE (PCM 16-bit) encoding and header inspection.

use crate::error::{Result, HookError};

pub const WAV_HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT: u16 = 1;

/// Encode interleaved f32 samples as a 16-bit PCM WAV file.
///
/// Samples are clamped to [-1, 1]; negatives scale by 0x8000, positives by 0x7FFF.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bytes_per_sample = BITS_PER_SAMPLE / 8;
    let block_align = channels * bytes_per_sample;
    let byte_rate = sample_rate * block_align as u32;
    let data_size = (samples.len() * bytes_per_sample as usize) as u32;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());

    for &sample in samples {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }

    out
}

fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Format fields and data length read back from a WAV file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_len: usize,
}

impl WavInfo {
    pub fn duration_seconds(&self) -> f64 {
        let block_align = self.channels as usize * (self.bits_per_sample as usize / 8);
        if block_align == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.data_len / block_align) as f64 / self.sample_rate as f64
    }
}

/// Walk the chunk list of a WAV file (tolerating LIST and other chunks)
pub fn read_wav_info(bytes: &[u8]) -> Result<WavInfo> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(HookError::Audio("Not a RIFF/WAVE file".to_string()));
    }

    let mut format: Option<(u16, u32, u16)> = None;
    let mut offset = 12;

    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes([bytes[offset + 4], bytes[offset + 5], bytes[offset + 6], bytes[offset + 7]]) as usize;
        let body = offset + 8;

        match id {
            b"fmt " => {
                if body + 16 > bytes.len() {
                    return Err(HookError::Audio("Truncated fmt chunk".to_string()));
                }
                let channels = u16::from_le_bytes([bytes[body + 2], bytes[body + 3]]);
                let sample_rate = u32::from_le_bytes([bytes[body + 4], bytes[body + 5], bytes[body + 6], bytes[body + 7]]);
                let bits = u16::from_le_bytes([bytes[body + 14], bytes[body + 15]]);
                format = Some((channels, sample_rate, bits));
            }
            b"data" => {
                let (channels, sample_rate, bits_per_sample) =
                    format.ok_or_else(|| HookError::Audio("data chunk before fmt chunk".to_string()))?;
                // Streamed output may leave the size unset; trust the bytes present.
                let available = bytes.len() - body;
                let data_len = if size == 0 || size > available { available } else { size };
                return Ok(WavInfo { channels, sample_rate, bits_per_sample, data_len });
            }
            _ => {}
        }

        offset = body + size + (size & 1);
    }

    Err(HookError::Audio("No data chunk in WAV file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let wav = encode_wav(&[0.0, 0.5, -0.5], 16_000, 1);

        assert_eq!(wav.len(), WAV_HEADER_LEN + 6);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), (wav.len() - 8) as u32);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u16::from_le_bytes([wav[20], wav[21]]), 1);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 16_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 32_000);
        assert_eq!(u16::from_le_bytes([wav[32], wav[33]]), 2);
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 6);
    }

    #[test]
    fn test_samples_are_clamped_to_i16_range() {
        let wav = encode_wav(&[2.0, -2.0, 1.0, -1.0, f32::NAN], 8_000, 1);
        let samples: Vec<i16> = wav[WAV_HEADER_LEN..]
            .chunks(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples, vec![32767, -32768, 32767, -32768, 0]);
    }

    #[test]
    fn test_hound_reads_encoded_file() {
        let input: Vec<f32> = (0..1600).map(|i| (i as f32 / 1600.0 * 6.28).sin() * 0.5).collect();
        let wav = encode_wav(&input, 16_000, 1);

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded.len(), input.len());
        assert_eq!(decoded[400], (input[400] * 32767.0) as i16);
    }

    #[test]
    fn test_read_info_of_encoded_file() {
        let wav = encode_wav(&vec![0.0; 48_000], 16_000, 1);
        let info = read_wav_info(&wav).unwrap();
        assert_eq!(info.channels, 1);
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.data_len, 96_000);
        assert_eq!(info.duration_seconds(), 3.0);
    }

    #[test]
    fn test_read_info_skips_list_chunk() {
        let plain = encode_wav(&vec![0.0; 160], 16_000, 1);

        let mut wav = plain[0..36].to_vec();
        wav.extend_from_slice(b"LIST");
        wav.extend_from_slice(&5u32.to_le_bytes());
        wav.extend_from_slice(b"INFOx\0");
        wav.extend_from_slice(&plain[36..]);

        let info = read_wav_info(&wav).unwrap();
        assert_eq!(info.data_len, 320);
        assert!((info.duration_seconds() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_read_info_rejects_other_formats() {
        assert!(read_wav_info(b"OggS\0\0\0\0\0\0\0\0").is_err());
        assert!(read_wav_info(&[]).is_err());
    }
}
