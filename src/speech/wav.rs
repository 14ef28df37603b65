//! Turns raw speech output into a playable file.
//!
//! Providers hand back either an already encoded container (declared through
//! its MIME type) or bare little-endian PCM such as `audio/L16;codec=pcm;rate=24000`.
//! Bare PCM gets a canonical 44-byte RIFF/WAVE header in front of it.

use crate::error::{AppError, Result};

pub const WAV_HEADER_LEN: usize = 44;

const DEFAULT_CHANNELS: u16 = 1;
const DEFAULT_SAMPLE_RATE: u32 = 24_000;
const DEFAULT_BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT_TAG: u16 = 1;

const SUPPORTED_BITS: [u16; 4] = [8, 16, 24, 32];
const MAX_CHANNELS: u16 = 8;
const MAX_SAMPLE_RATE: u32 = 384_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
        }
    }
}

impl PcmFormat {
    /// Rejects parameters no real PCM stream uses; the header fields derived
    /// from a checked format always fit their widths.
    pub fn check(&self) -> Result<()> {
        if !SUPPORTED_BITS.contains(&self.bits_per_sample) {
            return Err(AppError::SpeechApi(format!(
                "unsupported PCM sample width: {} bits",
                self.bits_per_sample
            )));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(AppError::SpeechApi(format!(
                "unsupported PCM channel count: {}",
                self.channels
            )));
        }
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(AppError::SpeechApi(format!(
                "unsupported PCM sample rate: {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    pub fn byte_rate(&self) -> u32 {
        let rate = u64::from(self.sample_rate)
            * u64::from(self.channels)
            * u64::from(self.bits_per_sample)
            / 8;
        u32::try_from(rate).unwrap_or(u32::MAX)
    }

    pub fn block_align(&self) -> u16 {
        let align = u32::from(self.channels) * u32::from(self.bits_per_sample) / 8;
        u16::try_from(align).unwrap_or(u16::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// File extension for MIME types that are already a complete container.
pub fn encoded_extension(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" | "audio/opus" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/aac" => Some("aac"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}

/// Reads PCM parameters out of a MIME type like `audio/L16;rate=24000`.
///
/// Anything missing or unparsable keeps its default (mono, 16-bit, 24 kHz).
pub fn parse_pcm_mime(mime_type: &str) -> PcmFormat {
    let mut format = PcmFormat::default();
    let mut pieces = mime_type.split(';').map(str::trim);

    let subtype = pieces
        .next()
        .and_then(|essence| essence.split('/').nth(1))
        .unwrap_or_default();
    if let Some(bits) = subtype
        .strip_prefix('L')
        .or_else(|| subtype.strip_prefix('l'))
        .and_then(|bits| bits.parse::<u16>().ok())
        .filter(|bits| *bits > 0)
    {
        format.bits_per_sample = bits;
    }

    for param in pieces {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => {
                if let Ok(rate) = value.trim().parse::<u32>() {
                    format.sample_rate = rate;
                }
            }
            "channels" => {
                if let Ok(channels) = value.trim().parse::<u16>() {
                    if channels > 0 {
                        format.channels = channels;
                    }
                }
            }
            _ => {}
        }
    }

    format
}

/// Canonical PCM WAVE header for `data_len` bytes of samples.
pub fn wav_header(data_len: u32, format: &PcmFormat) -> [u8; WAV_HEADER_LEN] {
    let mut header = [0u8; WAV_HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&36u32.saturating_add(data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    header
}

/// Passes encoded audio through untouched and wraps bare PCM in a WAV container.
///
/// Fails with [`AppError::SpeechApi`] when the declared PCM parameters are out
/// of range.
pub fn encode_audio(data: Vec<u8>, mime_type: &str) -> Result<EncodedAudio> {
    if let Some(extension) = encoded_extension(mime_type) {
        return Ok(EncodedAudio {
            bytes: data,
            extension,
        });
    }

    let format = parse_pcm_mime(mime_type);
    format.check()?;
    let data_len = u32::try_from(data.len()).unwrap_or(u32::MAX);

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + data.len());
    bytes.extend_from_slice(&wav_header(data_len, &format));
    bytes.extend_from_slice(&data);

    Ok(EncodedAudio {
        bytes,
        extension: "wav",
    })
}
