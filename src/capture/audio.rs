// src/capture/audio.rs
use crate::errors::ZenError;
use base64::{Engine as _, engine::general_purpose};
use std::io::Cursor;
use std::time::Duration;

/// Synthesized speech arrives as mono 16-bit PCM at this rate.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Interleaved 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }

    pub fn to_wav(&self) -> Result<Vec<u8>, ZenError> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buf = Vec::new();
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)
            .map_err(|e| ZenError::Decode(format!("Failed to start WAV: {}", e)))?;
        for sample in &self.samples {
            writer
                .write_sample(*sample)
                .map_err(|e| ZenError::Decode(format!("Failed to write WAV: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| ZenError::Decode(format!("Failed to finish WAV: {}", e)))?;

        Ok(buf)
    }

    /// Reads 16-bit integer or 32-bit float WAV data.
    pub fn from_wav(bytes: &[u8]) -> Result<Self, ZenError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| ZenError::Decode(format!("Invalid WAV: {}", e)))?;
        let spec = reader.spec();

        let samples = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ZenError::Decode(e.to_string()))?,
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ZenError::Decode(e.to_string()))?,
            (format, bits) => {
                return Err(ZenError::Decode(format!(
                    "Unsupported WAV encoding: {:?} {}-bit",
                    format, bits
                )));
            }
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }

    /// Little-endian mono PCM, as carried by the speech endpoint.
    pub fn from_pcm16_le(bytes: &[u8], sample_rate: u32) -> Result<Self, ZenError> {
        if bytes.len() % 2 != 0 {
            return Err(ZenError::Decode(format!(
                "PCM payload has odd length {}",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::mono(samples, sample_rate))
    }
}

/// Decodes the base64 transport encoding of synthesized speech.
pub fn decode_speech(encoded: &str) -> Result<AudioClip, ZenError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ZenError::Decode(format!("Speech payload is not base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(ZenError::Decode("Speech payload is empty".to_string()));
    }
    AudioClip::from_pcm16_le(&bytes, SPEECH_SAMPLE_RATE)
}
