// Audio ingestion module
// Decodes recordings into interleaved f32 samples and splits them into channels

use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// File extensions accepted by the batch converter (lowercase, no dot)
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["wav", "mp3", "flac", "ogg", "m4a", "aac"];

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV file: {0}")]
    WavReadError(#[from] hound::Error),

    #[error("Failed to decode audio: {0}")]
    DecodeError(#[from] SymphoniaError),

    #[error("Failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("No decodable audio track found")]
    NoAudioTrack,

    #[error("Invalid audio data")]
    InvalidData,
}

#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved audio samples normalized to f32 in range [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Bit depth of original audio (8, 16, 24, 32), 0 when the codec doesn't report one
    pub bit_depth: u16,

    /// Duration in milliseconds
    pub duration_ms: i64,

    /// Total number of frames (samples / channels)
    pub frame_count: usize,
}

impl AudioData {
    /// Build audio data from interleaved samples, deriving frame count and duration
    pub fn from_interleaved(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        bit_depth: u16,
    ) -> Result<Self, AudioError> {
        if channels == 0 || sample_rate == 0 {
            return Err(AudioError::InvalidData);
        }

        let frame_count = samples.len() / channels as usize;
        let duration_secs = frame_count as f64 / sample_rate as f64;

        Ok(AudioData {
            samples,
            sample_rate,
            channels,
            bit_depth,
            duration_ms: (duration_secs * 1000.0) as i64,
            frame_count,
        })
    }

    /// Get duration in seconds as f64
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// Extract a single channel from the interleaved buffer
    /// Returns an empty vector for an out-of-range channel index
    pub fn channel(&self, index: usize) -> Vec<f32> {
        let channels = self.channels as usize;
        if index >= channels {
            return Vec::new();
        }

        self.samples
            .iter()
            .skip(index)
            .step_by(channels)
            .take(self.frame_count)
            .copied()
            .collect()
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        let mut mono = Vec::with_capacity(self.frame_count);
        let channels = self.channels as usize;

        for frame_idx in 0..self.frame_count {
            let mut sum = 0.0;
            for ch in 0..channels {
                sum += self.samples[frame_idx * channels + ch];
            }
            mono.push(sum / channels as f32);
        }

        mono
    }
}

/// Check whether a path has one of the supported audio extensions
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Decode an audio file from disk
/// WAV goes through hound, every other supported container through symphonia
pub fn ingest_file(path: &Path) -> Result<AudioData, AudioError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AudioError::UnsupportedFormat(format!(
            "unsupported extension '{}'",
            ext
        )));
    }

    if ext == "wav" {
        let data = std::fs::read(path)?;
        return match ingest_wav(&data) {
            Err(err @ AudioError::WavReadError(hound::Error::FormatError(_)))
            | Err(err @ AudioError::WavReadError(hound::Error::Unsupported))
            | Err(err @ AudioError::UnsupportedFormat(_)) => {
                // Float64, ADPCM and other encodings hound rejects
                log::debug!(
                    "hound could not read '{}' ({}), retrying with symphonia",
                    path.display(),
                    err
                );
                ingest_with_symphonia(File::open(path)?, &ext).map_err(|_| err)
            }
            other => other,
        };
    }

    let file = File::open(path)?;
    ingest_with_symphonia(file, &ext)
}

/// Ingest a WAV file from raw bytes
/// Returns AudioData with normalized samples and metadata
pub fn ingest_wav(data: &[u8]) -> Result<AudioData, AudioError> {
    let cursor = Cursor::new(data);
    let mut reader = WavReader::new(cursor)?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels;
    let bit_depth = spec.bits_per_sample;
    let sample_format = spec.sample_format;

    // Read and normalize samples to f32 [-1.0, 1.0]
    let samples: Vec<f32> = match (sample_format, bit_depth) {
        // hound already re-centres unsigned 8-bit PCM around zero
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 128.0)
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 8388608.0)
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} bit {}-bit audio",
                sample_format, bit_depth
            )));
        }
    };

    AudioData::from_interleaved(samples, sample_rate, channels, bit_depth)
}

/// Decode a container with symphonia
/// Handles MP3, FLAC, OGG, M4A and AAC, plus WAV encodings hound doesn't support
fn ingest_with_symphonia(file: File, extension: &str) -> Result<AudioData, AudioError> {
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoAudioTrack)?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let bit_depth = track.codec_params.bits_per_sample.unwrap_or(0) as u16;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                }
                if channels == 0 {
                    channels = spec.channels.count() as u16;
                }

                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                });
                if buf.capacity() < decoded.capacity() * spec.channels.count() {
                    *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                }
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Corrupt packets are skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    AudioData::from_interleaved(samples, sample_rate, channels, bit_depth)
}
