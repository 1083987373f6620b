// Audio processing module
// Handles decoding of recordings and the spectral primitives used by the haptic pipeline

pub mod ingest;
pub mod spectral;

pub use ingest::{
    ingest_file, ingest_wav, is_supported, AudioData, AudioError, SUPPORTED_EXTENSIONS,
};
pub use spectral::{rms_of, RealFftProvider, SpectralProvider, Spectrogram};
