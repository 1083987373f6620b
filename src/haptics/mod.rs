// Haptic event synthesis module
// Loudness range, onset segmentation, band energies and event generation

pub mod bands;
pub mod config;
pub mod dynamics;
pub mod segment;
pub mod synth;
pub mod types;

pub use bands::{analyze_band_energies, BandEnergies, BandEnergy};
pub use config::{default_bands, ConfigError, HapticConfig};
pub use dynamics::{estimate_loudness_range, LoudnessRange};
pub use segment::{segment_for_onset, segment_onsets, AnalysisSegment};
pub use synth::{band_strength, firing_bands, passes_loudness_gate, synthesize_events};
pub use types::{FrequencyBand, Hand, HapticEvent};
