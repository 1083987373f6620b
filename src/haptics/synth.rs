// Haptic event synthesis
// Gates segments on loudness, picks the bands that fire and maps them to strengths

use crate::haptics::bands::{BandEnergies, BandEnergy};
use crate::haptics::config::HapticConfig;
use crate::haptics::types::{Hand, HapticEvent};

/// Whether a segment is loud enough, relative to its channel, to be analysed at all
pub fn passes_loudness_gate(normalized_loudness: f32, config: &HapticConfig) -> bool {
    normalized_loudness >= config.rms_filter_threshold
}

/// Whether a band stands out enough within its segment to fire
///
/// The gate is relative to the strongest band so a loud segment doesn't trigger every finger,
/// while a segment with several bands near the maximum can trigger several at once.
pub fn band_fires(band: &BandEnergy, max_energy: f32, config: &HapticConfig) -> bool {
    band.energy >= max_energy * config.band_energy_threshold_factor
        && band.energy > config.band_energy_floor
}

/// Bands of a segment that cross the firing threshold, in band order
pub fn firing_bands<'a>(energies: &'a BandEnergies, config: &HapticConfig) -> Vec<&'a BandEnergy> {
    energies
        .bands
        .iter()
        .filter(|band| band_fires(band, energies.max_energy, config))
        .collect()
}

/// Map segment loudness and band dominance onto the configured strength range
///
/// strength = min + loudness * (energy / max_energy) * (max - min), truncated and clamped.
pub fn band_strength(
    normalized_loudness: f32,
    band_energy: f32,
    max_energy: f32,
    config: &HapticConfig,
) -> u8 {
    let band_factor = if max_energy > config.spectral_silence_floor {
        band_energy as f64 / max_energy as f64
    } else {
        0.0
    };

    let effective = normalized_loudness as f64 * band_factor;
    let min = config.min_strength as f64;
    let max = config.max_strength as f64;

    // NaN casts to 0 and is then clamped up to min_strength
    let raw = (min + effective * (max - min)) as i64;
    raw.clamp(config.min_strength as i64, config.max_strength as i64) as u8
}

/// Build the events for one segment that already passed the loudness gate
///
/// Returns nothing for a spectrally silent segment.
pub fn synthesize_events(
    onset_time: f64,
    hand: Hand,
    normalized_loudness: f32,
    energies: &BandEnergies,
    config: &HapticConfig,
) -> Vec<HapticEvent> {
    if energies.is_spectrally_silent(config.spectral_silence_floor) {
        return Vec::new();
    }

    firing_bands(energies, config)
        .into_iter()
        .map(|band| {
            let strength =
                band_strength(normalized_loudness, band.energy, energies.max_energy, config);
            HapticEvent::new(
                onset_time,
                hand,
                band.finger_id,
                strength,
                config.haptic_duration,
            )
        })
        .collect()
}
