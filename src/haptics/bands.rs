// Band energy analysis
// Mean STFT magnitude per configured frequency band for one analysis segment

use crate::audio::SpectralProvider;
use crate::haptics::config::HapticConfig;
use crate::haptics::types::FrequencyBand;

/// Energy measured in one band of a segment
#[derive(Debug, Clone, PartialEq)]
pub struct BandEnergy {
    /// Band name, copied from the configuration
    pub name: String,

    /// Finger this band drives
    pub finger_id: u8,

    /// Mean magnitude over every in-band bin and frame
    pub energy: f32,
}

/// Per-band energies of a segment plus the strongest of them
#[derive(Debug, Clone, PartialEq)]
pub struct BandEnergies {
    /// One entry per configured band, in configuration order
    pub bands: Vec<BandEnergy>,

    /// Largest band energy, never below 0.0
    pub max_energy: f32,
}

impl BandEnergies {
    /// Pair raw energies with their bands and find the maximum
    pub fn from_values(bands: &[FrequencyBand], energies: &[f32]) -> Self {
        let bands: Vec<BandEnergy> = bands
            .iter()
            .zip(energies.iter())
            .map(|(band, &energy)| BandEnergy {
                name: band.name.clone(),
                finger_id: band.finger_id,
                energy,
            })
            .collect();

        let max_energy = bands.iter().map(|b| b.energy).fold(0.0f32, f32::max);

        BandEnergies { bands, max_energy }
    }

    /// No band carries resolvable spectral content
    pub fn is_spectrally_silent(&self, floor: f32) -> bool {
        self.max_energy < floor
    }
}

/// Bin indices whose center frequency lies inside the band (inclusive bounds)
fn bins_in_band(frequencies: &[f32], band: &FrequencyBand) -> Vec<usize> {
    frequencies
        .iter()
        .enumerate()
        .filter(|(_, f)| band.contains(**f))
        .map(|(i, _)| i)
        .collect()
}

/// Compute the energy of every configured band for one segment
/// Bands without any bin in range report 0.0
pub fn analyze_band_energies(
    segment: &[f32],
    sample_rate: u32,
    provider: &dyn SpectralProvider,
    config: &HapticConfig,
) -> BandEnergies {
    let spectrogram = provider.stft_magnitude(segment, config.n_fft, config.fft_hop_length);
    let frequencies = provider.fft_frequencies(sample_rate, config.n_fft);

    let energies: Vec<f32> = config
        .bands
        .iter()
        .map(|band| {
            let bins = bins_in_band(&frequencies, band);
            spectrogram.mean_over_bins(&bins)
        })
        .collect();

    BandEnergies::from_values(&config.bands, &energies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RealFftProvider;
    use crate::haptics::config::default_bands;

    fn tone(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_bins_in_band() {
        let freqs: Vec<f32> = (0..=10).map(|k| k as f32 * 50.0).collect();
        let band = FrequencyBand::new("low_mid", 101.0, 400.0, 1);

        // 150, 200, 250, 300, 350, 400
        assert_eq!(bins_in_band(&freqs, &band), vec![3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_from_values_max() {
        let energies = BandEnergies::from_values(&default_bands(), &[1.0, 0.1, 0.05, 0.02, 0.01]);

        assert_eq!(energies.bands.len(), 5);
        assert_eq!(energies.max_energy, 1.0);
        assert_eq!(energies.bands[0].name, "sub_bass");
        assert_eq!(energies.bands[4].finger_id, 4);
    }

    #[test]
    fn test_mid_tone_dominates_mid_band() {
        let provider = RealFftProvider::new();
        let config = HapticConfig::default();

        let segment = tone(1000.0, 44100, 8820);
        let energies = analyze_band_energies(&segment, 44100, &provider, &config);

        let mid = energies.bands.iter().find(|b| b.name == "mid").unwrap();
        assert_eq!(mid.energy, energies.max_energy);
        assert!(!energies.is_spectrally_silent(config.spectral_silence_floor));
    }

    #[test]
    fn test_silent_segment_is_spectrally_silent() {
        let provider = RealFftProvider::new();
        let config = HapticConfig::default();

        let energies = analyze_band_energies(&vec![0.0; 4096], 44100, &provider, &config);
        assert_eq!(energies.max_energy, 0.0);
        assert!(energies.is_spectrally_silent(config.spectral_silence_floor));
    }

    #[test]
    fn test_band_above_nyquist_reports_zero() {
        let provider = RealFftProvider::new();
        let config = HapticConfig::default();

        // Nyquist at 4 kHz: the 4001-12000 Hz band has no bins
        let segment = tone(300.0, 8000, 1600);
        let energies = analyze_band_energies(&segment, 8000, &provider, &config);

        let high = energies.bands.iter().find(|b| b.name == "high").unwrap();
        assert_eq!(high.energy, 0.0);
    }
}
