// Spectral primitives
// STFT, RMS framing, onset detection and time/sample conversion behind a narrow trait

use realfft::RealFftPlanner;

/// Magnitude spectrogram, indexed as `frames[frame][bin]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrogram {
    /// Number of frequency bins per frame (n_fft / 2 + 1)
    pub n_bins: usize,

    /// Magnitude frames, each `n_bins` long
    pub frames: Vec<Vec<f32>>,
}

impl Spectrogram {
    /// Number of time frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Mean magnitude over the given bins across every frame
    /// Returns 0.0 when there are no bins or no frames
    pub fn mean_over_bins(&self, bins: &[usize]) -> f32 {
        if bins.is_empty() || self.frames.is_empty() {
            return 0.0;
        }

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for frame in &self.frames {
            for &bin in bins {
                if let Some(&magnitude) = frame.get(bin) {
                    sum += magnitude as f64;
                    count += 1;
                }
            }
        }

        if count == 0 {
            0.0
        } else {
            (sum / count as f64) as f32
        }
    }
}

/// Signal-processing operations the haptic pipeline consumes
///
/// Implementations must be deterministic: the same input always yields the same output.
pub trait SpectralProvider: Send + Sync {
    /// Detect onsets and return their times in seconds, in increasing order
    /// `wait_frames` is the minimum spacing between consecutive onsets, in hops
    fn detect_onsets(
        &self,
        samples: &[f32],
        sample_rate: u32,
        hop_length: usize,
        wait_frames: usize,
    ) -> Vec<f64>;

    /// Short-time magnitude spectrum with centred frames
    fn stft_magnitude(&self, samples: &[f32], n_fft: usize, hop_length: usize) -> Spectrogram;

    /// Center frequency (Hz) of every STFT bin for the given FFT size
    fn fft_frequencies(&self, sample_rate: u32, n_fft: usize) -> Vec<f32> {
        if n_fft == 0 {
            return Vec::new();
        }
        let bin_width = sample_rate as f32 / n_fft as f32;
        (0..=n_fft / 2).map(|k| k as f32 * bin_width).collect()
    }

    /// Short-time RMS loudness, one value per frame
    fn rms(&self, samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32>;

    /// Convert a time in seconds to a sample index (truncating, may be negative)
    fn time_to_samples(&self, seconds: f64, sample_rate: u32) -> i64 {
        (seconds * sample_rate as f64) as i64
    }

    /// Convert a frame index to its time in seconds
    fn frames_to_time(&self, frame: usize, sample_rate: u32, hop_length: usize) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        (frame * hop_length) as f64 / sample_rate as f64
    }
}

/// realfft-backed provider
/// Onsets come from half-wave rectified spectral flux with adaptive peak picking
#[derive(Debug, Clone)]
pub struct RealFftProvider {
    /// FFT window size used for the onset detection function
    pub onset_window_size: usize,

    /// Threshold multiplier for adaptive peak picking
    /// Threshold = mean(flux) + threshold_factor * std(flux)
    pub threshold_factor: f32,
}

impl Default for RealFftProvider {
    fn default() -> Self {
        RealFftProvider {
            onset_window_size: 2048,
            threshold_factor: 1.5,
        }
    }
}

impl RealFftProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute spectral flux for every centred frame
    /// Spectral flux = sum of positive differences between consecutive magnitude spectra
    fn spectral_flux(&self, samples: &[f32], hop_length: usize) -> Vec<f32> {
        let spectrogram = self.stft_magnitude(samples, self.onset_window_size, hop_length);

        let mut flux = Vec::with_capacity(spectrogram.frame_count());
        let mut prev: Option<&Vec<f32>> = None;

        for spectrum in &spectrogram.frames {
            let frame_flux = match prev {
                Some(prev) => spectrum
                    .iter()
                    .zip(prev.iter())
                    .map(|(curr, prev)| (curr - prev).max(0.0))
                    .sum::<f32>(),
                None => 0.0,
            };
            flux.push(frame_flux);
            prev = Some(spectrum);
        }

        flux
    }

    /// Pick local maxima above an adaptive threshold, honouring the minimum gap
    fn pick_peaks(&self, flux: &[f32], wait_frames: usize) -> Vec<usize> {
        if flux.len() < 3 {
            return Vec::new();
        }

        let mean = flux.iter().sum::<f32>() / flux.len() as f32;
        let variance = flux.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / flux.len() as f32;
        let threshold = mean + self.threshold_factor * variance.sqrt();

        let mut peaks = Vec::new();
        let mut last_peak: Option<usize> = None;

        for i in 1..flux.len() - 1 {
            let is_peak = flux[i] > flux[i - 1] && flux[i] > flux[i + 1];
            let above_threshold = flux[i] > threshold;
            let gap_ok = last_peak.map_or(true, |last| i - last >= wait_frames);

            if is_peak && above_threshold && gap_ok {
                peaks.push(i);
                last_peak = Some(i);
            }
        }

        peaks
    }
}

impl SpectralProvider for RealFftProvider {
    fn detect_onsets(
        &self,
        samples: &[f32],
        sample_rate: u32,
        hop_length: usize,
        wait_frames: usize,
    ) -> Vec<f64> {
        if samples.is_empty() || hop_length == 0 || sample_rate == 0 {
            return Vec::new();
        }

        let flux = self.spectral_flux(samples, hop_length);
        self.pick_peaks(&flux, wait_frames)
            .into_iter()
            .map(|frame| self.frames_to_time(frame, sample_rate, hop_length))
            .collect()
    }

    fn stft_magnitude(&self, samples: &[f32], n_fft: usize, hop_length: usize) -> Spectrogram {
        if n_fft == 0 || hop_length == 0 {
            return Spectrogram::default();
        }

        let n_bins = n_fft / 2 + 1;
        let padded = center_pad(samples, n_fft / 2);
        let window = hann_window(n_fft);

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();

        let frames = frame_starts(padded.len(), n_fft, hop_length)
            .map(|start| {
                for (dst, (&x, &w)) in input
                    .iter_mut()
                    .zip(padded[start..start + n_fft].iter().zip(window.iter()))
                {
                    *dst = x * w;
                }

                match fft.process(&mut input, &mut spectrum) {
                    Ok(()) => spectrum.iter().map(|c| c.norm()).collect(),
                    Err(_) => vec![0.0; n_bins],
                }
            })
            .collect();

        Spectrogram { n_bins, frames }
    }

    fn rms(&self, samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
        if samples.is_empty() || frame_length == 0 || hop_length == 0 {
            return Vec::new();
        }

        let padded = center_pad(samples, frame_length / 2);
        frame_starts(padded.len(), frame_length, hop_length)
            .map(|start| {
                let frame = &padded[start..start + frame_length];
                let power = frame.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>()
                    / frame_length as f64;
                power.sqrt() as f32
            })
            .collect()
    }
}

/// Periodic Hann window to reduce spectral leakage
fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Zero-pad both ends so frame `i` is centred on sample `i * hop`
fn center_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let mut padded = vec![0.0; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);
    padded
}

/// Start offsets of every complete frame in a buffer of `len` samples
fn frame_starts(len: usize, frame_length: usize, hop_length: usize) -> impl Iterator<Item = usize> {
    let count = if len >= frame_length {
        1 + (len - frame_length) / hop_length
    } else {
        0
    };
    (0..count).map(move |i| i * hop_length)
}

/// Root-mean-square of a whole buffer
pub fn rms_of(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let power =
        samples.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / samples.len() as f64;
    power.sqrt() as f32
}
