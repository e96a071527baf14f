//! Cheap tempo guess from the opening seconds of a track.
//!
//! Windows whose spectrum is both spread out (perceptual spread) and noisy
//! (spectral flatness) are treated as beat-like; the mean spacing between
//! them gives the BPM. Anything unusable falls back to 120 BPM.

use rayon::prelude::*;

use super::buffer::AudioBuffer;
use super::spectrum::SpectrumAnalyzer;

pub const FALLBACK_BPM: u32 = 120;
pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;

const SPREAD_THRESHOLD: f32 = 0.5;
const FLATNESS_THRESHOLD: f32 = 0.3;
const BARK_BANDS: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoWindow {
    pub perceptual_spread: f32,
    pub spectral_flatness: f32,
}

impl TempoWindow {
    pub fn is_candidate(&self) -> bool {
        self.perceptual_spread > SPREAD_THRESHOLD && self.spectral_flatness > FLATNESS_THRESHOLD
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TempoEstimate {
    /// Always within `MIN_BPM..=MAX_BPM`
    pub bpm: u32,
    /// BPM implied by the candidate spacing, before range checking
    pub raw_bpm: Option<f64>,
    pub candidates: usize,
    pub windows: usize,
}

impl TempoEstimate {
    pub fn fell_back(&self) -> bool {
        !self.raw_bpm.is_some_and(in_range)
    }
}

pub struct TempoEstimator {
    window_size: usize,
    scan_secs: f64,
}

impl TempoEstimator {
    pub fn new(window_size: usize, scan_secs: f64) -> Self {
        Self {
            window_size,
            scan_secs,
        }
    }

    pub fn estimate(&self, buffer: &AudioBuffer) -> TempoEstimate {
        let sample_rate = buffer.sample_rate();
        let scan_samples = ((self.scan_secs.min(buffer.duration())) * sample_rate as f64) as usize;
        let n_windows = scan_samples.div_ceil(self.window_size);
        let window_size = self.window_size;

        let windows: Vec<TempoWindow> = (0..n_windows)
            .into_par_iter()
            .map_init(
                || {
                    (
                        SpectrumAnalyzer::new(window_size),
                        vec![0.0f32; window_size],
                        Vec::with_capacity(window_size / 2),
                    )
                },
                |(spectrum, block, mags), idx| {
                    buffer.read_mono(idx * window_size, block);
                    spectrum.magnitudes(block, mags);
                    TempoWindow {
                        perceptual_spread: perceptual_spread(mags, sample_rate, window_size),
                        spectral_flatness: spectral_flatness(mags),
                    }
                },
            )
            .collect();

        let candidate_indices: Vec<usize> = windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_candidate())
            .map(|(i, _)| i)
            .collect();

        let raw_bpm = bpm_from_indices(&candidate_indices, window_size, sample_rate);
        let bpm = match raw_bpm {
            Some(raw) if in_range(raw) => (raw.round() as u32).clamp(MIN_BPM, MAX_BPM),
            _ => FALLBACK_BPM,
        };

        let estimate = TempoEstimate {
            bpm,
            raw_bpm,
            candidates: candidate_indices.len(),
            windows: windows.len(),
        };
        if estimate.fell_back() {
            log::warn!(
                "Tempo: {} candidates in {} windows, raw estimate {:?}; using {} BPM",
                estimate.candidates, estimate.windows, raw_bpm, FALLBACK_BPM
            );
        } else {
            log::info!(
                "Tempo: {} BPM from {} candidates in {} windows",
                bpm, estimate.candidates, estimate.windows
            );
        }
        estimate
    }
}

fn in_range(bpm: f64) -> bool {
    (MIN_BPM as f64..=MAX_BPM as f64).contains(&bpm)
}

/// Mean gap (in samples) between consecutive candidate windows, as BPM.
fn bpm_from_indices(indices: &[usize], window_size: usize, sample_rate: u32) -> Option<f64> {
    if indices.len() < 2 {
        return None;
    }
    let gaps: Vec<f64> = indices
        .windows(2)
        .map(|w| ((w[1] - w[0]) * window_size) as f64)
        .collect();
    let avg_gap_samples = gaps.iter().sum::<f64>() / gaps.len() as f64;
    Some(60.0 / (avg_gap_samples / sample_rate as f64))
}

/// How evenly loudness is spread over bark bands: 0 when one band holds
/// everything, towards 1 when loudness is spread out.
pub fn perceptual_spread(magnitudes: &[f32], sample_rate: u32, fft_size: usize) -> f32 {
    let n = magnitudes.len();
    if n < 2 {
        return 0.0;
    }
    let bin_hz = sample_rate as f32 / fft_size as f32;
    let bark: Vec<f32> = (0..n)
        .map(|i| {
            let f = i as f32 * bin_hz;
            13.0 * (f / 1315.8).atan() + 3.5 * (f / 7518.0).powi(2).atan()
        })
        .collect();

    // Equal-width bark bands over the spectrum
    let top = bark[n - 1];
    let mut limits = [0usize; BARK_BANDS + 1];
    let mut band = 1;
    let mut band_end = top / BARK_BANDS as f32;
    for (i, &b) in bark.iter().enumerate() {
        while b > band_end && band < BARK_BANDS {
            limits[band] = i;
            band += 1;
            band_end = band as f32 * top / BARK_BANDS as f32;
        }
    }
    for limit in limits.iter_mut().skip(band) {
        *limit = n - 1;
    }
    limits[BARK_BANDS] = n - 1;

    let specific: Vec<f32> = limits
        .windows(2)
        .map(|w| magnitudes[w[0]..w[1]].iter().sum::<f32>().powf(0.23))
        .collect();
    let total: f32 = specific.iter().sum();
    if total <= 1e-10 {
        return 0.0;
    }
    let max = specific.iter().copied().fold(0.0f32, f32::max);
    ((total - max) / total).powi(2)
}

/// Geometric over arithmetic mean of the magnitude spectrum.
pub fn spectral_flatness(magnitudes: &[f32]) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let n = magnitudes.len() as f64;
    let arithmetic = magnitudes.iter().map(|&m| m as f64).sum::<f64>() / n;
    if arithmetic <= 1e-12 {
        return 0.0;
    }
    let log_mean = magnitudes.iter().map(|&m| (m as f64).ln()).sum::<f64>() / n;
    (log_mean.exp() / arithmetic) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn silence_falls_back_to_120() {
        let buf = AudioBuffer::from_mono(44_100, vec![0.0; 44_100 * 3]).unwrap();
        let est = TempoEstimator::new(2048, 10.0).estimate(&buf);
        assert_eq!(est.bpm, FALLBACK_BPM);
        assert_eq!(est.candidates, 0);
        assert!(est.raw_bpm.is_none());
        assert!(est.fell_back());
    }

    #[test]
    fn pure_tone_is_not_a_candidate() {
        let sr = 44_100;
        let tone: Vec<f32> = (0..sr)
            .map(|i| 0.8 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin())
            .collect();
        let buf = AudioBuffer::from_mono(sr, tone).unwrap();
        let est = TempoEstimator::new(2048, 10.0).estimate(&buf);
        assert_eq!(est.candidates, 0);
        assert_eq!(est.bpm, 120);
    }

    #[test]
    fn noise_bursts_give_their_spacing() {
        // 2048-sample windows at 40960 Hz: one noisy window every 10 windows
        // is a gap of 0.5s, i.e. 120 BPM. Use every 12 windows for 100 BPM.
        let sr = 40_960;
        let window = 2048;
        let mut rng = StdRng::seed_from_u64(3);
        let mut samples = vec![0.0f32; window * 60];
        for w in (0..60).step_by(12) {
            for s in &mut samples[w * window..(w + 1) * window] {
                *s = rng.gen_range(-0.8..0.8);
            }
        }
        let buf = AudioBuffer::from_mono(sr, samples).unwrap();
        let est = TempoEstimator::new(window, 10.0).estimate(&buf);
        assert_eq!(est.candidates, 5);
        assert_eq!(est.bpm, 100);
        assert!(!est.fell_back());
    }

    #[test]
    fn continuous_noise_is_out_of_range() {
        let sr = 44_100;
        let mut rng = StdRng::seed_from_u64(9);
        let samples: Vec<f32> = (0..sr * 2).map(|_| rng.gen_range(-0.5..0.5)).collect();
        let buf = AudioBuffer::from_mono(sr, samples).unwrap();
        let est = TempoEstimator::new(2048, 10.0).estimate(&buf);
        assert!(est.candidates > 10);
        assert!(est.raw_bpm.unwrap() > MAX_BPM as f64);
        assert_eq!(est.bpm, FALLBACK_BPM);
    }

    #[test]
    fn bpm_from_indices_averages_gaps() {
        // gaps of 10 and 14 windows at 1024 samples, 48 kHz
        let bpm = bpm_from_indices(&[0, 10, 24], 1024, 48_000).unwrap();
        let expected = 60.0 / (12.0 * 1024.0 / 48_000.0);
        assert!((bpm - expected).abs() < 1e-9);
        assert!(bpm_from_indices(&[5], 1024, 48_000).is_none());
    }

    #[test]
    fn flatness_bounds() {
        assert!((spectral_flatness(&[1.0; 64]) - 1.0).abs() < 1e-6);
        let mut peaky = vec![1e-6f32; 64];
        peaky[3] = 10.0;
        assert!(spectral_flatness(&peaky) < 0.05);
        assert_eq!(spectral_flatness(&[0.0; 8]), 0.0);
    }

    #[test]
    fn spread_of_flat_and_single_band_spectra() {
        let flat = perceptual_spread(&[1.0; 1024], 44_100, 2048);
        assert!(flat > 0.5, "{flat}");
        let mut single = vec![0.0f32; 1024];
        single[10] = 5.0;
        assert_eq!(perceptual_spread(&single, 44_100, 2048), 0.0);
        assert_eq!(perceptual_spread(&[0.0; 1024], 44_100, 2048), 0.0);
    }
}
