use serde::{Deserialize, Serialize};

use super::buffer::AudioBuffer;
use super::spectrum::SpectrumAnalyzer;
use crate::error::AnalysisError;

/// Signal features of one analysis window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Window start in seconds
    pub time: f64,
    /// Root-mean-square amplitude
    pub rms: f32,
    /// Sum of squared samples
    pub energy: f32,
    /// Power-weighted mean frequency (Hz)
    pub spectral_centroid: f32,
    /// Sign changes per sample
    pub zero_crossing_rate: f32,
}

pub struct FeatureExtractor {
    window_size: usize,
}

impl FeatureExtractor {
    pub fn new(window_size: usize) -> Result<Self, AnalysisError> {
        if window_size < 64 || !window_size.is_power_of_two() {
            return Err(AnalysisError::InvalidWindow(window_size));
        }
        Ok(Self { window_size })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of frames `frames` will yield: the final partial window is
    /// zero-padded, so this is `ceil(len / window_size)`.
    pub fn frame_count(&self, buffer: &AudioBuffer) -> usize {
        buffer.len().div_ceil(self.window_size)
    }

    /// Forward-only pass over `buffer`. Calling again restarts from the top.
    pub fn frames<'a>(&self, buffer: &'a AudioBuffer) -> FeatureFrames<'a> {
        FeatureFrames {
            buffer,
            index: 0,
            total: self.frame_count(buffer),
            block: vec![0.0; self.window_size],
            magnitudes: Vec::with_capacity(self.window_size / 2),
            spectrum: SpectrumAnalyzer::new(self.window_size),
        }
    }
}

pub struct FeatureFrames<'a> {
    buffer: &'a AudioBuffer,
    index: usize,
    total: usize,
    block: Vec<f32>,
    magnitudes: Vec<f32>,
    spectrum: SpectrumAnalyzer,
}

impl Iterator for FeatureFrames<'_> {
    type Item = FeatureFrame;

    fn next(&mut self) -> Option<FeatureFrame> {
        if self.index >= self.total {
            return None;
        }
        let size = self.block.len();
        let start = self.index * size;
        self.buffer.read_mono(start, &mut self.block);
        self.spectrum.magnitudes(&self.block, &mut self.magnitudes);

        let energy: f32 = self.block.iter().map(|s| s * s).sum();
        let sample_rate = self.buffer.sample_rate();
        let frame = FeatureFrame {
            time: start as f64 / sample_rate as f64,
            rms: (energy / size as f32).sqrt(),
            energy,
            spectral_centroid: spectral_centroid(&self.magnitudes, sample_rate, size),
            zero_crossing_rate: zero_crossing_rate(&self.block),
        };
        self.index += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for FeatureFrames<'_> {}

fn spectral_centroid(magnitudes: &[f32], sample_rate: u32, fft_size: usize) -> f32 {
    let bin_hz = sample_rate as f32 / fft_size as f32;
    let mut weighted = 0.0f32;
    let mut total = 0.0f32;
    for (i, &mag) in magnitudes.iter().enumerate() {
        let power = mag * mag;
        weighted += i as f32 * bin_hz * power;
        total += power;
    }
    if total > 1e-10 {
        weighted / total
    } else {
        0.0
    }
}

fn zero_crossing_rate(block: &[f32]) -> f32 {
    let crossings = block
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / block.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amp: f32, sr: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn frame_count_rounds_up() {
        let ex = FeatureExtractor::new(512).unwrap();
        let buf = AudioBuffer::from_mono(44_100, vec![0.0; 1025]).unwrap();
        assert_eq!(ex.frame_count(&buf), 3);
        assert_eq!(ex.frames(&buf).count(), 3);
        assert_eq!(ex.frames(&buf).len(), 3);
    }

    #[test]
    fn rejects_bad_window() {
        assert!(matches!(FeatureExtractor::new(500), Err(AnalysisError::InvalidWindow(500))));
        assert!(FeatureExtractor::new(32).is_err());
    }

    #[test]
    fn frame_times_step_by_window() {
        let ex = FeatureExtractor::new(512).unwrap();
        let buf = AudioBuffer::from_mono(1024, vec![0.0; 2048]).unwrap();
        let times: Vec<f64> = ex.frames(&buf).map(|f| f.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn constant_signal_energy_and_rms() {
        let ex = FeatureExtractor::new(64).unwrap();
        let buf = AudioBuffer::from_mono(8_000, vec![0.5; 64]).unwrap();
        let frame = ex.frames(&buf).next().unwrap();
        assert!((frame.energy - 16.0).abs() < 1e-4);
        assert!((frame.rms - 0.5).abs() < 1e-6);
        assert_eq!(frame.zero_crossing_rate, 0.0);
    }

    #[test]
    fn sine_centroid_and_zcr() {
        let sr = 16_000;
        let ex = FeatureExtractor::new(1024).unwrap();
        let buf = AudioBuffer::from_mono(sr, sine(1_000.0, 0.8, sr, 1024)).unwrap();
        let frame = ex.frames(&buf).next().unwrap();
        assert!((frame.spectral_centroid - 1_000.0).abs() < 50.0, "{}", frame.spectral_centroid);
        // two crossings per cycle, 1000 cycles/s over 16000 samples/s
        assert!((frame.zero_crossing_rate - 0.125).abs() < 0.01);
        assert!((frame.rms - 0.8 / 2f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn silence_has_zero_features() {
        let ex = FeatureExtractor::new(512).unwrap();
        let buf = AudioBuffer::from_mono(44_100, vec![0.0; 512]).unwrap();
        let frame = ex.frames(&buf).next().unwrap();
        assert_eq!(frame.energy, 0.0);
        assert_eq!(frame.spectral_centroid, 0.0);
    }

    #[test]
    fn pass_is_restartable() {
        let ex = FeatureExtractor::new(256).unwrap();
        let buf = AudioBuffer::from_mono(8_000, sine(440.0, 0.3, 8_000, 3_000)).unwrap();
        let a: Vec<FeatureFrame> = ex.frames(&buf).collect();
        let b: Vec<FeatureFrame> = ex.frames(&buf).collect();
        assert_eq!(a, b);
    }
}
