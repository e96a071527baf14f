use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Hann-windowed magnitude spectrum over fixed-size blocks. Holds its FFT
/// plan and scratch so repeated calls do not allocate.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(size),
            window: hann_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
        }
    }

    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Writes the `size / 2` magnitude bins of `block` into `out`.
    pub fn magnitudes(&mut self, block: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(block.len(), self.window.len());
        for ((slot, &s), &w) in self.buffer.iter_mut().zip(block).zip(&self.window) {
            *slot = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let half = self.window.len() / 2;
        out.clear();
        out.extend(self.buffer[..half].iter().map(|c| c.norm()));
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peaks_at_its_bin() {
        let size = 1024;
        let sr = 8_192.0f32;
        // 8 Hz per bin, 800 Hz lands on bin 100
        let block: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * 800.0 * i as f32 / sr).sin())
            .collect();
        let mut analyzer = SpectrumAnalyzer::new(size);
        let mut mags = Vec::new();
        analyzer.magnitudes(&block, &mut mags);
        assert_eq!(mags.len(), size / 2);
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 100);
    }

    #[test]
    fn hann_is_zero_at_edges() {
        let w = hann_window(16);
        assert!(w[0].abs() < 1e-6);
        assert!(w[15].abs() < 1e-6);
        assert!(w.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }
}
