use crate::error::AnalysisError;

/// Decoded PCM audio, one sample vector per channel. Read-only once built.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidBuffer("sample rate is zero".into()));
        }
        let Some(first) = channels.first() else {
            return Err(AnalysisError::InvalidBuffer("no channels".into()));
        };
        let len = first.len();
        if let Some(bad) = channels.iter().position(|c| c.len() != len) {
            return Err(AnalysisError::InvalidBuffer(format!(
                "channel {} has {} samples, channel 0 has {}",
                bad,
                channels[bad].len(),
                len
            )));
        }
        for (channel, samples) in channels.iter().enumerate() {
            if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
                return Err(AnalysisError::NonFiniteSample { channel, index });
            }
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn from_mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self, AnalysisError> {
        Self::new(sample_rate, vec![samples])
    }

    /// Splits interleaved samples into channels.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        interleaved: &[f32],
    ) -> Result<Self, AnalysisError> {
        if channel_count == 0 {
            return Err(AnalysisError::InvalidBuffer("no channels".into()));
        }
        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Mean across channels at sample `index`.
    #[inline]
    pub fn mono_sample(&self, index: usize) -> f32 {
        if self.channels.len() == 1 {
            return self.channels[0][index];
        }
        self.channels.iter().map(|c| c[index]).sum::<f32>() / self.channels.len() as f32
    }

    /// Copies `out.len()` mono samples starting at `start`, zero-filling past the end.
    pub fn read_mono(&self, start: usize, out: &mut [f32]) {
        let available = self.len().saturating_sub(start).min(out.len());
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = if i < available { self.mono_sample(start + i) } else { 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_channels() {
        let err = AudioBuffer::new(44_100, vec![vec![0.0; 4], vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidBuffer(_)));
    }

    #[test]
    fn rejects_nan() {
        let err = AudioBuffer::from_mono(8_000, vec![0.0, f32::NAN]).unwrap_err();
        assert!(matches!(err, AnalysisError::NonFiniteSample { channel: 0, index: 1 }));
    }

    #[test]
    fn interleaved_split_and_mixdown() {
        let buf = AudioBuffer::from_interleaved(10, 2, &[1.0, 0.0, 0.5, 0.5, -1.0, 1.0]).unwrap();
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.channel(0).unwrap(), &[1.0, 0.5, -1.0]);
        assert_eq!(buf.mono_sample(0), 0.5);
        assert_eq!(buf.mono_sample(2), 0.0);
        assert!((buf.duration() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn read_mono_pads_with_zeros() {
        let buf = AudioBuffer::from_mono(10, vec![1.0, 2.0, 3.0]).unwrap();
        let mut out = [9.0; 4];
        buf.read_mono(1, &mut out);
        assert_eq!(out, [2.0, 3.0, 0.0, 0.0]);
    }
}
