use std::collections::VecDeque;

use super::features::FeatureFrame;

const THRESHOLD_MULTIPLIER: f32 = 1.5;
const MIN_CANDIDATE_RMS: f32 = 0.15;
const STRONG_RMS: f32 = 0.2;
const STRONG_ENERGY_RATIO: f32 = 1.3;
const PEAK_RATIO: f32 = 1.1;
const GRID_TOLERANCE_BEATS: f64 = 0.1;

/// A feature frame that cleared the adaptive energy threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub frame: FeatureFrame,
    /// Index of the source frame in the feature pass
    pub frame_index: usize,
    /// Threshold in force when the frame was accepted
    pub threshold: f32,
}

impl Candidate {
    pub fn time(&self) -> f64 {
        self.frame.time
    }

    pub fn energy(&self) -> f32 {
        self.frame.energy
    }

    pub fn rms(&self) -> f32 {
        self.frame.rms
    }
}

/// Rolling mean of the last `capacity` energies, scaled by 1.5.
pub struct AdaptiveThreshold {
    history: VecDeque<f32>,
    capacity: usize,
    sum: f64,
}

impl AdaptiveThreshold {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Records `energy` and returns the threshold including it.
    pub fn push(&mut self, energy: f32) -> f32 {
        if self.history.len() == self.capacity {
            if let Some(old) = self.history.pop_front() {
                self.sum -= old as f64;
            }
        }
        self.history.push_back(energy);
        self.sum += energy as f64;
        let mean = (self.sum / self.history.len() as f64).max(0.0);
        mean as f32 * THRESHOLD_MULTIPLIER
    }
}

/// Streaming candidate pool: fed one frame at a time during the feature pass.
pub struct OnsetSelector {
    threshold: AdaptiveThreshold,
    candidates: Vec<Candidate>,
}

impl OnsetSelector {
    pub fn new(ring_size: usize) -> Self {
        Self {
            threshold: AdaptiveThreshold::new(ring_size),
            candidates: Vec::new(),
        }
    }

    pub fn push(&mut self, frame_index: usize, frame: FeatureFrame) -> Option<&Candidate> {
        let threshold = self.threshold.push(frame.energy);
        if frame.energy > threshold && frame.rms > MIN_CANDIDATE_RMS {
            self.candidates.push(Candidate {
                frame,
                frame_index,
                threshold,
            });
            self.candidates.last()
        } else {
            None
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// Keeps candidates that are locally prominent or sit on the beat grid.
/// The first and last candidates have no neighbours and are never kept.
pub fn filter_candidates(candidates: &[Candidate], bpm: u32) -> Vec<Candidate> {
    if candidates.len() < 3 {
        return Vec::new();
    }
    let avg_energy =
        candidates.iter().map(|c| c.energy() as f64).sum::<f64>() / candidates.len() as f64;
    let avg_energy = avg_energy as f32;

    candidates
        .windows(3)
        .filter_map(|w| {
            let (prev, cur, next) = (&w[0], &w[1], &w[2]);
            let strong = cur.rms() > STRONG_RMS || cur.energy() > avg_energy * STRONG_ENERGY_RATIO;
            let peak = cur.energy() > prev.energy() * PEAK_RATIO
                && cur.energy() > next.energy() * PEAK_RATIO;
            let keep = (peak && strong) || (strong && near_beat_grid(cur.time(), bpm));
            keep.then_some(*cur)
        })
        .collect()
}

/// True when `time` is within 0.1 beat of the nearest quarter beat.
pub fn near_beat_grid(time: f64, bpm: u32) -> bool {
    let beats = time * bpm as f64 / 60.0;
    let quarter = (beats * 4.0).round() / 4.0;
    (quarter - beats).abs() < GRID_TOLERANCE_BEATS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(time: f64, rms: f32, energy: f32) -> FeatureFrame {
        FeatureFrame {
            time,
            rms,
            energy,
            spectral_centroid: 0.0,
            zero_crossing_rate: 0.0,
        }
    }

    fn candidate(time: f64, rms: f32, energy: f32) -> Candidate {
        Candidate {
            frame: frame(time, rms, energy),
            frame_index: 0,
            threshold: 0.0,
        }
    }

    #[test]
    fn threshold_is_scaled_rolling_mean() {
        let mut t = AdaptiveThreshold::new(3);
        assert_eq!(t.push(2.0), 3.0);
        assert_eq!(t.push(4.0), 4.5);
        assert_eq!(t.push(6.0), 6.0);
        // 2.0 drops out
        assert_eq!(t.push(8.0), 9.0);
    }

    #[test]
    fn spike_after_silence_becomes_candidate() {
        let mut sel = OnsetSelector::new(50);
        for i in 0..20 {
            assert!(sel.push(i, frame(i as f64 * 0.01, 0.0, 0.0)).is_none());
        }
        let c = sel.push(20, frame(0.2, 0.5, 10.0)).copied();
        assert_eq!(c.map(|c| c.frame_index), Some(20));
        assert_eq!(sel.candidates().len(), 1);
    }

    #[test]
    fn quiet_spike_is_rejected() {
        let mut sel = OnsetSelector::new(50);
        sel.push(0, frame(0.0, 0.0, 0.0));
        // above the energy threshold but rms too low
        assert!(sel.push(1, frame(0.01, 0.1, 5.0)).is_none());
    }

    #[test]
    fn steady_level_never_triggers() {
        let mut sel = OnsetSelector::new(50);
        for i in 0..200 {
            sel.push(i, frame(i as f64 * 0.01, 0.5, 4.0));
        }
        assert!(sel.into_candidates().is_empty());
    }

    #[test]
    fn grid_check_at_120_bpm() {
        // quarter beats every 0.125s at 120 BPM, tolerance 0.05s
        assert!(near_beat_grid(1.0, 120));
        assert!(near_beat_grid(1.04, 120));
        assert!(!near_beat_grid(1.06, 120));
        assert!(near_beat_grid(1.08, 120));
    }

    #[test]
    fn filter_drops_ends_and_weak_offgrid() {
        // 120 BPM grid: 0.0, 0.125, 0.25 ...
        let pool = vec![
            candidate(0.0, 0.9, 50.0),   // first: dropped
            candidate(0.5, 0.25, 10.0),  // strong, on grid
            candidate(0.56, 0.16, 1.0),  // weak, off grid
            candidate(0.81, 0.18, 40.0), // energetic peak, off grid
            candidate(1.06, 0.25, 5.0),  // strong rms, off grid, not a peak
            candidate(2.0, 0.9, 50.0),   // last: dropped
        ];
        let kept: Vec<f64> = filter_candidates(&pool, 120).iter().map(|c| c.time()).collect();
        assert_eq!(kept, vec![0.5, 0.81]);
    }

    #[test]
    fn filter_needs_three_candidates() {
        let pool = vec![candidate(0.0, 0.9, 5.0), candidate(0.5, 0.9, 9.0)];
        assert!(filter_candidates(&pool, 120).is_empty());
    }
}
