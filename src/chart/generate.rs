use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Chart, ChartEncoder, MIN_NOTE_GAP};
use crate::audio::onset::{filter_candidates, OnsetSelector};
use crate::audio::{AudioBuffer, FeatureExtractor, TempoEstimate, TempoEstimator};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ConfigError};

/// Reported once per analysed feature frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub frame: usize,
    pub total: usize,
}

/// A generated chart plus what the pipeline saw on the way.
#[derive(Clone, Debug)]
pub struct ChartAnalysis {
    pub chart: Chart,
    pub tempo: TempoEstimate,
    pub frames: usize,
    pub candidates: usize,
    pub selected: usize,
}

pub struct ChartGenerator {
    config: AnalysisConfig,
}

impl ChartGenerator {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        if config.min_gap < MIN_NOTE_GAP {
            return Err(ConfigError::invalid(
                "analysis.min_gap",
                format!("{} is below the chart minimum of {}s", config.min_gap, MIN_NOTE_GAP),
            )
            .into());
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Lane-choice source: seeded from the config, else from entropy.
    pub fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn generate(&self, buffer: &AudioBuffer) -> Result<Chart, AnalysisError> {
        self.analyze(buffer, &mut self.rng(), |_| Ok(())).map(|a| a.chart)
    }

    /// Runs the whole pipeline in one forward pass over `buffer`.
    ///
    /// `observer` sees every feature frame; an error from it cancels the
    /// analysis and is returned as-is. No partial chart is produced.
    pub fn analyze<R, F>(
        &self,
        buffer: &AudioBuffer,
        rng: &mut R,
        mut observer: F,
    ) -> Result<ChartAnalysis, AnalysisError>
    where
        R: Rng,
        F: FnMut(Progress) -> Result<(), AnalysisError>,
    {
        let cfg = &self.config;
        let tempo = TempoEstimator::new(cfg.tempo_window, cfg.tempo_scan_secs).estimate(buffer);

        let extractor = FeatureExtractor::new(cfg.window_size)?;
        let total = extractor.frame_count(buffer);
        log::info!(
            "Extracting features: {} frames of {} samples ({:.1}s)",
            total,
            cfg.window_size,
            buffer.duration()
        );

        let mut selector = OnsetSelector::new(cfg.ring_size);
        for (index, frame) in extractor.frames(buffer).enumerate() {
            selector.push(index, frame);
            observer(Progress { frame: index + 1, total })?;
        }

        let pool = selector.into_candidates();
        let selected = filter_candidates(&pool, tempo.bpm);
        log::info!("Onsets: {} candidates, {} kept after filtering", pool.len(), selected.len());

        let snap = cfg.snap_to_grid.then_some(cfg.snap_tolerance);
        let note_duration = cfg.window_size as f64 / buffer.sample_rate() as f64;
        let chart = ChartEncoder::new(cfg.min_gap, snap, note_duration)
            .encode(&pool, &selected, tempo.bpm, rng)?;

        if chart.is_empty() {
            log::warn!("No onsets survived filtering; chart has no notes");
        }

        Ok(ChartAnalysis {
            chart,
            tempo,
            frames: total,
            candidates: pool.len(),
            selected: selected.len(),
        })
    }
}
