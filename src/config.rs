use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::skin::Skin;
use crate::error::ConfigError;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub skin: Skin,
}

/// Knobs for the audio-to-chart pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Samples per feature frame
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Samples per tempo pre-pass window
    #[serde(default = "default_tempo_window")]
    pub tempo_window: usize,
    /// Seconds scanned by the tempo pre-pass
    #[serde(default = "default_tempo_scan_secs")]
    pub tempo_scan_secs: f64,
    /// Energies kept for the adaptive threshold
    #[serde(default = "default_ring_size")]
    pub ring_size: usize,
    /// Minimum spacing between notes in seconds, any lane
    #[serde(default = "default_min_gap")]
    pub min_gap: f64,
    #[serde(default = "default_snap_to_grid")]
    pub snap_to_grid: bool,
    /// Largest distance (seconds) a note is moved when snapping
    #[serde(default = "default_snap_tolerance")]
    pub snap_tolerance: f64,
    /// Seed for lane choice; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Gameplay timing and playfield geometry. Distances are in playfield units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Units per second a note falls
    #[serde(default = "default_fall_speed")]
    pub fall_speed: f64,
    /// Y of the judge line
    #[serde(default = "default_judge_line")]
    pub judge_line: f64,
    #[serde(default = "default_field_height")]
    pub field_height: f64,
    #[serde(default = "default_note_size")]
    pub note_size: f64,
    #[serde(default = "default_perfect_window")]
    pub perfect_window: f64,
    #[serde(default = "default_good_window")]
    pub good_window: f64,
    /// Outer window; inputs farther than this from every note remove nothing
    #[serde(default = "default_hit_window")]
    pub hit_window: f64,
    #[serde(default = "default_refractory_ms")]
    pub refractory_ms: f64,
    #[serde(default = "default_effect_ttl")]
    pub effect_ttl: f64,
    #[serde(default = "default_key_pulse_ttl")]
    pub key_pulse_ttl: f64,
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,
    /// Points lost when a note scrolls off-screen unhit
    #[serde(default)]
    pub scroll_miss_penalty: u32,
    /// Subtracted from every input instant before judging
    #[serde(default)]
    pub input_offset_ms: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            tempo_window: default_tempo_window(),
            tempo_scan_secs: default_tempo_scan_secs(),
            ring_size: default_ring_size(),
            min_gap: default_min_gap(),
            snap_to_grid: default_snap_to_grid(),
            snap_tolerance: default_snap_tolerance(),
            seed: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fall_speed: default_fall_speed(),
            judge_line: default_judge_line(),
            field_height: default_field_height(),
            note_size: default_note_size(),
            perfect_window: default_perfect_window(),
            good_window: default_good_window(),
            hit_window: default_hit_window(),
            refractory_ms: default_refractory_ms(),
            effect_ttl: default_effect_ttl(),
            key_pulse_ttl: default_key_pulse_ttl(),
            countdown_secs: default_countdown_secs(),
            scroll_miss_penalty: 0,
            input_offset_ms: 0.0,
        }
    }
}

fn default_window_size() -> usize { 512 }
fn default_tempo_window() -> usize { 2048 }
fn default_tempo_scan_secs() -> f64 { 10.0 }
fn default_ring_size() -> usize { 50 }
fn default_min_gap() -> f64 { 0.4 }
fn default_snap_to_grid() -> bool { true }
fn default_snap_tolerance() -> f64 { 0.1 }
fn default_fall_speed() -> f64 { 300.0 }
fn default_judge_line() -> f64 { 500.0 }
fn default_field_height() -> f64 { 600.0 }
fn default_note_size() -> f64 { 40.0 }
fn default_perfect_window() -> f64 { 20.0 }
fn default_good_window() -> f64 { 35.0 }
fn default_hit_window() -> f64 { 50.0 }
fn default_refractory_ms() -> f64 { 150.0 }
fn default_effect_ttl() -> f64 { 0.5 }
fn default_key_pulse_ttl() -> f64 { 0.1 }
fn default_countdown_secs() -> u32 { 3 }

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, size) in [("analysis.window_size", self.window_size), ("analysis.tempo_window", self.tempo_window)] {
            if size < 64 || !size.is_power_of_two() {
                return Err(ConfigError::invalid(field, format!("{size} is not a power of two >= 64")));
            }
        }
        if self.ring_size == 0 {
            return Err(ConfigError::invalid("analysis.ring_size", "must be at least 1"));
        }
        positive("analysis.tempo_scan_secs", self.tempo_scan_secs)?;
        positive("analysis.min_gap", self.min_gap)?;
        non_negative("analysis.snap_tolerance", self.snap_tolerance)?;
        Ok(())
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("session.fall_speed", self.fall_speed)?;
        positive("session.field_height", self.field_height)?;
        non_negative("session.note_size", self.note_size)?;
        if !(0.0..=self.field_height).contains(&self.judge_line) {
            return Err(ConfigError::invalid(
                "session.judge_line",
                format!("{} lies outside the field (0..={})", self.judge_line, self.field_height),
            ));
        }
        positive("session.perfect_window", self.perfect_window)?;
        if !(self.perfect_window < self.good_window && self.good_window < self.hit_window) {
            return Err(ConfigError::invalid(
                "session.good_window",
                format!(
                    "judge windows must ascend: perfect {} < good {} < hit {}",
                    self.perfect_window, self.good_window, self.hit_window
                ),
            ));
        }
        // a late note must stay on the field until it leaves the hit window
        let bottom = self.field_height + self.note_size / 2.0;
        if bottom < self.judge_line + self.hit_window {
            return Err(ConfigError::invalid(
                "session.judge_line",
                format!(
                    "notes leave the field {} units below the judge line, inside the {}-unit hit window",
                    bottom - self.judge_line,
                    self.hit_window
                ),
            ));
        }
        non_negative("session.refractory_ms", self.refractory_ms)?;
        positive("session.effect_ttl", self.effect_ttl)?;
        positive("session.key_pulse_ttl", self.key_pulse_ttl)?;
        if !self.input_offset_ms.is_finite() {
            return Err(ConfigError::invalid("session.input_offset_ms", "must be finite"));
        }
        Ok(())
    }

    pub fn refractory_secs(&self) -> f64 {
        self.refractory_ms / 1000.0
    }

    pub fn input_offset_secs(&self) -> f64 {
        self.input_offset_ms / 1000.0
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} must be > 0")))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} must be >= 0")))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.analysis.window_size, 512);
        assert_eq!(cfg.session.refractory_ms, 150.0);
        assert_eq!(cfg.session.scroll_miss_penalty, 0);
        assert!(cfg.analysis.validate().is_ok());
        assert!(cfg.session.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            "[analysis]\nseed = 7\nsnap_to_grid = false\n\n[session]\nfall_speed = 450.0\n",
        )
        .unwrap();
        assert_eq!(cfg.analysis.seed, Some(7));
        assert!(!cfg.analysis.snap_to_grid);
        assert_eq!(cfg.analysis.tempo_window, 2048);
        assert_eq!(cfg.session.fall_speed, 450.0);
        assert_eq!(cfg.session.hit_window, 50.0);
    }

    #[test]
    fn rejects_non_power_of_two_window() {
        let cfg = AnalysisConfig {
            window_size: 500,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "analysis.window_size", .. })
        ));
    }

    #[test]
    fn rejects_unordered_judge_windows() {
        let cfg = SessionConfig {
            good_window: 60.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_judge_line_off_field() {
        let cfg = SessionConfig {
            judge_line: 900.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_judge_line_too_close_to_bottom() {
        let cfg = SessionConfig {
            judge_line: 600.0,
            note_size: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "session.judge_line", .. })
        ));

        // exactly one hit window of room below the line is enough
        let cfg = SessionConfig {
            judge_line: 570.0,
            note_size: 40.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
