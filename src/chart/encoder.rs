use rand::Rng;

use super::{Chart, Lane, Note};
use crate::audio::onset::Candidate;
use crate::error::ChartError;

/// Energy cut points of the candidate pool, nearest-rank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergyPercentiles {
    pub p25: f32,
    pub p50: f32,
    pub p75: f32,
    pub p90: f32,
}

impl EnergyPercentiles {
    pub fn from_candidates(pool: &[Candidate]) -> Option<Self> {
        if pool.is_empty() {
            return None;
        }
        let mut energies: Vec<f32> = pool.iter().map(Candidate::energy).collect();
        energies.sort_by(f32::total_cmp);
        let at = |p: f64| energies[(p * (energies.len() - 1) as f64).round() as usize];
        Some(Self {
            p25: at(0.25),
            p50: at(0.50),
            p75: at(0.75),
            p90: at(0.90),
        })
    }

    /// Louder onsets go up and right, quieter ones down and left.
    pub fn pick<R: Rng>(&self, energy: f32, rng: &mut R) -> Lane {
        let either = |a: Lane, b: Lane, rng: &mut R| if rng.gen_bool(0.5) { a } else { b };
        if energy >= self.p90 {
            Lane::Up
        } else if energy >= self.p75 {
            either(Lane::Up, Lane::Right, rng)
        } else if energy >= self.p50 {
            either(Lane::Right, Lane::Down, rng)
        } else if energy >= self.p25 {
            either(Lane::Down, Lane::Left, rng)
        } else {
            Lane::Left
        }
    }
}

pub struct ChartEncoder {
    min_gap: f64,
    snap_tolerance: Option<f64>,
    note_duration: f64,
}

impl ChartEncoder {
    /// `snap_tolerance` of `None` keeps raw onset times.
    pub fn new(min_gap: f64, snap_tolerance: Option<f64>, note_duration: f64) -> Self {
        Self {
            min_gap,
            snap_tolerance,
            note_duration,
        }
    }

    /// Turns filtered candidates into a chart. `pool` is the unfiltered
    /// candidate set that lane percentiles are measured against.
    pub fn encode<R: Rng>(
        &self,
        pool: &[Candidate],
        selected: &[Candidate],
        bpm: u32,
        rng: &mut R,
    ) -> Result<Chart, ChartError> {
        let Some(percentiles) = EnergyPercentiles::from_candidates(pool) else {
            return Chart::new(bpm, Vec::new());
        };

        let mut notes: Vec<Note> = Vec::with_capacity(selected.len());
        for candidate in selected {
            let time = self.placed_time(candidate.time(), bpm);
            if let Some(last) = notes.last() {
                if time - last.time < self.min_gap {
                    continue;
                }
            }

            let mut lane = percentiles.pick(candidate.energy(), rng);
            if let Some(prev) = notes.last().map(|n| n.lane) {
                if lane == prev {
                    lane = redraw_excluding(prev, rng);
                }
            }

            notes.push(Note {
                time,
                lane,
                duration: self.note_duration,
                velocity: velocity(candidate.rms(), candidate.energy()),
            });
        }

        log::info!(
            "Encoded {} notes from {} selected candidates at {} BPM",
            notes.len(),
            selected.len(),
            bpm
        );
        Chart::new(bpm, notes)
    }

    fn placed_time(&self, time: f64, bpm: u32) -> f64 {
        match self.snap_tolerance {
            Some(tolerance) => snap_to_quarter_beat(time, bpm, tolerance),
            None => time,
        }
    }
}

/// Moves `time` onto the nearest quarter beat when that is closer than `tolerance` seconds.
pub fn snap_to_quarter_beat(time: f64, bpm: u32, tolerance: f64) -> f64 {
    let quarter = 60.0 / bpm as f64 / 4.0;
    let snapped = (time / quarter).round() * quarter;
    if (snapped - time).abs() < tolerance {
        snapped.max(0.0)
    } else {
        time
    }
}

fn redraw_excluding<R: Rng>(lane: Lane, rng: &mut R) -> Lane {
    let others: Vec<Lane> = Lane::ALL.into_iter().filter(|&l| l != lane).collect();
    others[rng.gen_range(0..others.len())]
}

pub fn velocity(rms: f32, energy: f32) -> u8 {
    (rms * energy * 127.0).clamp(0.0, 127.0) as u8
}
