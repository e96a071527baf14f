//! The chart: an immutable, time-ordered list of lane notes plus tempo.
//!
//! A `Chart` can only be built through [`Chart::new`] (or deserialized, which
//! goes through the same checks), so every value in circulation satisfies:
//! - notes strictly ascending by time, at least [`MIN_NOTE_GAP`] apart
//! - no three consecutive notes on one lane
//! - tempo within 60..=200 BPM, time signature 4/4

pub mod encoder;
pub mod generate;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::tempo::{MAX_BPM, MIN_BPM};
use crate::error::ChartError;

pub use encoder::ChartEncoder;
pub use generate::{ChartAnalysis, ChartGenerator, Progress};

/// Minimum spacing between any two notes, in seconds.
pub const MIN_NOTE_GAP: f64 = 0.4;

pub const TIME_SIGNATURE: (u8, u8) = (4, 4);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Lane {
    Left = 0,
    Up = 1,
    Down = 2,
    Right = 3,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Left, Lane::Up, Lane::Down, Lane::Right];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl From<Lane> for u8 {
    fn from(lane: Lane) -> u8 {
        lane as u8
    }
}

impl TryFrom<u8> for Lane {
    type Error = ChartError;

    fn try_from(value: u8) -> Result<Self, ChartError> {
        Lane::ALL
            .get(value as usize)
            .copied()
            .ok_or(ChartError::Lane(value))
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lane::Left => "left",
            Lane::Up => "up",
            Lane::Down => "down",
            Lane::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Seconds from the start of the track
    pub time: f64,
    pub lane: Lane,
    /// Seconds
    pub duration: f64,
    /// 0..=127
    pub velocity: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ChartRecord")]
pub struct Chart {
    tempo_bpm: u32,
    time_signature: (u8, u8),
    notes: Vec<Note>,
}

/// Unchecked wire shape; converted into a `Chart` only if it is valid.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartRecord {
    tempo_bpm: u32,
    time_signature: (u8, u8),
    notes: Vec<Note>,
}

impl TryFrom<ChartRecord> for Chart {
    type Error = ChartError;

    fn try_from(record: ChartRecord) -> Result<Self, ChartError> {
        if record.time_signature != TIME_SIGNATURE {
            let (num, den) = record.time_signature;
            return Err(ChartError::TimeSignature(num, den));
        }
        Chart::new(record.tempo_bpm, record.notes)
    }
}

impl Chart {
    pub fn new(tempo_bpm: u32, notes: Vec<Note>) -> Result<Self, ChartError> {
        validate(tempo_bpm, &notes)?;
        Ok(Self {
            tempo_bpm,
            time_signature: TIME_SIGNATURE,
            notes,
        })
    }

    pub fn tempo_bpm(&self) -> u32 {
        self.tempo_bpm
    }

    pub fn time_signature(&self) -> (u8, u8) {
        self.time_signature
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// End of the last note, or 0 for an empty chart.
    pub fn duration(&self) -> f64 {
        self.notes.last().map_or(0.0, |n| n.time + n.duration)
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.tempo_bpm as f64
    }

    pub fn lane_counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for note in &self.notes {
            counts[note.lane.index()] += 1;
        }
        counts
    }
}

fn validate(tempo_bpm: u32, notes: &[Note]) -> Result<(), ChartError> {
    if !(MIN_BPM..=MAX_BPM).contains(&tempo_bpm) {
        return Err(ChartError::TempoOutOfRange(tempo_bpm));
    }
    for (index, note) in notes.iter().enumerate() {
        if !note.time.is_finite() || note.time < 0.0 || !note.duration.is_finite() || note.duration < 0.0 {
            return Err(ChartError::InvalidTime {
                index,
                time: note.time,
            });
        }
        if note.velocity > 127 {
            return Err(ChartError::Velocity {
                index,
                velocity: note.velocity,
            });
        }
    }
    for (index, pair) in notes.windows(2).enumerate() {
        let gap = pair[1].time - pair[0].time;
        if gap <= 0.0 {
            return Err(ChartError::Unsorted {
                index: index + 1,
                time: pair[1].time,
                previous: pair[0].time,
            });
        }
        if gap < MIN_NOTE_GAP {
            return Err(ChartError::GapTooSmall {
                index,
                gap,
                min: MIN_NOTE_GAP,
            });
        }
    }
    if let Some(index) = notes
        .windows(3)
        .position(|w| w[0].lane == w[1].lane && w[1].lane == w[2].lane)
    {
        return Err(ChartError::LaneRun { index });
    }
    Ok(())
}
