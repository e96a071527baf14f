use thiserror::Error;

/// Failures while turning audio into a chart. Generation never returns a
/// partial chart: any of these rejects the whole call.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Failed to read audio source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid audio buffer: {0}")]
    InvalidBuffer(String),

    #[error("Non-finite sample at channel {channel}, index {index}")]
    NonFiniteSample { channel: usize, index: usize },

    #[error("Invalid analysis window of {0} samples (must be a power of two >= 64)")]
    InvalidWindow(usize),

    #[error("Analysis cancelled at frame {frame}")]
    Cancelled { frame: usize },

    #[error("Analysis observer failed: {0}")]
    Observer(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chart(#[from] ChartError),
}

/// A chart value that breaks one of the chart invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("Tempo {0} BPM outside 60..=200")]
    TempoOutOfRange(u32),

    #[error("Unsupported time signature {0}/{1}")]
    TimeSignature(u8, u8),

    #[error("Note {index} has invalid time {time}")]
    InvalidTime { index: usize, time: f64 },

    #[error("Note {index} at {time:.3}s is not after the previous note at {previous:.3}s")]
    Unsorted { index: usize, time: f64, previous: f64 },

    #[error("Notes {index} and {} are {gap:.3}s apart (minimum {min:.3}s)", index + 1)]
    GapTooSmall { index: usize, gap: f64, min: f64 },

    #[error("Notes {index}..={} share one lane", index + 2)]
    LaneRun { index: usize },

    #[error("Note {index} has velocity {velocity} above 127")]
    Velocity { index: usize, velocity: u8 },

    #[error("Lane index {0} outside 0..=3")]
    Lane(u8),
}

/// Failures of a running game session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Chart has no notes to play")]
    EmptyChart,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("Non-finite timestamp {0}")]
    InvalidTimestamp(f64),

    #[error("Session loop has faulted; restart the session")]
    Faulted,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Invalid colour {value:?} for {field} (expected #RRGGBB)")]
    Colour { field: &'static str, value: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
