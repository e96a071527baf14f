//! Audio-to-chart generation and a deterministic playback/judging engine for
//! a four-lane rhythm game.

pub mod audio;
pub mod chart;
pub mod config;
pub mod engine;
pub mod error;

pub use chart::{Chart, ChartGenerator, Lane, Note};
pub use config::{AnalysisConfig, Config, SessionConfig};
pub use engine::{HitOutcome, RenderState, Session};
pub use error::{AnalysisError, ChartError, ConfigError, SessionError};
