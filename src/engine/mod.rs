//! Playback and judging: a tick-driven clock, per-lane input judging and the
//! session state a renderer draws from.

pub mod autoplay;
pub mod clock;
pub mod judge;
pub mod session;
pub mod skin;

pub use autoplay::{Autoplay, SimulationReport};
pub use clock::{ClockState, PlaybackClock};
pub use judge::{JudgeWindows, Judgement, Scoreboard};
pub use session::{EffectKind, Hit, HitEffect, HitOutcome, NotePosition, RenderState, Session};
pub use skin::{Colour, NoteShape, Skin};
