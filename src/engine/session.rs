use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use super::clock::{ClockState, PlaybackClock};
use super::judge::{nearest_note, JudgeWindows, Judgement, Refractory, Scoreboard};
use super::skin::Skin;
use crate::chart::{Chart, Lane, Note};
use crate::config::SessionConfig;
use crate::error::SessionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Judged(Judgement),
    /// Key-down feedback for an input that was not judged
    KeyPulse,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitEffect {
    pub lane: Lane,
    /// Song time the effect appeared
    pub start_time: f64,
    pub kind: EffectKind,
    pub ttl: f64,
}

impl HitEffect {
    fn expired(&self, song_time: f64) -> bool {
        song_time - self.start_time >= self.ttl
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    pub judgement: Judgement,
    pub lane: Lane,
    /// The note consumed by this input, if one was inside the hit window
    pub note: Option<Note>,
    pub distance: Option<f64>,
    /// Change actually applied to the score
    pub delta: i64,
    pub score: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "outcome")]
pub enum HitOutcome {
    /// Session not running
    Ignored,
    /// Inside the lane's refractory window; only a key pulse is shown
    Suppressed,
    Judged(Hit),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NotePosition {
    pub lane: Lane,
    pub time: f64,
    /// Centre of the note; the judge line sits at `SessionConfig::judge_line`
    pub y: f64,
}

/// Snapshot handed to the renderer after each tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    pub state: ClockState,
    pub clock_time: f64,
    pub countdown: Option<u32>,
    pub notes: Vec<NotePosition>,
    pub score: u64,
    pub combo: u32,
    pub effects: Vec<HitEffect>,
}

/// One play-through of a chart.
///
/// All mutation goes through `tick` and `handle_input`, both called from the
/// game loop's thread with a monotonic wall-clock instant in seconds.
pub struct Session {
    chart: Arc<Chart>,
    config: SessionConfig,
    skin: Skin,
    windows: JudgeWindows,
    clock: PlaybackClock,
    pending: VecDeque<Note>,
    effects: Vec<HitEffect>,
    scoreboard: Scoreboard,
    refractory: Refractory,
    faulted: bool,
}

impl Session {
    pub fn new(
        chart: impl Into<Arc<Chart>>,
        config: SessionConfig,
        skin: Skin,
    ) -> Result<Self, SessionError> {
        let chart = chart.into();
        if chart.is_empty() {
            return Err(SessionError::EmptyChart);
        }
        config.validate()?;
        skin.validate()?;

        Ok(Self {
            windows: JudgeWindows::from_config(&config),
            clock: PlaybackClock::new(config.countdown_secs),
            pending: chart.notes().iter().copied().collect(),
            effects: Vec::new(),
            scoreboard: Scoreboard::default(),
            refractory: Refractory::new(config.refractory_secs()),
            faulted: false,
            chart,
            config,
            skin,
        })
    }

    pub fn start(&mut self, now: f64) -> bool {
        if self.faulted || !now.is_finite() {
            return false;
        }
        let started = self.clock.start(now);
        if started {
            log::info!(
                "Session started: {} notes, {}s countdown",
                self.pending.len(),
                self.config.countdown_secs
            );
        }
        started
    }

    /// Advances the clock, retires notes that scrolled off-screen and expired
    /// effects, then returns what to draw.
    ///
    /// A non-finite `now` faults the session; every later tick returns
    /// [`SessionError::Faulted`] until [`Session::restart`].
    pub fn tick(&mut self, now: f64) -> Result<RenderState, SessionError> {
        if self.faulted {
            return Err(SessionError::Faulted);
        }
        if !now.is_finite() {
            self.faulted = true;
            self.clock.stop();
            log::error!("Session faulted on timestamp {now}");
            return Err(SessionError::InvalidTimestamp(now));
        }

        let song_time = self.clock.advance(now);
        if self.clock.is_running() {
            self.retire_scrolled(song_time);
            self.effects.retain(|e| !e.expired(song_time));
            if self.pending.is_empty() && self.effects.is_empty() {
                self.clock.complete();
                log::info!(
                    "Session complete: score {} (max combo {})",
                    self.scoreboard.score,
                    self.scoreboard.max_combo
                );
            }
        }

        Ok(RenderState {
            state: self.clock.state(),
            clock_time: song_time,
            countdown: self.clock.countdown_remaining(now),
            notes: self.visible_notes(song_time),
            score: self.scoreboard.score,
            combo: self.scoreboard.combo,
            effects: self.effects.clone(),
        })
    }

    pub fn handle_input(&mut self, lane: Lane, now: f64) -> HitOutcome {
        if self.faulted || !self.clock.is_running() || !now.is_finite() {
            return HitOutcome::Ignored;
        }
        let effect_time = self.clock.time_at(now);

        if !self.refractory.admit(lane, now) {
            self.effects.push(HitEffect {
                lane,
                start_time: effect_time,
                kind: EffectKind::KeyPulse,
                ttl: self.config.key_pulse_ttl,
            });
            return HitOutcome::Suppressed;
        }

        let judged_at = effect_time - self.config.input_offset_secs();
        let matched = nearest_note(
            &self.pending,
            lane,
            judged_at,
            self.config.fall_speed,
            self.windows.hit,
        );
        let (judgement, note, distance) = match matched {
            Some((index, distance)) => {
                let judgement = self.windows.classify(distance).unwrap_or(Judgement::Miss);
                (judgement, self.pending.remove(index), Some(distance))
            }
            None => (Judgement::Miss, None, None),
        };

        let delta = self.scoreboard.record(judgement);
        self.effects.push(HitEffect {
            lane,
            start_time: effect_time,
            kind: EffectKind::Judged(judgement),
            ttl: self.config.effect_ttl,
        });
        log::debug!(
            "{lane} at {judged_at:.3}s: {judgement:?} (distance {distance:?}, {delta:+})"
        );

        HitOutcome::Judged(Hit {
            judgement,
            lane,
            note,
            distance,
            delta,
            score: self.scoreboard.score,
        })
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    /// Fresh play-through of the same chart, back in IDLE.
    pub fn restart(&mut self) {
        self.clock = PlaybackClock::new(self.config.countdown_secs);
        self.pending = self.chart.notes().iter().copied().collect();
        self.effects.clear();
        self.scoreboard = Scoreboard::default();
        self.refractory = Refractory::new(self.config.refractory_secs());
        self.faulted = false;
    }

    pub fn state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn clock_time(&self) -> f64 {
        self.clock.time()
    }

    pub fn score(&self) -> u64 {
        self.scoreboard.score
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn pending(&self) -> &VecDeque<Note> {
        &self.pending
    }

    pub fn effects(&self) -> &[HitEffect] {
        &self.effects
    }

    pub fn chart(&self) -> &Arc<Chart> {
        &self.chart
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn skin(&self) -> &Skin {
        &self.skin
    }

    fn note_y(&self, note: &Note, song_time: f64) -> f64 {
        self.config.judge_line - (note.time - song_time) * self.config.fall_speed
    }

    fn retire_scrolled(&mut self, song_time: f64) {
        let half = self.config.note_size / 2.0;
        while let Some(front) = self.pending.front() {
            if self.note_y(front, song_time) - half <= self.config.field_height {
                break;
            }
            let delta = self
                .scoreboard
                .record_scrolled_past(self.config.scroll_miss_penalty);
            log::debug!("{} note at {:.3}s scrolled past ({delta:+})", front.lane, front.time);
            self.pending.pop_front();
        }
    }

    fn visible_notes(&self, song_time: f64) -> Vec<NotePosition> {
        let half = self.config.note_size / 2.0;
        self.pending
            .iter()
            .map(|n| NotePosition {
                lane: n.lane,
                time: n.time,
                y: self.note_y(n, song_time),
            })
            // pending is time-ordered, so y only decreases from here
            .take_while(|p| p.y + half >= 0.0)
            .filter(|p| p.y - half <= self.config.field_height)
            .collect()
    }
}
