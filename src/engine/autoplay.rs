use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use super::clock::ClockState;
use super::judge::Scoreboard;
use super::session::Session;
use super::skin::Skin;
use crate::chart::{Chart, Lane};
use crate::config::SessionConfig;
use crate::error::{ConfigError, SessionError};

/// A scripted player: presses every note it does not decide to miss,
/// off by a uniformly random amount within `jitter_ms`.
#[derive(Debug, Clone)]
pub struct Autoplay {
    pub seed: u64,
    pub jitter_ms: f64,
    /// Chance (0..=1) of skipping a note entirely
    pub miss_rate: f64,
    /// Scheduler ticks per second
    pub fps: u32,
}

impl Default for Autoplay {
    fn default() -> Self {
        Self {
            seed: 0,
            jitter_ms: 0.0,
            miss_rate: 0.0,
            fps: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub state: ClockState,
    pub notes: usize,
    pub ticks: u64,
    pub song_time: f64,
    #[serde(flatten)]
    pub scoreboard: Scoreboard,
}

impl SimulationReport {
    /// Share of chart notes hit as perfect or good.
    pub fn accuracy(&self) -> f64 {
        if self.notes == 0 {
            return 0.0;
        }
        (self.scoreboard.perfect + self.scoreboard.good) as f64 / self.notes as f64
    }
}

struct Press {
    lane: Lane,
    at: f64,
}

impl Autoplay {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::invalid("autoplay.fps", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.miss_rate) {
            return Err(ConfigError::invalid(
                "autoplay.miss_rate",
                format!("{} outside 0..=1", self.miss_rate),
            ));
        }
        if !(self.jitter_ms.is_finite() && self.jitter_ms >= 0.0) {
            return Err(ConfigError::invalid(
                "autoplay.jitter_ms",
                format!("{} must be >= 0", self.jitter_ms),
            ));
        }
        Ok(())
    }

    /// Plays `chart` start to finish on simulated wall-clock time.
    pub fn run(
        &self,
        chart: Arc<Chart>,
        config: SessionConfig,
        skin: Skin,
    ) -> Result<SimulationReport, SessionError> {
        self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let lead_in = config.countdown_secs as f64;
        let jitter = self.jitter_ms / 1000.0;
        let travel = config.field_height / config.fall_speed;
        let deadline = lead_in + chart.duration() + travel + config.effect_ttl + 1.0;

        let mut presses = VecDeque::with_capacity(chart.len());
        for note in chart.notes() {
            if rng.gen_bool(self.miss_rate) {
                continue;
            }
            presses.push_back(Press {
                lane: note.lane,
                at: lead_in + note.time + rng.gen_range(-jitter..=jitter),
            });
        }
        presses.make_contiguous().sort_by(|a, b| a.at.total_cmp(&b.at));
        log::info!(
            "Autoplay: {} of {} notes scheduled (seed {}, jitter {}ms, {} fps)",
            presses.len(),
            chart.len(),
            self.seed,
            self.jitter_ms,
            self.fps
        );

        let notes = chart.len();
        let mut session = Session::new(chart, config, skin)?;
        session.start(0.0);

        let step = 1.0 / self.fps as f64;
        let mut ticks = 0u64;
        while session.state() != ClockState::Complete {
            let now = ticks as f64 * step;
            if now > deadline {
                log::warn!("Autoplay stopped at the {deadline:.1}s deadline before completion");
                break;
            }
            press_due(&mut session, &mut presses, now);
            session.tick(now)?;
            // presses that fell inside the countdown wait for the first running tick
            press_due(&mut session, &mut presses, now);
            ticks += 1;
        }

        Ok(SimulationReport {
            state: session.state(),
            notes,
            ticks,
            song_time: session.clock_time(),
            scoreboard: session.scoreboard().clone(),
        })
    }
}

fn press_due(session: &mut Session, presses: &mut VecDeque<Press>, now: f64) {
    if session.state() != ClockState::Running {
        return;
    }
    while presses.front().is_some_and(|p| p.at <= now) {
        if let Some(press) = presses.pop_front() {
            session.handle_input(press.lane, press.at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::Note;

    fn chart() -> Arc<Chart> {
        let lanes = [Lane::Left, Lane::Up, Lane::Right, Lane::Down, Lane::Up, Lane::Left];
        let notes = lanes
            .iter()
            .enumerate()
            .map(|(i, &lane)| Note {
                time: 0.5 + i as f64 * 0.5,
                lane,
                duration: 0.0116,
                velocity: 100,
            })
            .collect();
        Arc::new(Chart::new(120, notes).unwrap())
    }

    fn play(bot: &Autoplay) -> SimulationReport {
        bot.run(chart(), SessionConfig::default(), Skin::default()).unwrap()
    }

    #[test]
    fn perfect_bot_clears_the_chart() {
        let report = play(&Autoplay::default());
        assert_eq!(report.state, ClockState::Complete);
        assert_eq!(report.scoreboard.perfect, 6);
        assert_eq!(report.scoreboard.score, 600);
        assert_eq!(report.scoreboard.max_combo, 6);
        assert_eq!(report.accuracy(), 1.0);
    }

    #[test]
    fn missing_everything_scrolls_past() {
        let report = play(&Autoplay {
            miss_rate: 1.0,
            ..Default::default()
        });
        assert_eq!(report.state, ClockState::Complete);
        assert_eq!(report.scoreboard.scrolled_past, 6);
        assert_eq!(report.scoreboard.score, 0);
        assert_eq!(report.accuracy(), 0.0);
    }

    #[test]
    fn same_seed_same_result() {
        let bot = Autoplay {
            seed: 17,
            jitter_ms: 120.0,
            miss_rate: 0.3,
            fps: 120,
        };
        let a = play(&bot);
        let b = play(&bot);
        assert_eq!(a.scoreboard, b.scoreboard);
        assert_eq!(a.ticks, b.ticks);
        assert_eq!(a.state, ClockState::Complete);
        // every note was either consumed by an input or scrolled past
        assert!(a.scoreboard.judged() + a.scoreboard.scrolled_past >= 6);
    }

    #[test]
    fn rejects_bad_bot_settings() {
        let bot = Autoplay {
            fps: 0,
            ..Default::default()
        };
        let err = bot.run(chart(), SessionConfig::default(), Skin::default()).err();
        assert!(matches!(err, Some(SessionError::InvalidConfig(_))));
    }
}
