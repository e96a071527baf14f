use serde::Serialize;
use std::collections::VecDeque;

use crate::chart::{Lane, Note};
use crate::config::SessionConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgement {
    Perfect,
    Good,
    Miss,
}

impl Judgement {
    pub fn score_delta(self) -> i64 {
        match self {
            Judgement::Perfect => 100,
            Judgement::Good => 50,
            Judgement::Miss => -10,
        }
    }
}

/// Distance bands around the judge line, in playfield units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JudgeWindows {
    pub perfect: f64,
    pub good: f64,
    /// Notes at or beyond this distance cannot be matched
    pub hit: f64,
}

impl JudgeWindows {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            perfect: config.perfect_window,
            good: config.good_window,
            hit: config.hit_window,
        }
    }

    /// `None` when `distance` lies outside the hit window.
    pub fn classify(&self, distance: f64) -> Option<Judgement> {
        if distance < self.perfect {
            Some(Judgement::Perfect)
        } else if distance < self.good {
            Some(Judgement::Good)
        } else if distance < self.hit {
            Some(Judgement::Miss)
        } else {
            None
        }
    }
}

/// Index and distance of the closest pending note on `lane` inside the hit window.
pub fn nearest_note(
    pending: &VecDeque<Note>,
    lane: Lane,
    song_time: f64,
    fall_speed: f64,
    hit_window: f64,
) -> Option<(usize, f64)> {
    pending
        .iter()
        .enumerate()
        .filter(|(_, n)| n.lane == lane)
        .map(|(i, n)| (i, (n.time - song_time).abs() * fall_speed))
        .filter(|&(_, distance)| distance < hit_window)
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Score, combo and outcome tallies. The score never drops below zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scoreboard {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub perfect: u32,
    pub good: u32,
    pub miss: u32,
    /// Notes that scrolled off-screen without an input
    pub scrolled_past: u32,
}

impl Scoreboard {
    /// Applies a judgement and returns the change actually made to the score.
    pub fn record(&mut self, judgement: Judgement) -> i64 {
        match judgement {
            Judgement::Perfect => self.perfect += 1,
            Judgement::Good => self.good += 1,
            Judgement::Miss => self.miss += 1,
        }
        if judgement == Judgement::Miss {
            self.combo = 0;
        } else {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }
        self.add(judgement.score_delta())
    }

    pub fn record_scrolled_past(&mut self, penalty: u32) -> i64 {
        self.scrolled_past += 1;
        self.combo = 0;
        self.add(-(penalty as i64))
    }

    pub fn judged(&self) -> u32 {
        self.perfect + self.good + self.miss
    }

    fn add(&mut self, delta: i64) -> i64 {
        let before = self.score;
        self.score = (self.score as i64).saturating_add(delta).max(0) as u64;
        self.score as i64 - before as i64
    }
}

/// Per-lane minimum spacing between judged inputs.
#[derive(Clone, Debug)]
pub struct Refractory {
    window: f64,
    last_judged: [Option<f64>; 4],
}

impl Refractory {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            last_judged: [None; 4],
        }
    }

    /// True (and remembers `now`) if an input on `lane` at `now` may be judged.
    pub fn admit(&mut self, lane: Lane, now: f64) -> bool {
        let slot = &mut self.last_judged[lane.index()];
        if let Some(last) = *slot {
            if now - last < self.window {
                return false;
            }
        }
        *slot = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows() -> JudgeWindows {
        JudgeWindows {
            perfect: 20.0,
            good: 35.0,
            hit: 50.0,
        }
    }

    fn note(time: f64, lane: Lane) -> Note {
        Note {
            time,
            lane,
            duration: 0.0,
            velocity: 64,
        }
    }

    #[test]
    fn classification_boundaries() {
        let w = windows();
        assert_eq!(w.classify(0.0), Some(Judgement::Perfect));
        assert_eq!(w.classify(19.9), Some(Judgement::Perfect));
        assert_eq!(w.classify(20.0), Some(Judgement::Good));
        assert_eq!(w.classify(34.9), Some(Judgement::Good));
        assert_eq!(w.classify(35.0), Some(Judgement::Miss));
        assert_eq!(w.classify(49.9), Some(Judgement::Miss));
        assert_eq!(w.classify(50.0), None);
        assert_eq!(w.classify(400.0), None);
    }

    #[test]
    fn nearest_note_picks_closest_on_lane() {
        let pending: VecDeque<Note> = vec![
            note(1.0, Lane::Left),
            note(1.1, Lane::Up),
            note(1.5, Lane::Left),
        ]
        .into();
        // 300 units/s: note at 1.0 is 30 away, 1.5 is 120 away
        let hit = nearest_note(&pending, Lane::Left, 1.1, 300.0, 50.0);
        assert_eq!(hit.map(|h| h.0), Some(0));
        assert!((hit.unwrap().1 - 30.0).abs() < 1e-9);

        assert_eq!(nearest_note(&pending, Lane::Right, 1.1, 300.0, 50.0), None);
        assert_eq!(nearest_note(&pending, Lane::Left, 3.0, 300.0, 50.0), None);
    }

    #[test]
    fn score_floor_at_zero() {
        let mut board = Scoreboard::default();
        assert_eq!(board.record(Judgement::Miss), 0);
        assert_eq!(board.score, 0);
        assert_eq!(board.record(Judgement::Good), 50);
        assert_eq!(board.record(Judgement::Miss), -10);
        assert_eq!(board.score, 40);
        for _ in 0..10 {
            board.record(Judgement::Miss);
        }
        assert_eq!(board.score, 0);
        assert_eq!(board.miss, 12);
    }

    #[test]
    fn combo_tracking() {
        let mut board = Scoreboard::default();
        board.record(Judgement::Perfect);
        board.record(Judgement::Good);
        board.record(Judgement::Perfect);
        assert_eq!(board.combo, 3);
        board.record(Judgement::Miss);
        assert_eq!(board.combo, 0);
        board.record(Judgement::Perfect);
        assert_eq!(board.max_combo, 3);
        board.record_scrolled_past(0);
        assert_eq!(board.combo, 0);
        assert_eq!(board.score, 340);
        assert_eq!(board.scrolled_past, 1);
        assert_eq!(board.judged(), 5);
    }

    #[test]
    fn scroll_penalty_is_floored() {
        let mut board = Scoreboard::default();
        board.record(Judgement::Good);
        assert_eq!(board.record_scrolled_past(80), -50);
        assert_eq!(board.score, 0);
    }

    #[test]
    fn refractory_is_per_lane() {
        let mut r = Refractory::new(0.15);
        assert!(r.admit(Lane::Up, 1.0));
        assert!(!r.admit(Lane::Up, 1.1));
        assert!(r.admit(Lane::Down, 1.1));
        assert!(r.admit(Lane::Up, 1.2));
    }
}
