use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    Idle,
    Countdown,
    Running,
    Stopped,
    Complete,
}

/// Song clock for one play-through.
///
/// Time only moves when `advance` is called with a monotonic wall-clock
/// instant, so game logic never reads the audio device's position. The
/// audio timeline may drift against it over a long session.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    state: ClockState,
    countdown_secs: u32,
    countdown_started: f64,
    last_tick: f64,
    time: f64,
}

impl PlaybackClock {
    pub fn new(countdown_secs: u32) -> Self {
        Self {
            state: ClockState::Idle,
            countdown_secs,
            countdown_started: 0.0,
            last_tick: 0.0,
            time: 0.0,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Song time as of the last tick.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// IDLE → COUNTDOWN. Returns false if the clock was already started.
    pub fn start(&mut self, now: f64) -> bool {
        if self.state != ClockState::Idle {
            return false;
        }
        self.countdown_started = now;
        self.last_tick = now;
        self.state = ClockState::Countdown;
        if self.countdown_secs == 0 {
            self.begin_running(now, 0.0);
        }
        true
    }

    /// Called once per scheduler tick.
    pub fn advance(&mut self, now: f64) -> f64 {
        match self.state {
            ClockState::Countdown => {
                let elapsed = now - self.countdown_started;
                let countdown = self.countdown_secs as f64;
                if elapsed >= countdown {
                    self.begin_running(now, elapsed - countdown);
                }
            }
            ClockState::Running => {
                // a backwards step adds no time and keeps the later instant
                if now > self.last_tick {
                    self.time += now - self.last_tick;
                    self.last_tick = now;
                }
            }
            ClockState::Idle | ClockState::Stopped | ClockState::Complete => {}
        }
        self.time
    }

    /// Song time at wall-clock `now`, which may fall between ticks.
    pub fn time_at(&self, now: f64) -> f64 {
        match self.state {
            ClockState::Running => self.time + (now - self.last_tick).max(0.0),
            _ => self.time,
        }
    }

    /// 3, 2, 1 while counting down.
    pub fn countdown_remaining(&self, now: f64) -> Option<u32> {
        if self.state != ClockState::Countdown {
            return None;
        }
        let elapsed = (now - self.countdown_started).max(0.0);
        let remaining = self.countdown_secs.saturating_sub(elapsed.floor() as u32);
        (remaining > 0).then_some(remaining)
    }

    pub fn stop(&mut self) {
        if matches!(self.state, ClockState::Countdown | ClockState::Running) {
            self.state = ClockState::Stopped;
        }
    }

    pub fn complete(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Complete;
        }
    }

    fn begin_running(&mut self, now: f64, carried: f64) {
        self.state = ClockState::Running;
        self.time = carried;
        self.last_tick = now;
    }
}
