use tracing::debug;

pub const DEFAULT_FOCUS_SECONDS: u32 = 25 * 60;
pub const DEFAULT_BREAK_SECONDS: u32 = 5 * 60;

/// Identifies the tick source of one Running period. Ticks carrying any other
/// token are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken(u64);

/// Something that can deliver one tick per second tagged with a token.
/// Dropping the returned handle must stop the ticks.
pub trait TickSource {
    type Handle;

    fn start(&mut self, token: TickToken) -> anyhow::Result<Self::Handle>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Paused,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counted { remaining: u32 },
    /// The countdown hit zero and the timer paused itself.
    Expired,
    /// Stale token or not running.
    Ignored,
}

enum Phase<H> {
    Paused,
    // The handle is owned here so that leaving Running drops it.
    Running { token: TickToken, _ticks: H },
}

pub struct FocusTimer<S: TickSource> {
    source: S,
    duration: u32,
    remaining: u32,
    phase: Phase<S::Handle>,
    issued: u64,
}

impl<S: TickSource> FocusTimer<S> {
    pub fn new(source: S, duration_seconds: u32) -> Self {
        Self {
            source,
            duration: duration_seconds,
            remaining: duration_seconds,
            phase: Phase::Paused,
            issued: 0,
        }
    }

    pub fn state(&self) -> TimerState {
        match self.phase {
            Phase::Paused => TimerState::Paused,
            Phase::Running { .. } => TimerState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Token of the live tick source, if running.
    pub fn active_token(&self) -> Option<TickToken> {
        match self.phase {
            Phase::Running { token, .. } => Some(token),
            Phase::Paused => None,
        }
    }

    /// Start when paused, pause when running. An expired timer stays paused.
    pub fn toggle(&mut self) -> anyhow::Result<TimerState> {
        match self.phase {
            Phase::Running { .. } => self.pause(),
            Phase::Paused if self.remaining == 0 => {
                debug!("timer expired; reset before starting again");
            }
            Phase::Paused => {
                self.issued += 1;
                let token = TickToken(self.issued);
                let ticks = self.source.start(token)?;
                self.phase = Phase::Running {
                    token,
                    _ticks: ticks,
                };
                debug!(remaining = self.remaining, ?token, "timer started");
            }
        }
        Ok(self.state())
    }

    pub fn pause(&mut self) {
        if self.is_running() {
            self.phase = Phase::Paused;
            debug!(remaining = self.remaining, "timer paused");
        }
    }

    /// Stops ticking and restores the full duration.
    pub fn reset(&mut self) {
        self.phase = Phase::Paused;
        self.remaining = self.duration;
    }

    pub fn tick(&mut self, token: TickToken) -> TickOutcome {
        if self.active_token() != Some(token) {
            return TickOutcome::Ignored;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.phase = Phase::Paused;
            debug!("timer expired");
            TickOutcome::Expired
        } else {
            TickOutcome::Counted {
                remaining: self.remaining,
            }
        }
    }

    pub fn display(&self) -> String {
        format_clock(self.remaining)
    }
}

/// `MM:SS`, zero padded. Minutes are not wrapped into hours.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::{
        DEFAULT_FOCUS_SECONDS, FocusTimer, TickOutcome, TickSource, TickToken, TimerState,
        format_clock,
    };

    /// Tick source driven by hand; counts live handles.
    #[derive(Default)]
    struct ManualTicks {
        live: Rc<Cell<usize>>,
    }

    struct ManualHandle {
        live: Rc<Cell<usize>>,
    }

    impl Drop for ManualHandle {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    impl TickSource for ManualTicks {
        type Handle = ManualHandle;

        fn start(&mut self, _token: TickToken) -> anyhow::Result<ManualHandle> {
            self.live.set(self.live.get() + 1);
            Ok(ManualHandle {
                live: Rc::clone(&self.live),
            })
        }
    }

    fn timer() -> (FocusTimer<ManualTicks>, Rc<Cell<usize>>) {
        let source = ManualTicks::default();
        let live = Rc::clone(&source.live);
        (FocusTimer::new(source, DEFAULT_FOCUS_SECONDS), live)
    }

    fn run_ticks(timer: &mut FocusTimer<ManualTicks>, n: usize) {
        for _ in 0..n {
            let token = timer.active_token().expect("running");
            timer.tick(token);
        }
    }

    #[test]
    fn start_and_immediate_pause_keeps_full_duration() {
        let (mut timer, _) = timer();
        assert_eq!(timer.toggle().expect("start"), TimerState::Running);
        assert_eq!(timer.toggle().expect("pause"), TimerState::Paused);
        assert_eq!(timer.remaining(), 1500);
    }

    #[test]
    fn ten_ticks_count_down_ten_seconds() {
        let (mut timer, _) = timer();
        timer.toggle().expect("start");
        run_ticks(&mut timer, 10);
        assert_eq!(timer.remaining(), 1490);
        assert_eq!(timer.display(), "24:50");
    }

    #[test]
    fn reset_from_any_state_restores_duration_and_pauses() {
        let (mut timer, live) = timer();
        timer.reset();
        assert_eq!(timer.remaining(), 1500);

        timer.toggle().expect("start");
        run_ticks(&mut timer, 3);
        timer.reset();
        assert_eq!(timer.remaining(), 1500);
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn repeated_toggles_never_leave_more_than_one_source() {
        let (mut timer, live) = timer();
        for _ in 0..20 {
            timer.toggle().expect("toggle");
            assert!(live.get() <= 1);
        }
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn ticks_from_a_previous_run_are_ignored() {
        let (mut timer, _) = timer();
        timer.toggle().expect("start");
        let stale = timer.active_token().expect("running");
        timer.toggle().expect("pause");
        timer.toggle().expect("restart");

        assert_eq!(timer.tick(stale), TickOutcome::Ignored);
        assert_eq!(timer.remaining(), 1500);
    }

    #[test]
    fn paused_timer_ignores_ticks() {
        let (mut timer, _) = timer();
        timer.toggle().expect("start");
        let token = timer.active_token().expect("running");
        timer.pause();
        assert_eq!(timer.tick(token), TickOutcome::Ignored);
    }

    #[test]
    fn reaching_zero_pauses_without_reset() {
        let source = ManualTicks::default();
        let live = Rc::clone(&source.live);
        let mut timer = FocusTimer::new(source, 3);
        timer.toggle().expect("start");
        let token = timer.active_token().expect("running");

        assert_eq!(timer.tick(token), TickOutcome::Counted { remaining: 2 });
        assert_eq!(timer.tick(token), TickOutcome::Counted { remaining: 1 });
        assert_eq!(timer.tick(token), TickOutcome::Expired);
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.remaining(), 0);
        assert_eq!(live.get(), 0);

        assert_eq!(timer.toggle().expect("toggle"), TimerState::Paused);
        assert!(timer.is_expired());
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(6000), "100:00");
    }
}
