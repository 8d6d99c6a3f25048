use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::trace;

use crate::timer::{TickSource, TickToken};

/// Wall-clock tick source: each started run gets its own thread that sends
/// the run's token on a shared channel once per interval.
pub struct IntervalTicks {
    interval: Duration,
    tx: Sender<TickToken>,
}

impl IntervalTicks {
    pub fn new(interval: Duration) -> (Self, Receiver<TickToken>) {
        let (tx, rx) = mpsc::channel();
        (Self { interval, tx }, rx)
    }

    pub fn every_second() -> (Self, Receiver<TickToken>) {
        Self::new(Duration::from_secs(1))
    }
}

/// Cancels its run when dropped. The thread notices on its next wake-up; a
/// tick already in flight carries a token the timer no longer accepts.
pub struct IntervalHandle {
    cancelled: Arc<AtomicBool>,
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl TickSource for IntervalTicks {
    type Handle = IntervalHandle;

    fn start(&mut self, token: TickToken) -> anyhow::Result<IntervalHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let tx = self.tx.clone();
        let interval = self.interval;

        thread::Builder::new()
            .name("moodo-ticks".to_string())
            .spawn(move || {
                loop {
                    thread::sleep(interval);
                    if flag.load(Ordering::SeqCst) {
                        break;
                    }
                    trace!(?token, "tick");
                    if tx.send(token).is_err() {
                        break;
                    }
                }
            })
            .context("failed to spawn tick thread")?;

        Ok(IntervalHandle { cancelled })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::IntervalTicks;
    use crate::timer::{FocusTimer, TickOutcome};

    #[test]
    fn drives_a_timer_to_expiry() {
        let (source, rx) = IntervalTicks::new(Duration::from_millis(5));
        let mut timer = FocusTimer::new(source, 3);
        timer.toggle().expect("start");

        let mut outcome = TickOutcome::Ignored;
        while outcome != TickOutcome::Expired {
            let token = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("tick arrives");
            outcome = timer.tick(token);
        }
        assert_eq!(timer.remaining(), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn pausing_stops_the_run() {
        let (source, rx) = IntervalTicks::new(Duration::from_millis(5));
        let mut timer = FocusTimer::new(source, 100);
        timer.toggle().expect("start");
        rx.recv_timeout(Duration::from_secs(5)).expect("first tick");
        timer.pause();

        std::thread::sleep(Duration::from_millis(50));
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
