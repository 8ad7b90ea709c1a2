//! Timer behind [CompactingStrategy::EveryXMinutes](crate::settings::CompactingStrategy::EveryXMinutes).
//!
//! # Marshalling
//! A [History](crate::history::History) is not thread-safe, so the timer never touches it.
//! The timer thread only sends [Tick]s through a channel.
//! The thread owning the history drains them with
//! [History::poll_timer](crate::history::History::poll_timer), e.g. once per event loop iteration.
//!
//! ```txt
//!            delay           delay
//! |<-------------------->|<----------->...
//! R    R    R    R    R  C R    R    R
//! |<-->|
//! notify interval
//!
//! R: Tick::Remaining
//! C: Tick::Compact
//! ```
//!
//! # Cancellation
//! Dropping a [CompactionTimer] disconnects its cancel channel and joins the thread,
//! so a replaced timer has stopped once the replacement is stored.
use crate::error::Result;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A message from the timer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Time to compact.
    Compact,
    /// Time left until the next [Tick::Compact].
    Remaining(Duration),
}

/// A cancellable background timer producing [Tick]s.
pub struct CompactionTimer {
    ticks: Receiver<Tick>,
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CompactionTimer {
    /// Starts a timer thread.
    ///
    /// `delay` is the compaction period and `notify_interval` the period of
    /// [Tick::Remaining] messages.
    pub fn start(delay: Duration, notify_interval: Duration) -> Result<Self> {
        let (tick_tx, tick_rx) = mpsc::channel();
        let (cancel_tx, cancel_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("tur-compaction-timer".to_string())
            .spawn(move || run(delay, notify_interval, &tick_tx, &cancel_rx))?;

        tracing::debug!(?delay, ?notify_interval, "compaction timer started");
        Ok(Self {
            ticks: tick_rx,
            cancel: Some(cancel_tx),
            handle: Some(handle),
        })
    }

    /// Returns every tick received since the last call, oldest first.
    pub fn drain(&self) -> Vec<Tick> {
        let mut ticks = Vec::new();
        loop {
            match self.ticks.try_recv() {
                Ok(tick) => ticks.push(tick),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ticks
    }
}

impl Drop for CompactionTimer {
    fn drop(&mut self) {
        // Disconnecting wakes the thread immediately.
        self.cancel.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("compaction timer thread panicked");
            }
        }
        tracing::debug!("compaction timer stopped");
    }
}

impl std::fmt::Debug for CompactionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionTimer")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn run(delay: Duration, notify_interval: Duration, ticks: &Sender<Tick>, cancel: &Receiver<()>) {
    let start = Instant::now();
    let mut next_compact = start + delay;
    let mut next_notify = start + notify_interval;

    loop {
        let deadline = next_compact.min(next_notify);
        let timeout = deadline.saturating_duration_since(Instant::now());
        match cancel.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        let now = Instant::now();
        if next_compact <= now {
            if ticks.send(Tick::Compact).is_err() {
                return;
            }
            next_compact += delay;
        }
        if next_notify <= now {
            let remaining = next_compact.saturating_duration_since(now);
            if ticks.send(Tick::Remaining(remaining)).is_err() {
                return;
            }
            next_notify += notify_interval;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ticks_arrive() {
        let timer =
            CompactionTimer::start(Duration::from_millis(20), Duration::from_millis(5)).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let ticks = timer.drain();
        assert!(ticks.contains(&Tick::Compact));
        assert!(ticks.iter().any(|t| matches!(t, Tick::Remaining(_))));
        for tick in ticks {
            if let Tick::Remaining(d) = tick {
                assert!(d <= Duration::from_millis(20));
            }
        }
    }

    #[test]
    fn drop_stops_thread() {
        let timer =
            CompactionTimer::start(Duration::from_secs(3600), Duration::from_secs(3600)).unwrap();
        let begin = Instant::now();
        drop(timer);

        assert!(begin.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn nothing_before_first_period() {
        let timer =
            CompactionTimer::start(Duration::from_secs(3600), Duration::from_secs(3600)).unwrap();
        assert!(timer.drain().is_empty());
    }
}
