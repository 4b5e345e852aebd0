use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Terminal input plus the periodic tick that advances playback. A tick is
/// stamped with the instant the pump woke up, so playback deadlines are
/// polled against the same clock edge that produced the tick.
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick(Instant),
}

/// Where the pump gets its input events from. Production uses a crossterm
/// reader thread; tests feed a plain channel.
pub trait AppEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => tx.send(AppEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl AppEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl AppEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls input events with a bounded wait; a quiet interval becomes a tick.
/// The tick interval is the replay latency floor: a due playback transition
/// fires at most one interval late.
pub struct EventPump<S: AppEventSource> {
    source: S,
    tick_interval: Duration,
}

impl<S: AppEventSource> EventPump<S> {
    pub fn new(source: S, tick_interval: Duration) -> Self {
        Self {
            source,
            tick_interval,
        }
    }

    /// Blocks up to one tick interval. Pending input wins over the tick.
    pub fn next(&self) -> AppEvent {
        match self.source.recv_timeout(self.tick_interval) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                AppEvent::Tick(Instant::now())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TypingEvent;
    use crate::playback::{PlaybackScheduler, PlaybackSignal};

    fn silent_pump(interval_ms: u64) -> EventPump<TestEventSource> {
        let (tx, rx) = mpsc::channel();
        std::mem::forget(tx);
        EventPump::new(TestEventSource::new(rx), Duration::from_millis(interval_ms))
    }

    #[test]
    fn quiet_interval_becomes_a_stamped_tick() {
        let pump = silent_pump(1);
        let before = Instant::now();
        match pump.next() {
            AppEvent::Tick(at) => assert!(at >= before),
            _ => panic!("expected a tick from a silent source"),
        }
    }

    #[test]
    fn pending_input_preempts_the_tick() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        let pump = EventPump::new(TestEventSource::new(rx), Duration::from_secs(1));

        assert!(matches!(pump.next(), AppEvent::Resize));
    }

    #[test]
    fn tick_instants_are_valid_poll_edges() {
        // A session started before the tick must be due at the tick's own
        // instant; the pump and the scheduler share one clock.
        let pump = silent_pump(1);
        let mut sched = PlaybackScheduler::new(1.0)
            .unwrap()
            .with_delays(Duration::ZERO, Duration::ZERO);
        sched
            .start_session(
                vec![TypingEvent {
                    hand: "L".into(),
                    hold: 10.0,
                    direction: "LL".into(),
                    latency: 10.0,
                    flight: 0.0,
                }],
                1.0,
                Instant::now(),
            )
            .unwrap();

        let mut signals: Vec<PlaybackSignal> = Vec::new();
        match pump.next() {
            AppEvent::Tick(at) => sched.poll(at, &mut signals),
            _ => panic!("expected a tick from a silent source"),
        }

        assert_eq!(
            signals.first(),
            Some(&PlaybackSignal::PressStart { index: 0 })
        );
    }
}
