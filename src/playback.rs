use crate::event::TypingEvent;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Grace period between starting a session and the first press, so the
/// previous session's teardown visuals can finish. Not tempo-scaled.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Fixed visual release time between a press ending and the inter-key gap
/// starting. Not tempo-scaled.
pub const RELEASE_DELAY: Duration = Duration::from_millis(50);

/// Handle for one replay session. Cancelling a handle that has already ended
/// or been superseded is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(u64);

/// Discrete signals emitted toward the rendering side. The scheduler itself
/// holds no visual state.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSignal {
    PressStart { index: usize },
    PressEnd { index: usize },
    EventInfo { hold: f64, flight: f64 },
    SessionEnded,
}

/// Consumer of playback signals. The TUI replay state implements this; tests
/// use a plain `Vec`.
pub trait SignalSink {
    fn emit(&mut self, signal: PlaybackSignal);
}

impl SignalSink for Vec<PlaybackSignal> {
    fn emit(&mut self, signal: PlaybackSignal) {
        self.push(signal);
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("tempo must be a positive finite multiplier, got {0}")]
    InvalidTempo(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SessionState {
    /// Waiting out the settle grace period before the first press.
    Settling,
    /// Key held down for event `i`; waiting `hold / tempo`.
    Pressing(usize),
    /// Key released after event `i`; waiting the fixed release delay plus
    /// `flight / tempo` (the current event's flight, i.e. the gap before the
    /// next key).
    Released(usize),
}

#[derive(Debug)]
struct Session {
    token: u64,
    events: Vec<TypingEvent>,
    state: SessionState,
    due: Instant,
}

/// Sequential, cancellable replay of one group's keystroke rhythm.
///
/// Single-threaded and cooperative: the owner polls it from the tick loop and
/// every pending transition re-checks the live token before acting, so a
/// superseded session's deadline expiring later is a silent no-op. Deadlines
/// chain off each other (`due + delay`, not `now + delay`), so coarse polling
/// does not accumulate drift.
#[derive(Debug)]
pub struct PlaybackScheduler {
    tempo: f64,
    live_token: u64,
    session: Option<Session>,
    settle_delay: Duration,
    release_delay: Duration,
}

fn validate_tempo(tempo: f64) -> Result<f64, PlaybackError> {
    if tempo.is_finite() && tempo > 0.0 {
        Ok(tempo)
    } else {
        Err(PlaybackError::InvalidTempo(tempo))
    }
}

/// Upper bound on any single scheduled wait. Keeps deadline arithmetic on
/// `Instant` in range when a huge recorded value meets a tiny tempo.
const MAX_DELAY: Duration = Duration::from_secs(60 * 60 * 24);

/// Tempo-scaled delay for a recorded duration. Non-finite or negative
/// recordings collapse to zero so a NaN cell can never stall a session; the
/// aggregator owns NaN accounting. Quotients too large for a `Duration`
/// clamp to `MAX_DELAY` instead of panicking.
fn scaled_delay(ms: f64, tempo: f64) -> Duration {
    if !ms.is_finite() || ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(ms / tempo / 1000.0).map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
}

impl PlaybackScheduler {
    pub fn new(tempo: f64) -> Result<Self, PlaybackError> {
        Ok(Self {
            tempo: validate_tempo(tempo)?,
            live_token: 0,
            session: None,
            settle_delay: SETTLE_DELAY,
            release_delay: RELEASE_DELAY,
        })
    }

    /// Override the fixed (non-tempo-scaled) delays. Used by timing tests to
    /// observe the bare event timeline.
    pub fn with_delays(mut self, settle: Duration, release: Duration) -> Self {
        self.settle_delay = settle;
        self.release_delay = release;
        self
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Change the tempo for subsequently computed delays. An in-flight wait
    /// keeps the delay it was scheduled with; the new tempo applies from the
    /// next transition onward.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<(), PlaybackError> {
        self.tempo = validate_tempo(tempo)?;
        Ok(())
    }

    /// Start replaying `events` at `tempo`, superseding any live session. An
    /// invalid tempo is rejected before any state changes, leaving a previous
    /// session untouched.
    pub fn start_session(
        &mut self,
        events: Vec<TypingEvent>,
        tempo: f64,
        now: Instant,
    ) -> Result<SessionId, PlaybackError> {
        let tempo = validate_tempo(tempo)?;

        self.tempo = tempo;
        self.live_token = self.live_token.wrapping_add(1);
        self.session = Some(Session {
            token: self.live_token,
            events,
            state: SessionState::Settling,
            due: now + self.settle_delay,
        });

        Ok(SessionId(self.live_token))
    }

    /// Cancel the session behind `id` if it is still the live one. Ended or
    /// already-superseded handles are ignored; no signal is emitted either
    /// way.
    pub fn cancel(&mut self, id: SessionId) {
        if self.live_token == id.0 {
            self.live_token = self.live_token.wrapping_add(1);
        }
    }

    /// Unconditionally supersede whatever is playing.
    pub fn stop(&mut self) {
        self.live_token = self.live_token.wrapping_add(1);
    }

    pub fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.token == self.live_token)
    }

    /// Index of the event currently being pressed or released, for progress
    /// display.
    pub fn current_index(&self) -> Option<usize> {
        let session = self.session.as_ref()?;
        if session.token != self.live_token {
            return None;
        }
        match session.state {
            SessionState::Settling => None,
            SessionState::Pressing(i) | SessionState::Released(i) => Some(i),
        }
    }

    /// Fire every transition whose deadline has passed, in order. Each fire
    /// re-checks the live token first; a stale session is dropped without a
    /// signal.
    pub fn poll<S: SignalSink>(&mut self, now: Instant, sink: &mut S) {
        loop {
            let Some(session) = self.session.as_mut() else {
                return;
            };

            if session.token != self.live_token {
                self.session = None;
                return;
            }

            if session.due > now {
                return;
            }
            let fired_at = session.due;

            match session.state {
                SessionState::Settling => {
                    if session.events.is_empty() {
                        sink.emit(PlaybackSignal::SessionEnded);
                        self.session = None;
                        return;
                    }
                    sink.emit(PlaybackSignal::PressStart { index: 0 });
                    let hold = session.events[0].hold;
                    session.state = SessionState::Pressing(0);
                    session.due = fired_at + scaled_delay(hold, self.tempo);
                }
                SessionState::Pressing(i) => {
                    let (hold, flight) = {
                        let ev = &session.events[i];
                        (ev.hold, ev.flight)
                    };
                    sink.emit(PlaybackSignal::PressEnd { index: i });
                    sink.emit(PlaybackSignal::EventInfo { hold, flight });

                    if i + 1 == session.events.len() {
                        sink.emit(PlaybackSignal::SessionEnded);
                        self.session = None;
                        return;
                    }
                    session.state = SessionState::Released(i);
                    session.due = fired_at + self.release_delay + scaled_delay(flight, self.tempo);
                }
                SessionState::Released(i) => {
                    let next = i + 1;
                    sink.emit(PlaybackSignal::PressStart { index: next });
                    let hold = session.events[next].hold;
                    session.state = SessionState::Pressing(next);
                    session.due = fired_at + scaled_delay(hold, self.tempo);
                }
            }
        }
    }
}
