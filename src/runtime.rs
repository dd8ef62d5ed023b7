use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::capture::{AttemptId, CaptureEvent, CaptureSink};
use crate::pipeline::PipelineUpdate;
use crate::playback::{PlaybackOutcome, PlaybackSource};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    Capture(CaptureEvent),
    Pipeline {
        attempt: AttemptId,
        update: PipelineUpdate,
    },
    Playback {
        source: PlaybackSource,
        outcome: PlaybackOutcome,
    },
}

/// Source of everything the event loop reacts to: terminal input, capture
/// producers, and background network work.
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Cloneable handle producers use to post events into the loop.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: Sender<AppEvent>,
}

impl EventSender {
    /// Returns false once the loop has gone away.
    pub fn send(&self, event: AppEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn capture_sink(&self) -> CaptureSink {
        let tx = self.tx.clone();
        CaptureSink::new(move |ev| {
            let _ = tx.send(AppEvent::Capture(ev));
        })
    }
}

/// Channel-backed event source used in production and in tests.
pub struct ChannelEventSource {
    rx: Receiver<AppEvent>,
}

impl ChannelEventSource {
    pub fn new() -> (Self, EventSender) {
        let (tx, rx) = mpsc::channel();
        (Self { rx }, EventSender { tx })
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Forwards key and resize events from the terminal until the loop hangs up.
pub fn spawn_terminal_input(sender: EventSender) {
    std::thread::spawn(move || loop {
        let forwarded = match event::read() {
            Ok(CtEvent::Key(key)) => sender.send(AppEvent::Key(key)),
            Ok(CtEvent::Resize(_, _)) => sender.send(AppEvent::Resize),
            Ok(_) => true,
            Err(e) => {
                log::error!("terminal input failed: {}", e);
                false
            }
        };
        if !forwarded {
            break;
        }
    });
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (es, _sender) = ChannelEventSource::new();
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        // With no events available, step should yield Tick
        assert_matches!(runner.step(), AppEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (es, sender) = ChannelEventSource::new();
        assert!(sender.send(AppEvent::Resize));
        let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(10)));

        assert_matches!(runner.step(), AppEvent::Resize);
    }

    #[test]
    fn capture_sink_wraps_events() {
        let (es, sender) = ChannelEventSource::new();
        let sink = sender.capture_sink();
        std::thread::spawn(move || sink.send(CaptureEvent::RecorderStopped { attempt: 3 }))
            .join()
            .unwrap();

        let runner = Runner::new(es, FixedTicker::new(Duration::from_millis(100)));
        assert_matches!(
            runner.step(),
            AppEvent::Capture(CaptureEvent::RecorderStopped { attempt: 3 })
        );
    }

    #[test]
    fn send_reports_closed_loop() {
        let (es, sender) = ChannelEventSource::new();
        drop(es);
        assert!(!sender.send(AppEvent::Tick));
    }
}
