//! Loop states and the stop signal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep; every wait re-checks the stop flag this often.
const STOP_POLL_SLICE: Duration = Duration::from_millis(100);

/// Where the monitoring loop is in its cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorState {
    /// Not started yet
    Idle,
    /// Looking for the in-game screen before the first cycle
    Starting,
    Capturing,
    /// Waiting out a capture backoff (attempt is 1-based)
    Retrying { attempt: u32 },
    Classifying,
    Extracting,
    Deciding,
    Acting,
    Sleeping,
    /// Stop signal observed
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Idle => write!(f, "Idle"),
            MonitorState::Starting => write!(f, "Starting"),
            MonitorState::Capturing => write!(f, "Capturing"),
            MonitorState::Retrying { attempt } => write!(f, "Retrying (attempt {})", attempt),
            MonitorState::Classifying => write!(f, "Classifying"),
            MonitorState::Extracting => write!(f, "Extracting"),
            MonitorState::Deciding => write!(f, "Deciding"),
            MonitorState::Acting => write!(f, "Acting"),
            MonitorState::Sleeping => write!(f, "Sleeping"),
            MonitorState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Shared stop flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` in short slices.
    ///
    /// Returns `true` if the stop signal was raised before or during the wait.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(STOP_POLL_SLICE));
        }
    }
}
