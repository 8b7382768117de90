//! Batching and pacing knobs for the relay engine.

use faststr::FastStr;
use std::time::Duration;

pub const DEFAULT_FLUSH_CHARS: usize = 60;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_MIN_EVENTS: usize = 5;
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(120);
pub const FILLER_TEXT: &str = "\n// continuing streaming...\n";
pub const FAST_START_TEXT: &str = "// streaming initialized...\n";

/// One engine, many behaviors: every variant of the relay is a value of this
/// struct.
///
/// A flush happens when the buffer holds more than `flush_chars` characters or
/// when more than `flush_interval` has elapsed since the previous flush.
/// `None` disables the respective trigger.
#[derive(Debug, Clone)]
pub struct RelayPolicy {
    pub flush_chars:     Option<usize>,
    pub flush_interval:  Option<Duration>,
    /// Content events guaranteed before `[DONE]` on a successful run.
    pub min_events:      usize,
    pub filler_text:     FastStr,
    /// Emitted before the upstream produces anything. Never counts toward
    /// `min_events`.
    pub fast_start_text: Option<FastStr>,
    /// Pause after each emitted content event.
    pub emit_delay:      Option<Duration>,
    /// Upper bound on the whole upstream exchange.
    pub max_duration:    Option<Duration>,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            flush_chars:     Some(DEFAULT_FLUSH_CHARS),
            flush_interval:  Some(DEFAULT_FLUSH_INTERVAL),
            min_events:      DEFAULT_MIN_EVENTS,
            filler_text:     FastStr::from_static_str(FILLER_TEXT),
            fast_start_text: Some(FastStr::from_static_str(FAST_START_TEXT)),
            emit_delay:      None,
            max_duration:    Some(DEFAULT_MAX_DURATION),
        }
    }
}

impl RelayPolicy {
    /// Forward every non-empty fragment as its own event.
    pub fn every_fragment() -> Self {
        Self {
            flush_chars: Some(0),
            flush_interval: None,
            fast_start_text: None,
            ..Default::default()
        }
    }

    pub fn with_fast_start(mut self, text: Option<FastStr>) -> Self {
        self.fast_start_text = text;
        self
    }

    pub fn with_emit_delay(mut self, delay: Option<Duration>) -> Self {
        self.emit_delay = delay;
        self
    }

    pub fn with_max_duration(mut self, max: Option<Duration>) -> Self {
        self.max_duration = max;
        self
    }

    pub(crate) fn size_exceeded(&self, buffered_chars: usize) -> bool {
        self.flush_chars.is_some_and(|limit| buffered_chars > limit)
    }

    pub(crate) fn interval_exceeded(&self, elapsed: Duration) -> bool {
        self.flush_interval.is_some_and(|limit| elapsed > limit)
    }
}
