//! The relay engine: re-batches an upstream fragment stream into SSE-ready
//! events.
//!
//! Every sequence produced by [`relay`] is finite and ends with exactly one
//! [`RelayEvent::Done`]. Upstream failures never escape; they become a single
//! [`RelayEvent::Error`] right before `Done`.

use crate::error::{Error, Result};
use crate::stream::policy::RelayPolicy;
use async_stream::stream;
use faststr::FastStr;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Model output.
    Delta(FastStr),
    /// Synthetic placeholder content (fast-start or minimum floor).
    Filler(FastStr),
    Error(FastStr),
    Done,
}

impl RelayEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Text carried in a content-shaped payload, model output or filler.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Delta(text) | Self::Filler(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

impl Display for RelayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delta(t) => write!(f, "Delta({} bytes)", t.len()),
            Self::Filler(_) => write!(f, "Filler"),
            Self::Error(e) => write!(f, "Error({e})"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// The staleness timer may only fire strictly after the interval, matching
/// the `elapsed > interval` check done on arrival.
const TIMER_RESOLUTION: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Buffer {
    content:    String,
    chars:      usize,
    /// Holds something other than whitespace.
    visible:    bool,
    last_flush: Instant,
}

impl Buffer {
    fn new(now: Instant) -> Self {
        Self {
            content:    String::new(),
            chars:      0,
            visible:    false,
            last_flush: now,
        }
    }

    fn push(&mut self, text: &str) {
        self.content.push_str(text);
        self.chars += text.chars().count();
        self.visible |= !text.trim().is_empty();
    }

    fn should_flush(&self, policy: &RelayPolicy, now: Instant) -> bool {
        self.visible
            && (policy.size_exceeded(self.chars)
                || policy.interval_exceeded(now.duration_since(self.last_flush)))
    }

    /// Instant at which pending text becomes stale. Whitespace alone never
    /// goes stale.
    fn stale_at(&self, policy: &RelayPolicy) -> Option<Instant> {
        if !self.visible {
            return None;
        }
        policy
            .flush_interval
            .map(|interval| self.last_flush + interval + TIMER_RESOLUTION)
    }

    fn take(&mut self, now: Instant) -> Option<FastStr> {
        if self.content.is_empty() {
            return None;
        }
        self.chars = 0;
        self.visible = false;
        self.last_flush = now;
        Some(std::mem::take(&mut self.content).into())
    }
}

enum Step {
    Fragment(Option<Result<FastStr>>),
    FlushDue,
    TimedOut,
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

async fn pace(policy: &RelayPolicy) {
    if let Some(delay) = policy.emit_delay {
        sleep(delay).await;
    }
}

/// Relays `upstream` under `policy`.
///
/// The upstream is only polled once the returned stream is polled, and it is
/// dropped as soon as it is exhausted, fails, times out, or the returned
/// stream itself is dropped.
pub fn relay<S>(upstream: S, policy: RelayPolicy) -> impl Stream<Item = RelayEvent> + Send + 'static
where
    S: Stream<Item = Result<FastStr>> + Send + 'static,
{
    stream! {
        let started = Instant::now();
        let deadline = policy.max_duration.map(|max| started + max);
        let mut upstream = Box::pin(upstream);
        let mut buffer = Buffer::new(started);
        let mut emitted = 0usize;
        let mut failure: Option<FastStr> = None;

        if let Some(text) = policy.fast_start_text.clone() {
            yield RelayEvent::Filler(text);
        }

        loop {
            // an upstream that is always ready must not outrun the deadline
            let step = if deadline.is_some_and(|at| Instant::now() >= at) {
                Step::TimedOut
            } else {
                let stale_at = buffer.stale_at(&policy);
                tokio::select! {
                    biased;
                    _ = wait_until(deadline) => Step::TimedOut,
                    next = upstream.next() => Step::Fragment(next),
                    _ = wait_until(stale_at) => Step::FlushDue,
                }
            };

            match step {
                Step::Fragment(Some(Ok(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    buffer.push(&text);
                    // whitespace is kept but never triggers a flush on its own
                    if text.trim().is_empty() {
                        continue;
                    }
                    let now = Instant::now();
                    if buffer.should_flush(&policy, now) {
                        if let Some(chunk) = buffer.take(now) {
                            emitted += 1;
                            yield RelayEvent::Delta(chunk);
                            pace(&policy).await;
                        }
                    }
                }
                Step::Fragment(Some(Err(err))) => {
                    warn!(error = %err, delivered = emitted, "upstream failed");
                    failure = Some(err.to_string().into());
                    break;
                }
                Step::Fragment(None) => {
                    debug!(delivered = emitted, "upstream exhausted");
                    break;
                }
                Step::FlushDue => {
                    let now = Instant::now();
                    if !buffer.should_flush(&policy, now) {
                        continue;
                    }
                    if let Some(chunk) = buffer.take(now) {
                        emitted += 1;
                        yield RelayEvent::Delta(chunk);
                        pace(&policy).await;
                    }
                }
                Step::TimedOut => {
                    let err = Error::Timeout(policy.max_duration.unwrap_or_default());
                    warn!(error = %err, delivered = emitted, "upstream exceeded its time budget");
                    failure = Some(err.to_string().into());
                    break;
                }
            }
        }
        drop(upstream);

        if let Some(rest) = buffer.take(Instant::now()) {
            emitted += 1;
            yield RelayEvent::Delta(rest);
            pace(&policy).await;
        }

        match failure {
            Some(message) => {
                yield RelayEvent::Error(message);
            }
            None => {
                let missing = policy.min_events.saturating_sub(emitted);
                for _ in 0..missing {
                    yield RelayEvent::Filler(policy.filler_text.clone());
                    pace(&policy).await;
                }
                info!(
                    delivered = emitted,
                    filler = missing,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "relay completed"
                );
            }
        }

        yield RelayEvent::Done;
    }
}
