//! Process configuration, read once at startup from environment variables.

use crate::error::{Error, Result};
use crate::proxy::OpenAIClientConfig;
use crate::stream::RelayPolicy;
use crate::stream::policy::{DEFAULT_FLUSH_CHARS, DEFAULT_MAX_DURATION, DEFAULT_MIN_EVENTS};
use faststr::FastStr;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen_addr:     SocketAddr,
    pub connect_timeout: Duration,
    pub upstream:        OpenAIClientConfig,
    pub policy:          RelayPolicy,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset and empty values
    /// fall back to defaults; values that fail to parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = parse_or(&get, "RELAY_LISTEN_ADDR", || {
            SocketAddr::from_str(DEFAULT_LISTEN_ADDR).map_err(|e| Error::Config {
                key:    "RELAY_LISTEN_ADDR",
                reason: e.to_string().into(),
            })
        })?;
        let connect_timeout = Duration::from_secs(parse_or(&get, "RELAY_CONNECT_TIMEOUT_SECS", || {
            Ok(DEFAULT_CONNECT_TIMEOUT_SECS)
        })?);

        let upstream = OpenAIClientConfig {
            name:        "openai".into(),
            api_key:     get("OPENAI_API_KEY").map(FastStr::from),
            api_base:    get("OPENAI_API_BASE")
                .map(FastStr::from)
                .unwrap_or_else(|| FastStr::from_static_str(DEFAULT_API_BASE)),
            model:       get("RELAY_MODEL")
                .map(FastStr::from)
                .unwrap_or_else(|| FastStr::from_static_str(DEFAULT_MODEL)),
            temperature: Some(parse_or(&get, "RELAY_TEMPERATURE", || Ok(DEFAULT_TEMPERATURE))?),
            wrap_prompt: parse_bool_or(&get, "RELAY_WRAP_PROMPT", true)?,
        };

        let defaults = RelayPolicy::default();
        let policy = RelayPolicy {
            flush_chars: Some(parse_or(&get, "RELAY_FLUSH_CHARS", || Ok(DEFAULT_FLUSH_CHARS))?),
            flush_interval: millis_or(&get, "RELAY_FLUSH_INTERVAL_MS", defaults.flush_interval)?,
            min_events: parse_or(&get, "RELAY_MIN_EVENTS", || Ok(DEFAULT_MIN_EVENTS))?,
            fast_start_text: if parse_bool_or(&get, "RELAY_FAST_START", true)? {
                defaults.fast_start_text.clone()
            } else {
                None
            },
            emit_delay: millis_or(&get, "RELAY_EMIT_DELAY_MS", None)?,
            max_duration: match get("RELAY_MAX_DURATION_SECS") {
                Some(raw) => nonzero(Duration::from_secs(parse_value("RELAY_MAX_DURATION_SECS", &raw)?)),
                None => Some(DEFAULT_MAX_DURATION),
            },
            ..defaults
        };

        Ok(Self {
            listen_addr,
            connect_timeout,
            upstream,
            policy,
        })
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| Error::Config {
        key,
        reason: format!("{raw:?}: {e}").into(),
    })
}

fn parse_or<G, T, D>(get: &G, key: &'static str, default: D) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
    D: FnOnce() -> Result<T>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => default(),
    }
}

fn parse_bool_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config {
            key,
            reason: format!("{raw:?} is not a boolean").into(),
        }),
    }
}

/// Milliseconds setting where `0` switches the feature off.
fn millis_or<G>(get: &G, key: &'static str, default: Option<Duration>) -> Result<Option<Duration>>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => Ok(nonzero(Duration::from_millis(parse_value(key, &raw)?))),
        None => Ok(default),
    }
}

fn nonzero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}
