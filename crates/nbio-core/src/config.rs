//! Ambient tunables threaded explicitly into stream constructors.

use std::time::Duration;

/// The non-blocking write/read batch size used when a pipe read requests
/// "any amount" (`length == 0`).
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Per-stream tunables.
///
/// There is no global mutable configuration: every constructor in
/// `nbio-native` takes a `StreamConfig` (or defaults to
/// [`StreamConfig::default`]).
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Non-blocking read/write batch size; also the default `length` for a
    /// pipe read requesting "any amount".
    pub chunk_size: usize,
    /// Timeout applied when a caller does not specify one, `None` for "wait
    /// forever".
    pub default_timeout: Option<Duration>,
    /// High-water mark applied to memory streams that do not specify one;
    /// `0` means unlimited.
    pub default_high_water_mark: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            default_timeout: None,
            default_high_water_mark: 0,
        }
    }
}

impl StreamConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything missing or unparsable.
    ///
    /// Intended for test harnesses and demo binaries, not for library code
    /// that embeds this crate: there is no implicit `from_env` call anywhere
    /// in a stream constructor.
    ///
    /// - `NBIO_CHUNK_SIZE`: bytes, must be > 0.
    /// - `NBIO_DEFAULT_TIMEOUT_MS`: milliseconds.
    /// - `NBIO_DEFAULT_HWM`: bytes.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let chunk_size = std::env::var("NBIO_CHUNK_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.chunk_size);
        let default_timeout = std::env::var("NBIO_DEFAULT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .or(defaults.default_timeout);
        let default_high_water_mark = std::env::var("NBIO_DEFAULT_HWM")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.default_high_water_mark);
        Self {
            chunk_size,
            default_timeout,
            default_high_water_mark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_chunk_size() {
        let cfg = StreamConfig::default();
        assert_eq!(cfg.chunk_size, 8192);
        assert_eq!(cfg.default_high_water_mark, 0);
        assert!(cfg.default_timeout.is_none());
    }

    #[test]
    fn from_env_falls_back_on_missing_vars() {
        std::env::remove_var("NBIO_CHUNK_SIZE");
        std::env::remove_var("NBIO_DEFAULT_TIMEOUT_MS");
        std::env::remove_var("NBIO_DEFAULT_HWM");
        let cfg = StreamConfig::from_env();
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
