//! Channel configuration.
//!
//! Defaults can be overridden through the environment, read once per process:
//! - `CHANIO_BUFFER_SIZE`: capacity in bytes of the read/write buffer owned by
//!   each seekable channel (minimum 1; unparseable values are ignored).
//! - `CHANIO_REOPEN_POLICY`: how a seekable channel detects that its file was
//!   truncated or replaced behind its back before a whole-stream read.
//!   `length` (default) compares sizes only, `length+mtime` also compares the
//!   modification time, `off` disables the check.

use std::sync::OnceLock;

/// Default buffer capacity for seekable channels.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024;

/// External-change detection policy for whole-stream reads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReopenPolicy {
    /// Reopen when the file length differs from the last observation.
    #[default]
    Length,
    /// Reopen when either length or modification time differ.
    LengthAndModified,
    /// Never reopen.
    Off,
}

impl ReopenPolicy {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "length+mtime" | "mtime" | "strict" => Self::LengthAndModified,
            "off" | "none" | "disabled" => Self::Off,
            _ => Self::Length,
        }
    }

    /// Returns true if the policy performs any check.
    #[must_use]
    pub const fn enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Per-channel settings, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Capacity of the single read/write buffer.
    pub buffer_capacity: usize,
    /// External-change detection before whole-stream reads.
    pub reopen_policy: ReopenPolicy,
    /// Flush to the OS after every write.
    pub sync_on_write: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            reopen_policy: ReopenPolicy::default(),
            sync_on_write: false,
        }
    }
}

impl ChannelConfig {
    /// Default config with a specific buffer capacity (clamped to at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer_capacity: capacity.max(1),
            ..Self::default()
        }
    }

    /// Build a config from raw environment values.
    #[must_use]
    pub fn from_env_values(buffer_size: Option<&str>, reopen_policy: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(size) = buffer_size.and_then(|v| v.trim().parse::<usize>().ok()) {
            config.buffer_capacity = size.max(1);
        }
        if let Some(policy) = reopen_policy {
            config.reopen_policy = ReopenPolicy::from_str_loose(policy);
        }
        config
    }
}

static GLOBAL_CONFIG: OnceLock<ChannelConfig> = OnceLock::new();

/// Process-wide config (reads env vars on first call, caches thereafter).
#[must_use]
pub fn global_config() -> ChannelConfig {
    *GLOBAL_CONFIG.get_or_init(|| {
        let size = std::env::var("CHANIO_BUFFER_SIZE").ok();
        let policy = std::env::var("CHANIO_REOPEN_POLICY").ok();
        ChannelConfig::from_env_values(size.as_deref(), policy.as_deref())
    })
}
