//! Process-wide descriptor table.
//!
//! Handlers are registered under small integers the way the kernel numbers
//! file descriptors: 0, 1 and 2 are the standard streams, and every open or
//! clone takes the next number from a monotonically increasing counter.
//! Numbers are never reused.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::{ChannelConfig, global_config};
use crate::error::{ChannelError, Result};
use crate::handler::{Channel, Handler};
use crate::mode::ModeDescriptor;
use crate::unseekable::UnseekableChannel;

/// First descriptor number handed out after the standard streams.
pub const FIRST_USER_FILENO: i32 = 3;

/// Handler shared between the table and its callers.
pub type SharedHandler = Arc<Mutex<Handler>>;

pub struct DescriptorTable {
    handlers: Mutex<HashMap<i32, SharedHandler>>,
    next_fileno: AtomicI32,
    config: ChannelConfig,
}

impl std::fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorTable")
            .field("descriptors", &self.descriptors())
            .field("next_fileno", &self.next_fileno.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorTable {
    /// Table with the standard streams registered, using the process-wide
    /// config for files it opens.
    pub fn new() -> Self {
        Self::with_config(global_config())
    }

    pub fn with_config(config: ChannelConfig) -> Self {
        let mut handlers = HashMap::new();
        for (fileno, channel) in [
            (libc::STDIN_FILENO, UnseekableChannel::stdin()),
            (libc::STDOUT_FILENO, UnseekableChannel::stdout()),
            (libc::STDERR_FILENO, UnseekableChannel::stderr()),
        ] {
            let handler = Handler::new(fileno, Channel::Unseekable(channel));
            handlers.insert(fileno, Arc::new(Mutex::new(handler)));
        }
        Self {
            handlers: Mutex::new(handlers),
            next_fileno: AtomicI32::new(FIRST_USER_FILENO),
            config,
        }
    }

    pub fn config(&self) -> ChannelConfig {
        self.config
    }

    fn alloc_fileno(&self) -> i32 {
        self.next_fileno.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, handler: Handler) -> i32 {
        let fileno = handler.fileno();
        self.handlers
            .lock()
            .insert(fileno, Arc::new(Mutex::new(handler)));
        fileno
    }

    /// Open `path` and register it. Null device names open a null channel.
    pub fn open(&self, path: impl AsRef<Path>, mode: ModeDescriptor) -> Result<i32> {
        let path = path.as_ref();
        let channel = Channel::open(path, mode, self.config)?;
        let fileno = self.register(channel);
        log::debug!("fd {fileno}: opened {} as {mode}", path.display());
        Ok(fileno)
    }

    /// Register an already-built channel under a fresh descriptor number.
    pub fn register(&self, channel: Channel) -> i32 {
        let fileno = self.alloc_fileno();
        self.insert(Handler::new(fileno, channel))
    }

    /// Look up a live descriptor.
    pub fn get(&self, fileno: i32) -> Result<SharedHandler> {
        self.handlers
            .lock()
            .get(&fileno)
            .cloned()
            .ok_or(ChannelError::ClosedHandle)
    }

    /// Clone `fileno` onto a new descriptor with its own OS handle.
    pub fn clone_descriptor(&self, fileno: i32) -> Result<i32> {
        let handler = self.get(fileno)?;
        let new_fileno = self.alloc_fileno();
        let clone = handler.lock().try_clone(new_fileno)?;
        log::debug!("fd {fileno}: cloned to fd {new_fileno}");
        Ok(self.insert(clone))
    }

    /// Point `fileno` at a different file, keeping the number.
    pub fn reopen(&self, fileno: i32, path: impl AsRef<Path>, mode: ModeDescriptor) -> Result<()> {
        let handler = self.get(fileno)?;
        let path = path.as_ref();
        handler.lock().reopen(path, mode, self.config)?;
        log::debug!("fd {fileno}: reopened {} as {mode}", path.display());
        Ok(())
    }

    /// Close and unregister `fileno`. The descriptor is gone afterwards even
    /// if the close itself reports an error.
    pub fn close(&self, fileno: i32) -> Result<()> {
        let handler = self
            .handlers
            .lock()
            .remove(&fileno)
            .ok_or(ChannelError::ClosedHandle)?;
        let result = handler.lock().close();
        match &result {
            Ok(()) => log::debug!("fd {fileno}: closed"),
            Err(err) => log::warn!("fd {fileno}: close failed: {err}"),
        }
        result
    }

    pub fn contains(&self, fileno: i32) -> bool {
        self.handlers.lock().contains_key(&fileno)
    }

    /// Registered descriptor numbers, ascending.
    pub fn descriptors(&self) -> Vec<i32> {
        let mut fds: Vec<i32> = self.handlers.lock().keys().copied().collect();
        fds.sort_unstable();
        fds
    }
}

/// The process-wide table, created on first use.
pub fn global_table() -> &'static DescriptorTable {
    static TABLE: OnceLock<DescriptorTable> = OnceLock::new();
    TABLE.get_or_init(DescriptorTable::new)
}
