//! # chanio-core
//!
//! Buffered, seekable file channels and unbuffered stream channels with
//! POSIX-like semantics: fopen-style modes, one shared read/write buffer with
//! lazy direction switching, exact position accounting, pushback, line
//! reads, truncation, sync, and descriptor cloning.
//!
//! # Architecture
//!
//! - **Modes** (`mode`): mode strings and open-flag bitmasks
//! - **Buffer** (`buffer`): the single read/write buffer and its state machine
//! - **Seekable channel** (`seekable`): buffered file I/O over an owned handle
//! - **Unseekable channel** (`unseekable`): pass-through pipes and sockets
//! - **Process channel** (`process`): a child's stdin/stdout as one channel
//! - **Null channel** (`null`): the bit bucket
//! - **Reader** (`reader`): lines, paragraphs, exact-length reads
//! - **Handler** (`handler`): one descriptor over any channel kind
//! - **Registry** (`registry`): the descriptor table
//! - **Configuration** (`config`): buffer size and reopen policy
//!
//! Channels are synchronous and not internally synchronized; share one across
//! threads only through the [`registry::SharedHandler`] lock.

#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod mode;
pub mod null;
pub mod process;
pub mod reader;
pub mod registry;
pub mod seekable;
pub mod stream;
#[allow(unsafe_code)]
mod sys;
pub mod unseekable;

pub use config::{ChannelConfig, ReopenPolicy};
pub use error::{ChannelError, Result};
pub use handler::{Channel, Handler};
pub use mode::ModeDescriptor;
pub use null::NullChannel;
pub use process::ProcessChannel;
pub use reader::{LineAndBlockReader, LineSeparator};
pub use registry::{DescriptorTable, SharedHandler, global_table};
pub use seekable::{BufferedChannel, Whence};
pub use stream::ByteStream;
pub use unseekable::UnseekableChannel;
