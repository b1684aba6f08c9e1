//! Channel over a child process's standard pipes.
//!
//! The child's stdout is the readable end and its stdin the writable end.
//! Closing the channel closes both pipes and reaps the child; dropping an
//! unclosed channel does the same. Spawning is left to the caller.

use std::process::{Child, ExitStatus};

use crate::endpoint::{ByteSink, ByteSource, Sink, Source};
use crate::error::Result;
use crate::unseekable::UnseekableChannel;

#[derive(Debug)]
pub struct ProcessChannel {
    child: Child,
    stream: UnseekableChannel,
    status: Option<ExitStatus>,
}

impl ProcessChannel {
    /// Adopt an already-spawned child, taking whichever of its stdin/stdout
    /// pipes exist.
    pub fn new(mut child: Child) -> Result<Self> {
        let source = child
            .stdout
            .take()
            .map(|out| Box::new(Source::with_fd(out)) as Box<dyn ByteSource>);
        let sink = child
            .stdin
            .take()
            .map(|inp| Box::new(Sink::with_fd(inp)) as Box<dyn ByteSink>);
        let stream = match UnseekableChannel::new(source, sink) {
            Ok(stream) => stream,
            Err(err) => {
                reap(&mut child);
                return Err(err);
            }
        };
        log::debug!("adopted child {} as {}", child.id(), stream.mode());
        Ok(Self {
            child,
            stream,
            status: None,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit status, once [`ProcessChannel::close`] has reaped the child.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    pub fn stream(&self) -> &UnseekableChannel {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut UnseekableChannel {
        &mut self.stream
    }

    /// Close the child's stdin so it sees end of input.
    pub fn close_write(&mut self) -> Result<()> {
        self.stream.close_write()
    }

    /// Close both pipes and wait for the child to exit.
    pub fn close(&mut self) -> Result<()> {
        let closed = self.stream.close();
        if closed.is_ok() || self.status.is_none() {
            let status = self.child.wait()?;
            log::debug!("child {} exited with {status}", self.child.id());
            self.status = Some(status);
        }
        closed
    }
}

fn reap(child: &mut Child) -> Option<ExitStatus> {
    match child.wait() {
        Ok(status) => Some(status),
        Err(err) => {
            log::warn!("child {}: wait failed: {err}", child.id());
            None
        }
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if self.stream.is_open()
            && let Err(err) = self.stream.close()
        {
            log::warn!("child {}: closing pipes on drop: {err}", self.child.id());
        }
        if self.status.is_none() {
            self.status = reap(&mut self.child);
        }
    }
}
