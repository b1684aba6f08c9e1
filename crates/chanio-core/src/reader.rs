//! Line, paragraph, and exact-length reads over any [`ByteStream`].
//!
//! Reference: POSIX `fgets`/`getc`/`ungetc`/`fread` semantics, with the
//! separator generalized to an arbitrary byte string.

use crate::error::Result;
use crate::stream::ByteStream;

/// Separator for [`LineAndBlockReader::read_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSeparator<'a> {
    /// Stop after this byte sequence.
    Delimiter(&'a [u8]),
    /// Stop after a blank line, then skip any further newlines.
    Paragraph,
    /// No separator: read to end of stream.
    WholeStream,
}

impl<'a> LineSeparator<'a> {
    /// `None` reads the whole stream; an empty separator selects paragraph
    /// mode.
    pub fn from_bytes(sep: Option<&'a [u8]>) -> Self {
        match sep {
            None => Self::WholeStream,
            Some([]) => Self::Paragraph,
            Some(bytes) => Self::Delimiter(bytes),
        }
    }
}

impl Default for LineSeparator<'_> {
    fn default() -> Self {
        Self::Delimiter(b"\n")
    }
}

const PARAGRAPH: &[u8] = b"\n\n";

/// Reader layered on a pushback-capable byte stream.
#[derive(Debug)]
pub struct LineAndBlockReader<S> {
    stream: S,
}

impl<S: ByteStream> LineAndBlockReader<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Read through the next separator, which is kept in the result.
    ///
    /// A final line without a separator is returned as is; `Ok(None)` only
    /// when the stream was already exhausted.
    pub fn read_line(&mut self, separator: LineSeparator<'_>) -> Result<Option<Vec<u8>>> {
        match separator {
            LineSeparator::WholeStream => self.read_whole_stream(),
            LineSeparator::Delimiter(sep) => self.read_delimited(sep),
            LineSeparator::Paragraph => {
                let line = self.read_delimited(PARAGRAPH)?;
                if line.is_some() {
                    self.skip_newlines()?;
                }
                Ok(line)
            }
        }
    }

    fn read_delimited(&mut self, sep: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        while let Some(b) = self.stream.read_byte()? {
            line.push(b);
            if !sep.is_empty() && line.ends_with(sep) {
                break;
            }
        }
        Ok((!line.is_empty()).then_some(line))
    }

    fn skip_newlines(&mut self) -> Result<()> {
        while let Some(b) = self.stream.read_byte()? {
            if b != b'\n' {
                self.stream.unread_byte(b);
                break;
            }
        }
        Ok(())
    }

    /// Everything up to end of stream; `Ok(None)` if nothing remains.
    pub fn read_whole_stream(&mut self) -> Result<Option<Vec<u8>>> {
        self.stream.read_to_end()
    }

    /// Up to `n` bytes, short only at end of stream. `Ok(None)` when the
    /// stream was already exhausted and `n > 0`.
    pub fn read_exactly(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        if n == 0 {
            return Ok(Some(Vec::new()));
        }
        let mut out = Vec::new();
        while out.len() < n {
            match self.stream.read_block(n - out.len())? {
                Some(chunk) if !chunk.is_empty() => out.extend_from_slice(&chunk),
                _ => break,
            }
        }
        Ok((!out.is_empty()).then_some(out))
    }

    pub fn get_char(&mut self) -> Result<Option<u8>> {
        self.stream.read_byte()
    }

    /// Push `c` back for the next read. Negative values (end-of-file
    /// sentinels) are ignored; others are truncated to a byte.
    pub fn unget_char(&mut self, c: i32) {
        if c >= 0 {
            self.stream.unread_byte(c as u8);
        }
    }
}
