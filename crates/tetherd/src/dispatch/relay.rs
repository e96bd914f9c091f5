//! Output sinks that forward every write to the client as it happens.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::{mem, str};

use tether_protocol::{EmitTarget, ProtocolError, RelayMessage, write_relay};

/// Writer that turns each write into one `emit-*` relay message.
///
/// Both sinks of a session borrow the same connection writer, so messages
/// from stdout and stderr interleave on the wire in the order they were
/// produced. Empty and whitespace-only writes are dropped. A multi-byte
/// character split across writes is held back until it is complete.
pub(crate) struct RelaySink<'a, W: Write> {
    target: EmitTarget,
    writer: &'a RefCell<W>,
    pending: Vec<u8>,
}

impl<'a, W: Write> RelaySink<'a, W> {
    pub(crate) const fn new(target: EmitTarget, writer: &'a RefCell<W>) -> Self {
        Self {
            target,
            writer,
            pending: Vec::new(),
        }
    }

    /// Sends `text` immediately as a single relay message.
    pub(crate) fn send(&self, text: &str) -> io::Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let message = RelayMessage::emit(self.target, text);
        write_relay(&mut *self.writer.borrow_mut(), &message).map_err(into_io)
    }
}

impl<W: Write> RelaySink<'_, W> {
    fn send_pending(&mut self) -> io::Result<()> {
        let bytes = mem::take(&mut self.pending);
        self.send(&String::from_utf8_lossy(&bytes))
    }
}

impl<W: Write> Write for RelaySink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let complete = match str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            // Only an unfinished sequence at the end is worth waiting for.
            Err(error) if error.error_len().is_none() => error.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let tail = self.pending.split_off(complete);
        self.send_pending()?;
        self.pending = tail;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.send_pending()?;
        }
        self.writer.borrow_mut().flush()
    }

    // `writeln!` would otherwise split a line into several writes, relaying
    // the text and its newline as separate messages.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.send_pending()?;
        }
        self.send(&fmt::format(args))
    }
}

fn into_io(error: ProtocolError) -> io::Error {
    match error {
        ProtocolError::Io(source) => source,
        other => io::Error::other(other),
    }
}
