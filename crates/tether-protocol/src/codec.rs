//! Message framing and incremental decoding.
//!
//! Requests are the only newline-delimited messages: the service reads them
//! line by line. Relay messages are written back to back with no separator,
//! so readers walk a buffer value by value, advancing a byte offset past each
//! parsed value until only whitespace remains.

use std::io::{BufRead, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::de::SliceRead;
use serde_json::{Deserializer, StreamDeserializer};

use crate::error::ProtocolError;
use crate::message::{RelayMessage, Request};

/// Maximum size of a single request line in bytes.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Writes a request followed by the newline delimiter and flushes.
///
/// # Errors
///
/// Returns an error if serialisation or the transport write fails.
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<(), ProtocolError> {
    let mut payload = encode(request)?;
    payload.push(b'\n');
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Writes a relay message with no delimiter and flushes.
///
/// # Errors
///
/// Returns an error if serialisation or the transport write fails.
pub fn write_relay<W: Write>(writer: &mut W, message: &RelayMessage) -> Result<(), ProtocolError> {
    let payload = encode(message)?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(value).map_err(ProtocolError::Encode)
}

/// Reads one newline-terminated request line.
///
/// Returns `Ok(None)` when the peer closed the connection before sending any
/// byte. A final line without a trailing newline is returned as-is.
///
/// # Errors
///
/// Returns [`ProtocolError::RequestTooLarge`] when the line exceeds
/// [`MAX_REQUEST_BYTES`], or [`ProtocolError::Io`] when reading fails.
pub fn read_request_line<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let limit = u64::try_from(MAX_REQUEST_BYTES)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    let mut line = Vec::new();
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if line.len() > MAX_REQUEST_BYTES {
        return Err(ProtocolError::RequestTooLarge {
            size: line.len(),
            max_size: MAX_REQUEST_BYTES,
        });
    }
    Ok(Some(line))
}

/// Iterator over JSON values concatenated in one buffer.
///
/// Each item is the next complete value starting at the current offset; the
/// offset then moves to the byte just past that value. Iteration ends when
/// only whitespace remains or after the first error.
pub struct Concatenated<'a, T: DeserializeOwned> {
    stream: StreamDeserializer<'a, SliceRead<'a>, T>,
}

impl<T: DeserializeOwned> Concatenated<'_, T> {
    /// Byte offset just past the last value yielded.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.stream.byte_offset()
    }
}

impl<T: DeserializeOwned> Iterator for Concatenated<'_, T> {
    type Item = Result<T, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.stream.byte_offset();
        self.stream
            .next()
            .map(|result| result.map_err(|source| ProtocolError::decode(offset, source)))
    }
}

/// Decodes every JSON value concatenated in `buffer`, in order.
#[must_use]
pub fn decode_concatenated<T: DeserializeOwned>(buffer: &[u8]) -> Concatenated<'_, T> {
    Concatenated {
        stream: Deserializer::from_slice(buffer).into_iter(),
    }
}

/// Accumulates transport chunks and yields complete messages.
///
/// Chunks arrive with no alignment to message boundaries, so a value cut off
/// at the end of one chunk stays buffered until the next chunk completes it.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    pending: Vec<u8>,
}

enum Step<T> {
    Value(T, usize),
    Incomplete,
    Drained,
    Invalid(ProtocolError),
}

impl MessageBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Appends a chunk read from the transport.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Number of buffered bytes not yet consumed.
    #[must_use]
    pub const fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Takes the next complete message from the buffer.
    ///
    /// Returns `Ok(None)` when the buffer holds nothing but whitespace or an
    /// incomplete trailing value.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] when the buffered bytes are not valid
    /// JSON. The buffer is discarded so the next chunk starts afresh.
    pub fn next_message<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtocolError> {
        let step = {
            let mut values = decode_concatenated::<T>(&self.pending);
            match values.next() {
                Some(Ok(value)) => Step::Value(value, values.offset()),
                Some(Err(error)) if error.is_incomplete() => Step::Incomplete,
                Some(Err(error)) => Step::Invalid(error),
                None => Step::Drained,
            }
        };

        match step {
            Step::Value(value, consumed) => {
                self.pending.drain(..consumed);
                Ok(Some(value))
            }
            Step::Incomplete => Ok(None),
            Step::Drained => {
                self.pending.clear();
                Ok(None)
            }
            Step::Invalid(error) => {
                self.pending.clear();
                Err(error)
            }
        }
    }
}
