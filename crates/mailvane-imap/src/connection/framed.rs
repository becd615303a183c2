//! Framed I/O for the IMAP protocol.
//!
//! Responses are CRLF-terminated lines, but a line that ends with a
//! `{n}` length header continues with n raw literal bytes and then more
//! line text. The reader preserves those boundaries as [`Chunk`]s: the
//! fetch assembler needs to know which payload belongs to which
//! segment, and line-oriented parsers rejoin the chunks with
//! [`flatten`](crate::parser::flatten).

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::parser::Chunk;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Buffered reader/writer speaking IMAP framing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a framed stream over the given transport.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one logical response: line segments plus their literal
    /// payloads, chunk boundaries preserved.
    ///
    /// # Errors
    ///
    /// Fails on connection loss, oversized lines or literals, or
    /// non-UTF-8 response line text.
    pub async fn read_response(&mut self) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();

        loop {
            let line = self.read_line().await?;
            let text = line_text(&line)?;

            if let Some(count) = literal_suffix(&text) {
                if count > MAX_LITERAL_SIZE {
                    return Err(Error::Protocol(format!(
                        "literal too large: {count} bytes (max {MAX_LITERAL_SIZE})"
                    )));
                }
                let mut payload = vec![0u8; count];
                self.reader.read_exact(&mut payload).await?;
                chunks.push(Chunk::Tuple { text, payload });
            } else {
                chunks.push(Chunk::Bare(text));
                break;
            }
        }

        Ok(chunks)
    }

    /// Reads responses until the tagged completion for `tag`, which is
    /// included as the last element.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<Chunk>>> {
        let mut responses = Vec::new();

        loop {
            let response = self.read_response().await?;
            let tagged = matches!(
                response.first(),
                Some(Chunk::Bare(text) | Chunk::Tuple { text, .. })
                    if text.strip_prefix(tag).is_some_and(|r| r.starts_with(' '))
            );
            responses.push(response);
            if tagged {
                break;
            }
        }

        Ok(responses)
    }

    /// Writes a serialized command and flushes.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Consumes the framed stream and returns the transport.
    ///
    /// Any buffered read data is lost; only call between complete
    /// exchanges (the STARTTLS upgrade point).
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = find_crlf(buf) {
                line.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }

        Ok(line)
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn line_text(line: &[u8]) -> Result<String> {
    let line = line.strip_suffix(b"\r\n").unwrap_or(line);
    String::from_utf8(line.to_vec())
        .map_err(|_| Error::parse(0, "response line is not valid UTF-8"))
}

/// Parses a `{n}`/`{n+}` length header at the end of a line.
fn literal_suffix(text: &str) -> Option<usize> {
    let inner = text.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    let digits = inner[open + 1..].strip_suffix('+').unwrap_or(&inner[open + 1..]);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
