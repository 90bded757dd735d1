//! Incremental command parsing for client connections and append-only file replay.
//!
//! A [`CommandReader`] pulls bytes from any async source into a buffer and
//! decodes one command at a time. Two framings are understood: the binary
//! multibulk framing (`*<n>\r\n` followed by `n` bulk strings) and the legacy
//! inline framing (a single space separated line, as typed in a telnet session).
//!
//! Parsing is always restarted from the head of the buffer. When the buffered
//! bytes do not yet hold a complete command, [`parse_frame`] reports that more
//! data is needed without consuming anything.

use std::ops::Range;
use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::resp::RespValue;

/// Largest element count accepted in a multibulk header.
pub const MAX_MULTIBULK_LENGTH: i64 = 1024 * 1024;
/// Largest bulk string accepted in a multibulk request.
pub const MAX_BULK_LENGTH: u64 = 512 * 1024 * 1024;
/// Longest line (inline request or length header) accepted without a LF.
pub const MAX_INLINE_LENGTH: usize = 64 * 1024;

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Malformed input. Fatal for the connection (or the replay) it occurs on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Protocol error: invalid multibulk length")]
    InvalidMultibulkLength,
    #[error("Protocol error: invalid bulk length")]
    InvalidBulkLength,
    #[error("Protocol error: expected '$', got '{0}'")]
    UnexpectedByte(char),
    #[error("Protocol error: invalid bulk terminator")]
    InvalidBulkTerminator,
    #[error("Protocol error: unbalanced quotes in request")]
    UnbalancedQuotes,
    #[error("Protocol error: too big inline request")]
    TooBigInlineRequest,
}

impl ProtocolError {
    /// The error reply sent to the client before the connection is closed.
    pub fn to_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}

/// Errors that can occur while reading commands from a source.
#[derive(Error, Debug, PartialEq)]
pub enum CommandReadError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("input ended inside a command ({0} bytes pending)")]
    TruncatedInput(usize),
}

/// A decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The exact bytes the command was decoded from.
    pub raw: Bytes,
    /// Command name followed by its arguments. Empty for no-op requests.
    pub arguments: Vec<Bytes>,
    /// Whether the command used the inline framing.
    pub inline: bool,
    /// Whether replies and staged log bytes should be pushed out after
    /// this command.
    pub flush: bool,
}

/// Location of one complete command at the head of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Number of bytes the command spans.
    pub len: usize,
    /// Byte ranges of each argument within those bytes.
    pub arguments: Vec<Range<usize>>,
    pub inline: bool,
}

/// Tries to decode one command from the head of `data`.
///
/// Returns `Ok(None)` when `data` holds only part of a command.
pub fn parse_frame(data: &[u8]) -> Result<Option<Frame>, ProtocolError> {
    match data.first() {
        None => Ok(None),
        Some(b'*') => parse_multibulk(data),
        Some(_) => parse_inline(data),
    }
}

fn parse_multibulk(data: &[u8]) -> Result<Option<Frame>, ProtocolError> {
    let Some(header_end) = find_line_end(data, 1, ProtocolError::InvalidMultibulkLength)? else {
        return Ok(None);
    };

    let count: i64 =
        parse_length(&data[1..header_end]).ok_or(ProtocolError::InvalidMultibulkLength)?;

    if count <= 0 {
        return Ok(Some(Frame {
            len: header_end + 1,
            arguments: Vec::new(),
            inline: false,
        }));
    }

    if count > MAX_MULTIBULK_LENGTH {
        return Err(ProtocolError::InvalidMultibulkLength);
    }

    let mut arguments = Vec::with_capacity(count.min(1024) as usize);
    let mut position = header_end + 1;

    for _ in 0..count {
        let Some(&prefix) = data.get(position) else {
            return Ok(None);
        };

        if prefix != b'$' {
            return Err(ProtocolError::UnexpectedByte(prefix as char));
        }

        let Some(line_end) = find_line_end(data, position + 1, ProtocolError::InvalidBulkLength)?
        else {
            return Ok(None);
        };

        let length: u64 = parse_length(&data[position + 1..line_end])
            .ok_or(ProtocolError::InvalidBulkLength)?;

        if length > MAX_BULK_LENGTH {
            return Err(ProtocolError::InvalidBulkLength);
        }

        let start = line_end + 1;
        let end = start + length as usize;

        if data.len() < end + 2 {
            return Ok(None);
        }

        if &data[end..end + 2] != b"\r\n" {
            return Err(ProtocolError::InvalidBulkTerminator);
        }

        arguments.push(start..end);
        position = end + 2;
    }

    Ok(Some(Frame {
        len: position,
        arguments,
        inline: false,
    }))
}

fn parse_inline(data: &[u8]) -> Result<Option<Frame>, ProtocolError> {
    let Some(line_end) = find_line_end(data, 0, ProtocolError::TooBigInlineRequest)? else {
        return Ok(None);
    };

    let content_end = match line_end.checked_sub(1) {
        Some(cr) if data[cr] == b'\r' => cr,
        _ => line_end,
    };

    Ok(Some(Frame {
        len: line_end + 1,
        arguments: split_inline_args(&data[..content_end])?,
        inline: true,
    }))
}

/// Splits an inline request line into argument ranges.
///
/// Arguments are separated by spaces. A double quote may only open an
/// argument at the start of the line or right after a space; everything up
/// to the matching close quote is taken verbatim, spaces included.
///
/// # Examples
///
/// ```
/// use redis_aof::input::split_inline_args;
///
/// let line = b"set \"a b\" 1";
/// let arguments: Vec<&[u8]> = split_inline_args(line)
///     .unwrap()
///     .into_iter()
///     .map(|range| &line[range])
///     .collect();
///
/// assert_eq!(arguments, vec![&b"set"[..], &b"a b"[..], &b"1"[..]]);
/// ```
pub fn split_inline_args(line: &[u8]) -> Result<Vec<Range<usize>>, ProtocolError> {
    let mut arguments = Vec::new();
    let mut i = 0;

    while i < line.len() {
        match line[i] {
            // Runs of spaces collapse; no empty arguments outside quotes.
            b' ' => i += 1,
            b'"' => {
                let start = i + 1;
                let Some(offset) = line[start..].iter().position(|&b| b == b'"') else {
                    return Err(ProtocolError::UnbalancedQuotes);
                };
                let end = start + offset;

                // The closing quote must end the argument.
                if matches!(line.get(end + 1), Some(&b) if b != b' ') {
                    return Err(ProtocolError::UnbalancedQuotes);
                }

                arguments.push(start..end);
                i = end + 1;
            }
            _ => {
                let start = i;

                while i < line.len() && line[i] != b' ' {
                    if line[i] == b'"' {
                        return Err(ProtocolError::UnbalancedQuotes);
                    }
                    i += 1;
                }

                arguments.push(start..i);
            }
        }
    }

    Ok(arguments)
}

/// Position of the first LF at or after `from`.
fn find_line_end(
    data: &[u8],
    from: usize,
    too_long: ProtocolError,
) -> Result<Option<usize>, ProtocolError> {
    let search = data.get(from..).unwrap_or_default();

    match search.iter().position(|&b| b == b'\n') {
        Some(offset) => Ok(Some(from + offset)),
        None if search.len() > MAX_INLINE_LENGTH => Err(too_long),
        None => Ok(None),
    }
}

/// Parses a decimal length from a header line that must end in CR.
fn parse_length<T: FromStr>(line: &[u8]) -> Option<T> {
    let digits = line.strip_suffix(b"\r")?;
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Reads commands one at a time from a byte source.
#[derive(Debug)]
pub struct CommandReader<R> {
    source: R,
    buffer: BytesMut,
    lookahead: Option<Result<Command, ProtocolError>>,
}

impl<R> CommandReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: BytesMut::new(),
            lookahead: None,
        }
    }

    /// Returns the next command, pulling from the source as needed.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Command))` - A complete command
    /// * `Ok(None)` - The source ended cleanly between commands
    /// * `Err(CommandReadError::Protocol)` - The input is malformed
    /// * `Err(CommandReadError::TruncatedInput)` - The source ended inside a command
    /// * `Err(CommandReadError::IoError)` - Reading from the source failed
    pub async fn read_command(&mut self) -> Result<Option<Command>, CommandReadError> {
        if let Some(next) = self.lookahead.take() {
            return Ok(Some(self.complete(next?)));
        }

        loop {
            if let Some(frame) = parse_frame(&self.buffer)? {
                let command = self.split_command(frame);
                return Ok(Some(self.complete(command)));
            }

            if self.fill_buffer().await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }

                return Err(CommandReadError::TruncatedInput(self.buffer.len()));
            }
        }
    }

    async fn fill_buffer(&mut self) -> Result<usize, CommandReadError> {
        // Partially received commands stay in place; the buffer only
        // reallocates when they outgrow its spare capacity.
        self.buffer.reserve(READ_CHUNK_SIZE);

        self.source
            .read_buf(&mut self.buffer)
            .await
            .map_err(|e| CommandReadError::IoError(e.to_string()))
    }

    fn split_command(&mut self, frame: Frame) -> Command {
        let raw = self.buffer.split_to(frame.len).freeze();
        let arguments = frame
            .arguments
            .into_iter()
            .map(|range| raw.slice(range))
            .collect();

        Command {
            raw,
            arguments,
            inline: frame.inline,
            flush: false,
        }
    }

    /// Sets the flush flag. A command is a flush point unless another
    /// complete command is already buffered behind it, in which case that
    /// command is decoded now and handed out by the next call.
    fn complete(&mut self, mut command: Command) -> Command {
        command.flush = if command.inline || self.buffer.is_empty() {
            true
        } else {
            match parse_frame(&self.buffer) {
                Ok(Some(frame)) => {
                    let next = self.split_command(frame);
                    self.lookahead = Some(Ok(next));
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    self.lookahead = Some(Err(e));
                    true
                }
            }
        };

        command
    }
}
