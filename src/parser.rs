//! Line parser for `text/event-stream`
//!
//! Lines are split on CR, LF or CRLF. Every line has a single leading byte
//! order mark removed before it is matched against `[field][: ]value`.

use core::str::Utf8Error;

use bytes::{Buf, Bytes, BytesMut};
use bytes_utils::Str;

use crate::constants::{BOM, CR, EMPTY_STR, LF};

/// Valid field names according to [html.spec.whatwg.org](https://html.spec.whatwg.org/multipage/server-sent-events.html#event-stream-interpretation), invalid field names are thrown away into [FieldName::Ignored]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Event,
    Data,
    Id,
    Retry,
    Ignored,
}

impl FieldName {
    fn from_bytes(name: &[u8]) -> Self {
        match name {
            b"event" => FieldName::Event,
            b"data" => FieldName::Data,
            b"id" => FieldName::Id,
            b"retry" => FieldName::Retry,
            _ => FieldName::Ignored,
        }
    }
}

/// A single classified line of an event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLine {
    /// Blank line, flushes the pending event
    Empty,
    /// Line starting with `:`, carries the text after the colon (one leading space removed)
    Comment(Str),
    /// `name: value` or a bare `name`, which has an empty value
    Field { name: FieldName, value: Str },
}

/// Splits a slice at the next EOL bytes, returns a tuple where the first value is the non-inclusive end of the line and the second value is the inclusive start of the remainder.
/// Returns [None] if more data is required to find the next EOL / an EOL byte is not found.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let first_match = memchr::memchr2(CR, LF, bytes)?;

    match bytes[first_match] {
        LF => Some((first_match, first_match + 1)),
        CR => {
            if first_match + 1 >= bytes.len() {
                return None; // need more data to see if it's CRLF or just CR
            }

            if bytes[first_match + 1] == LF {
                Some((first_match, first_match + 2))
            } else {
                Some((first_match, first_match + 1))
            }
        }
        _ => unreachable!(),
    }
}

/// Takes the next complete line out of the buffer, then advances the buffer past the corresponding EOL.
/// Returns [None] if the buffer contains no cr, lf or crlf. Additionally returns [None] if the buffer ends with a cr as it could end up being a crlf if more data is added.
pub fn parse_line_from_buffer(buffer: &mut BytesMut) -> Option<Bytes> {
    let (line_end, rem_start) = find_eol(buffer)?;

    let line = buffer.split_to(line_end).freeze();
    buffer.advance(rem_start - line_end);
    Some(line)
}

/// Drops a single leading BOM
fn strip_bom(line: Bytes) -> Bytes {
    if line.starts_with(BOM) {
        line.slice(BOM.len()..)
    } else {
        line
    }
}

// Safety: callers only pass sub slices of an already validated line, split at ascii bytes
fn to_str(bytes: Bytes) -> Str {
    unsafe { Str::from_inner_unchecked(bytes) }
}

/// Classifies one line (without its EOL). Lines that are not valid UTF-8 are rejected.
pub fn parse_line(line: Bytes) -> Result<EventLine, Utf8Error> {
    let line = strip_bom(line);
    str::from_utf8(&line)?;

    if line.is_empty() {
        return Ok(EventLine::Empty);
    }

    let Some(colon_pos) = memchr::memchr(b':', &line) else {
        return Ok(EventLine::Field {
            name: FieldName::from_bytes(&line),
            value: EMPTY_STR,
        });
    };

    let value_start = if line.get(colon_pos + 1) == Some(&b' ') {
        colon_pos + 2
    } else {
        colon_pos + 1
    };
    let value = to_str(line.slice(value_start..));

    if colon_pos == 0 {
        Ok(EventLine::Comment(value))
    } else {
        Ok(EventLine::Field {
            name: FieldName::from_bytes(&line[..colon_pos]),
            value,
        })
    }
}
