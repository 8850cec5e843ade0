//! Per-connection event state built up line by line

use core::time::Duration;

use bytes_utils::{Str, StrMut};

use crate::{
    constants::{EMPTY_STR, MESSAGE_STR},
    message::Message,
    parser::{EventLine, FieldName},
};

/// Something the session has to act on after feeding a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A blank line completed an event
    Dispatch(Message),
    /// A comment line, bypasses the pending event entirely
    Comment(Message),
    /// The stream supplied a new last event id
    LastEventId(Str),
    /// The stream asked for a new reconnection delay
    Retry(Duration),
}

/// Pending type and data of the event currently being received.
///
/// Only the last event id survives a flush; it is seeded from the event source
/// when a connection starts so it persists across reconnects.
#[derive(Debug, Clone)]
pub struct EventAccumulator {
    event_type: Str,
    data: Option<StrMut>,
    last_event_id: Option<Str>,
}

impl Default for EventAccumulator {
    fn default() -> Self {
        Self {
            event_type: EMPTY_STR,
            data: None,
            last_event_id: None,
        }
    }
}

fn parse_retry(value: &str) -> Option<Duration> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok().map(Duration::from_millis)
}

impl EventAccumulator {
    pub fn new(last_event_id: Option<Str>) -> Self {
        Self {
            last_event_id,
            ..Default::default()
        }
    }

    pub fn last_event_id(&self) -> Option<&Str> {
        self.last_event_id.as_ref()
    }

    pub fn feed(&mut self, line: EventLine) -> Option<Step> {
        match line {
            EventLine::Empty => Some(Step::Dispatch(self.flush())),
            EventLine::Comment(text) => Some(Step::Comment(Message::comment(text))),
            EventLine::Field {
                name: FieldName::Event,
                value,
            } => {
                self.event_type = value;
                None
            }
            EventLine::Field {
                name: FieldName::Data,
                value,
            } => {
                // every data line after the first adds a separator, even an empty one
                match &mut self.data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(&value);
                    }
                    None => {
                        let mut data = StrMut::new();
                        data.push_str(&value);
                        self.data = Some(data);
                    }
                }
                None
            }
            EventLine::Field {
                name: FieldName::Id,
                value,
            } => {
                // a NUL would end up inside the Last-Event-ID request header
                if memchr::memchr(0, value.as_bytes()).is_some() {
                    return None;
                }
                self.last_event_id = Some(value.clone());
                Some(Step::LastEventId(value))
            }
            EventLine::Field {
                name: FieldName::Retry,
                value,
            } => parse_retry(&value).map(Step::Retry),
            EventLine::Field {
                name: FieldName::Ignored,
                ..
            } => None,
        }
    }

    fn flush(&mut self) -> Message {
        let event_type = core::mem::replace(&mut self.event_type, EMPTY_STR);
        let data = self.data.take().map(StrMut::freeze).unwrap_or(EMPTY_STR);

        Message {
            last_event_id: self.last_event_id.clone(),
            event_type: Some(if event_type.is_empty() {
                MESSAGE_STR
            } else {
                event_type
            }),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use bytes::Bytes;

    fn feed_all(acc: &mut EventAccumulator, lines: &[&'static str]) -> Vec<Step> {
        lines
            .iter()
            .filter_map(|line| acc.feed(parse_line(Bytes::from_static(line.as_bytes())).unwrap()))
            .collect()
    }

    fn dispatched(steps: Vec<Step>) -> Vec<Message> {
        steps
            .into_iter()
            .filter_map(|step| match step {
                Step::Dispatch(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn message(id: Option<&'static str>, event_type: &'static str, data: &'static str) -> Message {
        Message::new(
            id.map(Str::from_static),
            Some(Str::from_static(event_type)),
            Str::from_static(data),
        )
    }

    #[test]
    fn data_lines_join_with_newlines() {
        let mut acc = EventAccumulator::default();
        assert_eq!(
            dispatched(feed_all(&mut acc, &["data: Affe", "data", "data: Ananas", ""])),
            vec![message(None, "message", "Affe\n\nAnanas")]
        );
        assert_eq!(
            dispatched(feed_all(&mut acc, &["data: Chamäleon", "data: ", ""])),
            vec![message(None, "message", "Chamäleon\n")]
        );
        // a leading empty data line still counts as a segment
        assert_eq!(
            dispatched(feed_all(&mut acc, &["data:", "data: x", ""])),
            vec![message(None, "message", "\nx")]
        );
    }

    #[test]
    fn blank_line_without_fields_dispatches_default_type() {
        let mut acc = EventAccumulator::default();
        assert_eq!(
            dispatched(feed_all(&mut acc, &["", "event:", ""])),
            vec![message(None, "message", ""), message(None, "message", "")]
        );
    }

    #[test]
    fn type_resets_after_flush_but_id_persists() {
        let mut acc = EventAccumulator::new(Some(Str::from_static("seed")));
        let steps = feed_all(
            &mut acc,
            &["event:foobar", "data: a", "", "data: b", "", "id: 42", "event:x", ""],
        );
        assert_eq!(
            dispatched(steps),
            vec![
                message(Some("seed"), "foobar", "a"),
                message(Some("seed"), "message", "b"),
                message(Some("42"), "x", ""),
            ]
        );
        assert_eq!(acc.last_event_id().map(|id| &**id), Some("42"));
    }

    #[test]
    fn comments_bypass_pending_event() {
        let mut acc = EventAccumulator::default();
        let steps = feed_all(&mut acc, &["event:foobar", ":ping", ""]);
        assert_eq!(
            steps,
            vec![
                Step::Comment(Message::comment(Str::from_static("ping"))),
                Step::Dispatch(message(None, "foobar", "")),
            ]
        );
    }

    #[test]
    fn id_with_nul_is_ignored() {
        let mut acc = EventAccumulator::new(Some(Str::from_static("1")));
        assert!(feed_all(&mut acc, &["id: a\0b"]).is_empty());
        assert_eq!(acc.last_event_id().map(|id| &**id), Some("1"));

        assert_eq!(
            feed_all(&mut acc, &["id"]),
            vec![Step::LastEventId(Str::from_static(""))]
        );
    }

    #[test]
    fn retry_accepts_digits_only() {
        let mut acc = EventAccumulator::default();
        assert_eq!(
            feed_all(&mut acc, &["retry: 1500", "retry: abc", "retry: -5", "retry:", "retry: +5"]),
            vec![Step::Retry(Duration::from_millis(1500))]
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut acc = EventAccumulator::default();
        assert_eq!(
            dispatched(feed_all(&mut acc, &["foo: bar", "data: x", ""])),
            vec![message(None, "message", "x")]
        );
    }
}
