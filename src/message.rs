//! Messages handed to listeners, modelled on the `MessageEvent` of <https://html.spec.whatwg.org/multipage/server-sent-events.html>

use bytes_utils::Str;

/// Immutable message dispatched to listeners.
///
/// Comment lines are delivered as messages too: they have neither an id nor a
/// type and are only visible to the any-message listener.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Last event id known when the message was dispatched
    pub last_event_id: Option<Str>,
    /// Event type, `"message"` unless the stream named one, [None] for comments
    pub event_type: Option<Str>,
    /// `data` lines joined with `\n`
    pub data: Str,
}

impl Message {
    pub fn new(last_event_id: Option<Str>, event_type: Option<Str>, data: impl Into<Str>) -> Self {
        Self {
            last_event_id,
            event_type,
            data: data.into(),
        }
    }

    /// A comment line, e.g. `:ping`
    pub fn comment(text: impl Into<Str>) -> Self {
        Self::new(None, None, text)
    }

    pub fn is_comment(&self) -> bool {
        self.event_type.is_none()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Deserialise the data of this message as JSON
    #[cfg(feature = "json")]
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_str(&self.data)
    }
}
