//! Outbound request headers

use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue,
};
use tracing::warn;
use url::Url;

use crate::{
    auth::basic_authorization,
    constants::{ACCEPT_ENCODING_IDENTITY, ACCEPT_EVENT_STREAM, CACHE_CONTROL_NO_STORE, LAST_EVENT_ID},
};

/// Headers sent with every connection attempt, before the before-open hook gets to see them
pub(crate) fn event_stream_headers(url: &Url, last_event_id: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_EVENT_STREAM));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPT_ENCODING_IDENTITY));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_NO_STORE));

    if let Some(id) = last_event_id {
        match HeaderValue::from_str(id) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(LAST_EVENT_ID), value);
            }
            Err(_) => warn!(last_event_id = ?id, "last event id is not a valid header value, not sending it"),
        }
    }

    if let Some(value) = basic_authorization(url) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}
