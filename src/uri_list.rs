//! Reader for `text/uri-list` resources.
//!
//! Independent of [`EventSource`][crate::EventSource]: it only shares the transport.
//! Entries are trimmed, blank lines and `#` comments are skipped, and relative
//! entries are resolved against the URL the list was finally served from.

use futures_core::Stream;
use futures_util::{TryStreamExt, future, stream};
use reqwest::{
    Client,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use url::Url;

use crate::{
    auth::basic_authorization,
    constants::{ACCEPT_URI_LIST, DEFAULT_READ_TIMEOUT},
    errors::{EventSourceError, Result},
    line_stream::LineStream,
    transport,
};

/// A list of URIs behind a single URI
#[derive(Debug, Clone)]
pub struct UriList {
    url: Url,
    client: Client,
}

fn resolve(base: &Url, line: &[u8]) -> Result<Option<Url>> {
    let line = String::from_utf8_lossy(line);
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(base.join(entry)?))
}

impl UriList {
    /// # Errors
    ///
    /// Fails if the default HTTP client cannot be built
    pub fn new(url: Url) -> Result<Self> {
        Ok(Self::with_client(url, Client::builder().build()?))
    }

    pub fn with_client(url: Url, client: Client) -> Self {
        Self { url, client }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Lazily fetches the list; nothing is requested until the stream is polled
    pub fn stream(&self) -> impl Stream<Item = Result<Url>> + Send + 'static {
        let client = self.client.clone();
        let url = self.url.clone();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_URI_LIST));
        if let Some(value) = basic_authorization(&url) {
            headers.insert(AUTHORIZATION, value);
        }

        stream::once(async move {
            let connection = transport::open(&client, &url, headers, DEFAULT_READ_TIMEOUT).await?;
            let base = connection.url;
            Ok::<_, EventSourceError>(
                LineStream::new(connection.body)
                    .try_filter_map(move |line| future::ready(resolve(&base, &line))),
            )
        })
        .try_flatten()
    }

    /// Fetches the whole list at once
    pub async fn fetch(url: Url) -> Result<Vec<Url>> {
        Self::new(url)?.stream().try_collect().await
    }
}
