//! The connection primitive: opens a URI and hands back status, headers and a body stream.
//!
//! `http` and `https` go through [`reqwest`], which follows redirects on its own; the
//! final URL is reported back. `file` URIs are read from disk. Every other scheme is an
//! addressing error.

use core::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, RETRY_AFTER},
};
use tokio::io::AsyncReadExt;
use tracing::debug;
use url::Url;

use crate::{
    constants::READ_CHUNK,
    errors::{EventSourceError, Result},
};

/// An opened resource
pub(crate) struct Connection {
    /// Where the data actually comes from, after redirects
    pub(crate) url: Url,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: BoxStream<'static, Result<Bytes>>,
}

impl Connection {
    /// `Retry-After` as delay-seconds; HTTP dates and garbage are ignored
    pub(crate) fn retry_after(&self) -> Option<Duration> {
        let value = self.headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
        value.parse().ok().map(Duration::from_secs)
    }

    /// `204 No Content` asks the client to stop reconnecting
    pub(crate) fn is_no_content(&self) -> bool {
        self.status == StatusCode::NO_CONTENT
    }
}

pub(crate) async fn open(
    client: &Client,
    url: &Url,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<Connection> {
    match url.scheme() {
        "http" | "https" => open_http(client, url, headers, timeout).await,
        "file" => open_file(url).await,
        scheme => Err(EventSourceError::UnsupportedScheme(scheme.to_owned())),
    }
}

async fn open_http(
    client: &Client,
    url: &Url,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<Connection> {
    let request = client.get(url.clone()).headers(headers);
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| EventSourceError::Timeout(timeout))??;

    let status = response.status();
    debug!(url = %response.url(), %status, "response received");
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            return Err(EventSourceError::NotFound(response.url().to_string()));
        }
        status if !status.is_success() => return Err(EventSourceError::Status(status)),
        _ => {}
    }

    Ok(Connection {
        url: response.url().clone(),
        status,
        headers: response.headers().clone(),
        body: response.bytes_stream().map_err(EventSourceError::Http).boxed(),
    })
}

async fn open_file(url: &Url) -> Result<Connection> {
    let path = url
        .to_file_path()
        .map_err(|()| EventSourceError::NotFound(url.to_string()))?;
    let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EventSourceError::NotFound(url.to_string()),
        _ => EventSourceError::Io(e),
    })?;

    let body = futures_util::stream::try_unfold(file, |mut file| async move {
        let mut chunk = BytesMut::with_capacity(READ_CHUNK);
        let read = file.read_buf(&mut chunk).await?;
        Ok::<_, EventSourceError>((read > 0).then(|| (chunk.freeze(), file)))
    })
    .boxed();

    Ok(Connection {
        url: url.clone(),
        status: StatusCode::OK,
        headers: HeaderMap::new(),
        body,
    })
}
