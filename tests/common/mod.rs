//! A scripted HTTP/1.1 endpoint served by hyper.
//!
//! Every request is recorded and answered with the next queued [`Reply`].
//! Keep-alive is off, so each reconnect of an event source shows up as a new
//! connection and a new request.

#![allow(dead_code)]

use std::{collections::HashMap, convert::Infallible, sync::Arc, time::Duration};

use futures::stream;
use http_body_util::{BodyExt, Full, StreamBody, combinators::UnsyncBoxBody};
use hyper::{
    Request, Response,
    body::{Bytes, Frame, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::{
    net::TcpListener,
    sync::{Mutex, mpsc},
    time::timeout,
};
use url::Url;

pub const WAIT: Duration = Duration::from_secs(5);

type ReplyBody = UnsyncBoxBody<Bytes, Infallible>;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

pub enum Body {
    Fixed(String),
    /// Chunks pushed by the test until the sender is dropped
    Live(mpsc::UnboundedReceiver<String>),
}

impl Body {
    fn into_reply_body(self) -> ReplyBody {
        match self {
            Body::Fixed(text) => Full::new(Bytes::from(text)).boxed_unsync(),
            Body::Live(chunks) => StreamBody::new(stream::unfold(chunks, |mut chunks| async move {
                let chunk = chunks.recv().await?;
                Some((Ok::<_, Infallible>(Frame::data(Bytes::from(chunk))), chunks))
            }))
            .boxed_unsync(),
        }
    }
}

pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Fixed(String::new()),
        }
    }

    pub fn fixed(body: &str) -> Self {
        Self::status(200)
            .header("content-type", "text/event-stream")
            .with_body(Body::Fixed(body.to_owned()))
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    fn into_response(self) -> Response<ReplyBody> {
        let mut response = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            response = response.header(name.as_str(), value.as_str());
        }
        response
            .body(self.body.into_reply_body())
            .expect("build response")
    }
}

type Replies = Arc<Mutex<mpsc::UnboundedReceiver<Reply>>>;

async fn respond(
    request: Request<Incoming>,
    requests: mpsc::UnboundedSender<RecordedRequest>,
    replies: Replies,
) -> Response<ReplyBody> {
    let headers = request
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                value.to_str().unwrap_or_default().to_owned(),
            )
        })
        .collect();
    let _ = requests.send(RecordedRequest {
        path: request.uri().path().to_owned(),
        headers,
    });

    let reply = replies.lock().await.recv().await;
    reply.unwrap_or_else(|| Reply::status(503)).into_response()
}

pub struct MockEndpoint {
    pub url: Url,
    requests: mpsc::UnboundedReceiver<RecordedRequest>,
    replies: mpsc::UnboundedSender<Reply>,
}

impl MockEndpoint {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock endpoint");
        let addr = listener.local_addr().expect("local addr");
        let (request_tx, requests) = mpsc::unbounded_channel();
        let (replies, reply_rx) = mpsc::unbounded_channel::<Reply>();
        let reply_rx: Replies = Arc::new(Mutex::new(reply_rx));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let request_tx = request_tx.clone();
                let reply_rx = Arc::clone(&reply_rx);
                tokio::spawn(async move {
                    let service = service_fn(move |request: Request<Incoming>| {
                        let reply = respond(request, request_tx.clone(), Arc::clone(&reply_rx));
                        async move { Ok::<_, Infallible>(reply.await) }
                    });
                    let _ = http1::Builder::new()
                        .keep_alive(false)
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            url: Url::parse(&format!("http://{addr}/events")).expect("endpoint url"),
            requests,
            replies,
        }
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.send(reply).expect("endpoint running");
    }

    /// Queues a `200 text/event-stream` response whose body the test pushes through the returned sender
    pub fn stream(&self) -> mpsc::UnboundedSender<String> {
        self.stream_with(Vec::new())
    }

    pub fn stream_with(&self, headers: Vec<(&str, &str)>) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut reply = Reply::status(200).header("content-type", "text/event-stream");
        for (name, value) in headers {
            reply = reply.header(name, value);
        }
        self.reply(reply.with_body(Body::Live(rx)));
        tx
    }

    pub async fn next_request(&mut self) -> RecordedRequest {
        timeout(WAIT, self.requests.recv())
            .await
            .expect("no request within timeout")
            .expect("endpoint running")
    }

    pub fn no_request_yet(&mut self) -> bool {
        self.requests.try_recv().is_err()
    }
}

/// Polls `condition` until it holds, panicking after [`WAIT`]
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Receives the next value forwarded by a listener
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("nothing received within timeout")
        .expect("sender alive")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
