use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;

use crate::{constants::CR, parser::parse_line_from_buffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStreamState {
    Reading,
    Draining,
    Terminated,
}

pin_project_lite::pin_project! {
    /// [`Stream`] that cuts a stream of byte chunks into complete lines (without their EOL).
    ///
    /// Behaves like a buffered reader's `read_line`: a lone CR at the very end of the input
    /// still terminates its line, and an unterminated last line is yielded once the
    /// underlying stream is exhausted.
    ///
    /// The buffer is unbounded: input without any EOL is held in memory until one arrives.
    #[derive(Debug)]
    pub struct LineStream<S> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        state: LineStreamState,
    }
}

impl<S> LineStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            state: LineStreamState::Reading,
        }
    }
}

impl<S, E, B> Stream for LineStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(line) = parse_line_from_buffer(this.buffer) {
                return Poll::Ready(Some(Ok(line)));
            }

            match *this.state {
                LineStreamState::Reading => {}
                LineStreamState::Draining => {
                    *this.state = LineStreamState::Terminated;
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    // whatever is left has no EOL, or ends in the CR we held back
                    if this.buffer.last() == Some(&CR) {
                        this.buffer.truncate(this.buffer.len() - 1);
                    }
                    return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
                }
                LineStreamState::Terminated => return Poll::Ready(None),
            }

            match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(bytes)) => this.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => *this.state = LineStreamState::Draining,
            }
        }
    }
}
