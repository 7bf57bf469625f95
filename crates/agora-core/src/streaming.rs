use crate::error::UpstreamError;
use futures::Stream;
use pin_project::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

/// Incremental piece of agent text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
}

impl TextChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl fmt::Display for TextChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Lazy, finite and single-use sequence of chunks. Ends after the first error.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<TextChunk, UpstreamError>> + Send>>;

/// Fails a stream with [`UpstreamError::IdleTimeout`] when no item arrives within `idle`.
#[pin_project]
pub struct IdleTimeout<S> {
    #[pin]
    inner: S,
    #[pin]
    deadline: Sleep,
    idle: Duration,
    done: bool,
}

impl<S> IdleTimeout<S> {
    pub fn new(inner: S, idle: Duration) -> Self {
        Self {
            inner,
            deadline: sleep(idle),
            idle,
            done: false,
        }
    }
}

impl<S, T> Stream for IdleTimeout<S>
where
    S: Stream<Item = Result<T, UpstreamError>>,
{
    type Item = Result<T, UpstreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(item)) => {
                if item.is_err() {
                    *this.done = true;
                } else {
                    this.deadline.as_mut().reset(Instant::now() + *this.idle);
                }
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => match this.deadline.poll(cx) {
                Poll::Ready(()) => {
                    *this.done = true;
                    tracing::warn!(idle = ?this.idle, "upstream stream went idle");
                    Poll::Ready(Some(Err(UpstreamError::IdleTimeout(*this.idle))))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

#[must_use]
pub fn with_idle_timeout(stream: ChunkStream, idle: Duration) -> ChunkStream {
    Box::pin(IdleTimeout::new(stream, idle))
}
