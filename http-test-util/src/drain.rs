use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

pin_project! {
    /// Reads a body to the end, dropping every frame and counting the payload bytes.
    pub struct DiscardBodyFuture<B: Body> {
        #[pin]
        body: B,
        read: usize,
    }
}

impl<B> DiscardBodyFuture<B>
where
    B: Body,
{
    #[inline]
    #[must_use]
    pub fn new(body: B) -> Self {
        Self { body, read: 0 }
    }
}

impl<B> Future for DiscardBodyFuture<B>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    type Output = Result<usize, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(*slf.read));
            }
            let next_frame = match ready!(slf.body.as_mut().poll_frame(cx)) {
                None => return Poll::Ready(Ok(*slf.read)),
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    return Poll::Ready(Err(
                        anyhow::Error::new(e).context("Failed to poll next frame")
                    ));
                }
            };
            // Trailer frames carry no payload
            if let Ok(data) = next_frame.into_data() {
                *slf.read += data.remaining();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DiscardBodyFuture;
    use crate::{byte_body, empty_body};

    #[tokio::test]
    async fn counts_full_body() {
        let read = DiscardBodyFuture::new(byte_body(&b"landing page"[..]))
            .await
            .unwrap();
        assert_eq!(12, read);
    }

    #[tokio::test]
    async fn empty_body_reads_nothing() {
        let read = DiscardBodyFuture::new(empty_body()).await.unwrap();
        assert_eq!(0, read);
    }
}
