//! Response body types for the socket transport.
//!
//! [`EdgeResponseBody`] carries the three shapes a finished pipeline
//! response can take: a buffered payload, a sequence of wire-ready streamed
//! frames (already compressed by the core), or nothing.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use edgestack_core::ResponseBody;
use http_body_util::Full;

/// HTTP response body for the socket transport.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper
/// responses.
#[derive(Debug, Default)]
pub enum EdgeResponseBody {
    /// Buffered body for complete in-memory payloads.
    Buffered(Full<Bytes>),
    /// Wire-ready frames from a streamed pipeline response, sent as chunks.
    Streamed(VecDeque<Bytes>),
    /// Empty body for redirects, 204s, and HEAD responses.
    #[default]
    Empty,
}

impl EdgeResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl From<ResponseBody> for EdgeResponseBody {
    fn from(body: ResponseBody) -> Self {
        match body {
            ResponseBody::Empty => Self::Empty,
            ResponseBody::Buffered(bytes) => Self::from_bytes(bytes),
            ResponseBody::Streamed(frames) => Self::Streamed(frames.into()),
        }
    }
}

impl http_body::Body for EdgeResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streamed(frames) => Poll::Ready(
                frames
                    .pop_front()
                    .map(|frame| Ok(http_body::Frame::data(frame))),
            ),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streamed(frames) => frames.is_empty(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streamed(frames) => {
                let total = frames.iter().map(Bytes::len).sum::<usize>() as u64;
                http_body::SizeHint::with_exact(total)
            }
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body::Body;

    use super::*;

    #[test]
    fn test_should_report_empty_body_as_end_of_stream() {
        let body = EdgeResponseBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[test]
    fn test_should_create_buffered_body_from_bytes() {
        let body = EdgeResponseBody::from_bytes(Bytes::from("hello"));
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(5));
    }

    #[test]
    fn test_should_convert_streamed_core_body_into_frames() {
        let body: EdgeResponseBody = ResponseBody::Streamed(vec![
            Bytes::from_static(b"one"),
            Bytes::from_static(b"two"),
        ])
        .into();
        assert!(!body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(6));
    }

    #[tokio::test]
    async fn test_should_yield_streamed_frames_in_order() {
        use http_body_util::BodyExt;

        let body: EdgeResponseBody = ResponseBody::Streamed(vec![
            Bytes::from_static(b"one"),
            Bytes::from_static(b"two"),
        ])
        .into();
        let collected = body.collect().await.expect("collects");
        assert_eq!(collected.to_bytes().as_ref(), b"onetwo");
    }
}
