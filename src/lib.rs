//! # axum-byterange
//!
//! RFC 7233 byte-range resolution and partial content responses for
//! [`axum`][1].
//!
//! The crate is split in two layers. [`resolve`] and [`RangeSpec::normalize`]
//! are pure functions turning a `Range` request header into a concrete
//! [`ByteRange`] (or a decision not to apply range semantics at all), and
//! [`Ranged`] is the responder that feeds that decision with a body and maps
//! it onto `200 OK`, `206 Partial Content`, or `416 Range Not Satisfiable`.
//!
//! Only single byte ranges are served. A multi-range request (`bytes=0-1,5-6`
//! or several `Range` lines) is deliberately not honored, whether or not it
//! parses: pathological range sets are a cheap way for a client to force
//! excessive I/O. Such requests, like malformed ones, degrade to a full `200`
//! response rather than an error.
//!
//! Bodies are fully generic: any type implementing [`AsyncRead`] and
//! [`AsyncSeekStart`] works through the [`KnownSize`] adapter struct, with
//! special cased support for [`tokio::fs::File`] in [`KnownSize::file`].
//!
//! ```
//! use axum::Router;
//! use axum::routing::get;
//!
//! use axum_byterange::{KnownSize, RangeHeader, Ranged};
//!
//! async fn file(range: RangeHeader) -> Ranged<KnownSize<tokio::fs::File>> {
//!     let file = tokio::fs::File::open("test/fixture.txt").await.unwrap();
//!     let body = KnownSize::file(file).await.unwrap();
//!     Ranged::new(range, body)
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::<()>::new().route("/", get(file));
//!     # let _ = app;
//! }
//! ```
//!
//! [1]: https://docs.rs/axum

mod file;
mod header;
mod range;
mod stream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{header as http_header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange};
use axum_extra::TypedHeader;
use tokio::io::{AsyncRead, AsyncSeek};

pub use file::KnownSize;
pub use header::RangeHeader;
pub use range::{resolve, ByteRange, RangeOutcome, RangeResolution, RangeSpec};
pub use stream::RangedStream;

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying resource.
    ///
    /// This should not change for the lifetime of the object once queried.
    /// Behaviour is not guaranteed if it does change.
    fn byte_size(&self) -> u64;
}

/// The main responder type. Implements [`IntoResponse`].
#[derive(Debug)]
pub struct Ranged<B: RangeBody + Send + 'static> {
    range: RangeHeader,
    body: B,
    content_type: Option<HeaderValue>,
}

impl<B: RangeBody + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing [`RangeBody`]
    /// and the request's [`RangeHeader`].
    pub fn new(range: RangeHeader, body: B) -> Self {
        Ranged { range, body, content_type: None }
    }

    /// Set the `Content-Type` to send with the response.
    pub fn content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Respond to the request, returning headers and body as
    /// [`RangedResponse`]. Returns [`RangeNotSatisfiable`] if the requested
    /// range cannot be mapped into the body.
    pub fn try_respond(self) -> Result<RangedResponse<B>, RangeNotSatisfiable> {
        let total_bytes = self.body.byte_size();
        let outcome = self.range.resolve(total_bytes);
        tracing::trace!(total_bytes, ?outcome, "resolved Range header");

        let range = match outcome {
            // absent, unsupported, and degenerate ranges all fall back to
            // serving the whole body
            RangeOutcome::NoRange | RangeOutcome::Unsupported => None,
            RangeOutcome::Specified(RangeResolution::Empty) => None,
            RangeOutcome::Specified(RangeResolution::Satisfiable(range)) => Some(range),
            RangeOutcome::Specified(RangeResolution::Unsatisfiable) => {
                let content_range = ContentRange::unsatisfied_bytes(total_bytes);
                return Err(RangeNotSatisfiable(content_range));
            }
        };

        Ok(match range {
            None => RangedResponse::Full {
                content_length: ContentLength(total_bytes),
                content_type: self.content_type,
                stream: RangedStream::new(self.body, 0, total_bytes),
            },
            Some(range) => {
                let content_range =
                    ContentRange::bytes(range.start..range.end_exclusive(), total_bytes)
                        .expect("ContentRange::bytes cannot panic in this usage");

                RangedResponse::Partial {
                    content_range,
                    content_length: ContentLength(range.len()),
                    content_type: self.content_type,
                    stream: RangedStream::new(self.body, range.start, range.len()),
                }
            }
        })
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.try_respond().into_response()
    }
}

/// Error type indicating that the requested range was not satisfiable.
/// Implements [`IntoResponse`], producing a `416` with
/// `Content-Range: bytes */{length}`.
#[derive(Debug, Clone)]
pub struct RangeNotSatisfiable(pub ContentRange);

impl IntoResponse for RangeNotSatisfiable {
    fn into_response(self) -> Response {
        let status = StatusCode::RANGE_NOT_SATISFIABLE;
        let header = TypedHeader(self.0);
        (status, header, ()).into_response()
    }
}

/// Data type containing computed headers and body for a range response.
/// Implements [`IntoResponse`].
#[derive(Debug)]
pub enum RangedResponse<B> {
    /// Whole-body response: no range requested, or range semantics ignored.
    Full {
        content_length: ContentLength,
        content_type: Option<HeaderValue>,
        stream: RangedStream<B>,
    },
    /// Single-range response with its `Content-Range`.
    Partial {
        content_range: ContentRange,
        content_length: ContentLength,
        content_type: Option<HeaderValue>,
        stream: RangedStream<B>,
    },
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        let accept_ranges = TypedHeader(AcceptRanges::bytes());

        match self {
            RangedResponse::Full { content_length, content_type, stream } => (
                StatusCode::OK,
                accept_ranges,
                TypedHeader(content_length),
                content_type.map(|value| [(http_header::CONTENT_TYPE, value)]),
                stream,
            )
                .into_response(),
            RangedResponse::Partial { content_range, content_length, content_type, stream } => (
                StatusCode::PARTIAL_CONTENT,
                accept_ranges,
                TypedHeader(content_range),
                TypedHeader(content_length),
                content_type.map(|value| [(http_header::CONTENT_TYPE, value)]),
                stream,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::Cursor;

    use assert_matches::assert_matches;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum_extra::headers::{ContentLength, ContentRange};
    use bytes::Bytes;
    use futures::{pin_mut, Stream, StreamExt};
    use tokio::fs::File;

    use crate::{KnownSize, RangeHeader, Ranged, RangedResponse};

    async fn collect_stream(stream: impl Stream<Item = io::Result<Bytes>>) -> String {
        let mut string = String::new();
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await.transpose().unwrap() {
            string += std::str::from_utf8(&chunk).unwrap();
        }
        string
    }

    fn range(header: &str) -> RangeHeader {
        RangeHeader::single(header)
    }

    async fn body() -> KnownSize<File> {
        let file = File::open("test/fixture.txt").await.unwrap();
        KnownSize::file(file).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_response() {
        let ranged = Ranged::new(RangeHeader::none(), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok").into_response();
        assert_eq!(StatusCode::OK, response.status());

        let head = response.headers();
        assert_eq!(Some(HeaderValue::from_static("bytes")).as_ref(), head.get("Accept-Ranges"));
        assert_eq!(Some(HeaderValue::from_static("54")).as_ref(), head.get("Content-Length"));
        assert!(head.get("Content-Range").is_none());

        let body = collect_stream(
            response.into_body().into_data_stream().map(|chunk| chunk.map_err(io::Error::other)),
        )
        .await;
        assert_eq!("Hello world this is a file to test range requests on!\n", body);
    }

    #[tokio::test]
    async fn test_partial_response_start() {
        let ranged = Ranged::new(range("bytes=0-29"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Partial { content_range, content_length, stream, .. } => {
                assert_eq!(ContentLength(30), content_length);
                assert_eq!(ContentRange::bytes(0..30, 54).unwrap(), content_range);
                assert_eq!("Hello world this is a file to ", &collect_stream(stream).await);
            }
            _ => panic!("Expected a partial response"),
        }
    }

    #[tokio::test]
    async fn test_partial_response_end() {
        let ranged = Ranged::new(range("bytes=30-53"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Partial { content_range, content_length, stream, .. } => {
                assert_eq!(ContentLength(24), content_length);
                assert_eq!(ContentRange::bytes(30..54, 54).unwrap(), content_range);
                assert_eq!("test range requests on!\n", &collect_stream(stream).await);
            }
            _ => panic!("Expected a partial response"),
        }
    }

    #[tokio::test]
    async fn test_suffix_response() {
        let ranged = Ranged::new(range("bytes=-20"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Partial { content_range, content_length, stream, .. } => {
                assert_eq!(ContentLength(20), content_length);
                assert_eq!(ContentRange::bytes(34..54, 54).unwrap(), content_range);
                assert_eq!(" range requests on!\n", &collect_stream(stream).await);
            }
            _ => panic!("Expected a partial response"),
        }
    }

    #[tokio::test]
    async fn test_open_ended_response() {
        let ranged = Ranged::new(range("bytes=40-"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Partial { content_range, content_length, stream, .. } => {
                assert_eq!(ContentLength(14), content_length);
                assert_eq!(ContentRange::bytes(40..54, 54).unwrap(), content_range);
                assert_eq!(" requests on!\n", &collect_stream(stream).await);
            }
            _ => panic!("Expected a partial response"),
        }
    }

    #[tokio::test]
    async fn test_one_byte_response() {
        let ranged = Ranged::new(range("bytes=30-30"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Partial { content_range, content_length, stream, .. } => {
                assert_eq!(ContentLength(1), content_length);
                assert_eq!(ContentRange::bytes(30..31, 54).unwrap(), content_range);
                assert_eq!("t", &collect_stream(stream).await);
            }
            _ => panic!("Expected a partial response"),
        }
    }

    #[tokio::test]
    async fn test_range_end_exceeding_length_is_clamped() {
        let ranged = Ranged::new(range("bytes=30-99"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Partial { content_range, stream, .. } => {
                assert_eq!(ContentRange::bytes(30..54, 54).unwrap(), content_range);
                assert_eq!("test range requests on!\n", &collect_stream(stream).await);
            }
            _ => panic!("Expected a partial response"),
        }
    }

    #[tokio::test]
    async fn test_range_start_exceeding_length_is_unsatisfiable() {
        let ranged = Ranged::new(range("bytes=99-"), body().await);

        let err = ranged.try_respond().err().expect("try_respond should return Err");

        let expected_content_range = ContentRange::unsatisfied_bytes(54);
        assert_eq!(expected_content_range, err.0);

        let response = err.into_response();
        assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status());
        assert_eq!(
            Some(HeaderValue::from_static("bytes */54")).as_ref(),
            response.headers().get("Content-Range"),
        );
    }

    #[tokio::test]
    async fn test_multi_range_request_served_full() {
        let ranged = Ranged::new(range("bytes=0-1,5-6"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Full { content_length, stream, .. } => {
                assert_eq!(ContentLength(54), content_length);
                assert_eq!(
                    "Hello world this is a file to test range requests on!\n",
                    &collect_stream(stream).await
                );
            }
            _ => panic!("Expected a full response"),
        }
    }

    #[tokio::test]
    async fn test_multiple_range_lines_served_full() {
        let mut headers = axum::http::HeaderMap::new();
        headers.append("range", HeaderValue::from_static("bytes=0-1"));
        headers.append("range", HeaderValue::from_static("bytes=5-6"));
        let ranged = Ranged::new(RangeHeader::from_headers(&headers), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");
        assert_matches!(response, RangedResponse::Full { .. });
    }

    #[tokio::test]
    async fn test_malformed_range_served_full() {
        let ranged = Ranged::new(range("bytes=abc"), body().await);

        let response = ranged.try_respond().expect("try_respond should return Ok");
        assert_matches!(response, RangedResponse::Full { .. });
    }

    #[tokio::test]
    async fn test_zero_length_body_served_full() {
        let body = KnownSize::sized(Cursor::new(Vec::<u8>::new()), 0);
        let ranged = Ranged::new(range("bytes=0-9"), body);

        let response = ranged.try_respond().expect("try_respond should return Ok");

        match response {
            RangedResponse::Full { content_length, stream, .. } => {
                assert_eq!(ContentLength(0), content_length);
                assert_eq!("", &collect_stream(stream).await);
            }
            _ => panic!("Expected a full response"),
        }
    }

    #[tokio::test]
    async fn test_content_type_is_forwarded() {
        let ranged = Ranged::new(range("bytes=0-4"), body().await)
            .content_type(HeaderValue::from_static("text/plain"));

        let response = ranged.try_respond().expect("try_respond should return Ok").into_response();
        assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
        assert_eq!(
            Some(HeaderValue::from_static("text/plain")).as_ref(),
            response.headers().get("Content-Type"),
        );
    }
}
