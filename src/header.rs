//! Capture of raw `Range` header lines and their grammar parse.
//!
//! The resolver wants the header value(s) exactly as they appeared on the
//! wire, because the multi-range policy check runs on raw text before any
//! parser output is trusted. This type therefore holds unparsed lines.
//! Tokenization itself is delegated to the `http-range-header` crate; this
//! module only adapts its output into [`RangeSpec`] values.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use http_range_header::{EndPosition, StartPosition};

use crate::range::{self, RangeOutcome, RangeSpec};

/// The raw `Range` header line(s) of a request, as received on the wire.
///
/// Usable directly as an axum extractor:
///
/// ```
/// use axum_byterange::RangeHeader;
///
/// async fn handler(range: RangeHeader) {
///     // ...
/// }
/// ```
///
/// A request without a `Range` header extracts to an empty value, which
/// resolves to a full-body response.
#[derive(Debug, Clone, Default)]
pub struct RangeHeader {
    lines: Vec<String>,
}

impl RangeHeader {
    /// An absent `Range` header.
    pub fn none() -> Self {
        RangeHeader { lines: Vec::new() }
    }

    /// A single `Range` header line, e.g. `"bytes=0-499"`.
    pub fn single(value: impl Into<String>) -> Self {
        RangeHeader { lines: vec![value.into()] }
    }

    /// Collect every `Range` line out of a header map.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let lines = headers
            .get_all(header::RANGE)
            .iter()
            // a non-UTF-8 value stays a non-empty line that fails grammar
            // parsing, so it degrades to Unsupported rather than NoRange
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        RangeHeader { lines }
    }

    /// Resolve this header against a resource of `length` bytes.
    pub fn resolve(&self, length: u64) -> RangeOutcome {
        let lines: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        let specs = match lines.as_slice() {
            [line] => parse_specs(line),
            _ => None,
        };
        range::resolve(&lines, specs.as_deref(), length)
    }
}

impl<S> FromRequestParts<S> for RangeHeader
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RangeHeader::from_headers(&parts.headers))
    }
}

/// Grammar-parse one header line into range specs. `None` means the line is
/// not a well-formed `bytes=` ranges specifier.
fn parse_specs(line: &str) -> Option<Vec<RangeSpec>> {
    let parsed = match http_range_header::parse_range_header(line) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(%line, %err, "unparseable Range header");
            return None;
        }
    };

    let mut specs = Vec::with_capacity(parsed.ranges.len());
    for candidate in parsed.ranges {
        let spec = match (candidate.start, candidate.end) {
            (StartPosition::Index(first), EndPosition::Index(last)) => {
                RangeSpec::Bounded { first, last }
            }
            (StartPosition::Index(first), EndPosition::LastByte) => RangeSpec::Open { first },
            (StartPosition::FromLast(len), EndPosition::LastByte) => RangeSpec::Suffix { len },
            (StartPosition::FromLast(_), EndPosition::Index(_)) => return None,
        };
        specs.push(spec);
    }
    Some(specs)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{parse_specs, RangeHeader};
    use crate::range::{RangeOutcome, RangeResolution, RangeSpec};

    #[test]
    fn parses_bounded_open_and_suffix_specs() {
        assert_eq!(
            Some(vec![RangeSpec::Bounded { first: 0, last: 499 }]),
            parse_specs("bytes=0-499")
        );
        assert_eq!(
            Some(vec![RangeSpec::Open { first: 500 }]),
            parse_specs("bytes=500-")
        );
        assert_eq!(
            Some(vec![RangeSpec::Suffix { len: 500 }]),
            parse_specs("bytes=-500")
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(None, parse_specs("bytes=abc"));
        assert_eq!(None, parse_specs("elephants=0-1"));
        assert_eq!(None, parse_specs("bytes="));
    }

    #[test]
    fn collects_every_range_line() {
        let mut headers = HeaderMap::new();
        headers.append("range", HeaderValue::from_static("bytes=0-1"));
        headers.append("range", HeaderValue::from_static("bytes=5-6"));

        let range = RangeHeader::from_headers(&headers);
        assert_eq!(RangeOutcome::Unsupported, range.resolve(54));
    }

    #[test]
    fn resolves_end_to_end() {
        assert_eq!(RangeOutcome::NoRange, RangeHeader::none().resolve(54));
        assert_eq!(
            RangeOutcome::Unsupported,
            RangeHeader::single("bytes=0-1,5-6").resolve(54)
        );
        assert_eq!(
            RangeOutcome::Specified(RangeResolution::Unsatisfiable),
            RangeHeader::single("bytes=100-").resolve(54)
        );
        assert_matches::assert_matches!(
            RangeHeader::single("bytes=0-9").resolve(54),
            RangeOutcome::Specified(RangeResolution::Satisfiable(r))
                if r.start == 0 && r.end == 9
        );
    }
}
