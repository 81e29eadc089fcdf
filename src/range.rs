//! Resolution of `Range` request headers against a known resource length.
//!
//! Everything in this module is a pure function of its arguments, with no
//! I/O and no shared state. Header tokenization is not done here
//! either. Callers hand in the raw header line(s) plus the candidate specs an
//! external grammar parser produced from them, and get back a [`RangeOutcome`]
//! that maps directly onto the 200/206/416 decision.

/// One byte-range spec from a `Range` header, before resolution against a
/// resource length.
///
/// Grammar parsing guarantees at least one bound is present, which the three
/// variants encode directly. For [`Bounded`](RangeSpec::Bounded), the parser
/// also guarantees `first <= last` (RFC 7233 calls the reversed form invalid);
/// reversed input surfaces as a parse failure, never as a spec value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `first-last`: explicit start and final byte offsets, both inclusive.
    Bounded { first: u64, last: u64 },
    /// `first-`: from a start offset through the end of the resource.
    Open { first: u64 },
    /// `-len`: the final `len` bytes of the resource. `len` is a count of
    /// trailing bytes, not an offset.
    Suffix { len: u64 },
}

/// A fully resolved byte range: inclusive `start` and `end` offsets with
/// `start <= end < length` for the length it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Number of bytes covered. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// The first offset past the range, for APIs taking exclusive ends.
    pub fn end_exclusive(&self) -> u64 {
        self.end + 1
    }
}

/// What a request's `Range` header (or its absence) means for the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No `Range` header on the request. Serve the full body with 200.
    NoRange,
    /// A `Range` header is present but carries multiple ranges, spans
    /// multiple header lines, or failed grammar parsing. Range semantics are
    /// ignored and the full body served with 200, so a client with a bad or
    /// unsupported header still gets usable output.
    Unsupported,
    /// A single well-formed range was specified; see [`RangeResolution`].
    Specified(RangeResolution),
}

/// Resolution of a single well-formed range spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    /// Nothing to range over: the resource is zero-length or the parsed
    /// range set was empty. Serve the full body with 200.
    Empty,
    /// The range cannot be mapped onto any offset within the resource.
    /// Respond 416 with `Content-Range: bytes */{length}`.
    Unsatisfiable,
    /// The normalized range. Respond 206 with exactly these bytes.
    Satisfiable(ByteRange),
}

/// Decide whether and how a `Range` header applies to a resource of
/// `length` bytes.
///
/// `raw_lines` holds the header value(s) exactly as received on the wire;
/// `specs` is the output of grammar parsing those values, or `None` if
/// parsing failed. The raw values are consulted first: more than one header
/// line, or a comma in the single line, rejects the request as
/// [`Unsupported`](RangeOutcome::Unsupported) *before* any grammar output is
/// trusted. A multi-range header can be perfectly valid and still must not be
/// honored: a client could otherwise request pathological range sets (one
/// byte per range) and force excessive I/O per request.
pub fn resolve(raw_lines: &[&str], specs: Option<&[RangeSpec]>, length: u64) -> RangeOutcome {
    if raw_lines.is_empty() || (raw_lines.len() == 1 && raw_lines[0].is_empty()) {
        return RangeOutcome::NoRange;
    }

    if raw_lines.len() > 1 || raw_lines[0].contains(',') {
        return RangeOutcome::Unsupported;
    }

    let Some(specs) = specs else {
        return RangeOutcome::Unsupported;
    };

    // The comma check above already rejected every way a conforming parser
    // can produce more than one spec from a single line.
    debug_assert!(specs.len() <= 1, "multiple specs survived the multi-range guard");

    let Some(&spec) = specs.first() else {
        return RangeOutcome::Specified(RangeResolution::Empty);
    };

    if length == 0 {
        return RangeOutcome::Specified(RangeResolution::Empty);
    }

    match spec.normalize(length) {
        Some(range) => RangeOutcome::Specified(RangeResolution::Satisfiable(range)),
        None => RangeOutcome::Specified(RangeResolution::Unsatisfiable),
    }
}

impl RangeSpec {
    /// Normalize this spec against a resource of `length` bytes (`length`
    /// must be non-zero), per RFC 7233:
    ///
    /// - a start at or past the end of the resource is unsatisfiable;
    /// - an absent or over-length end is replaced by the last byte;
    /// - a suffix longer than the resource means the whole resource, and a
    ///   zero-length suffix requests nothing and is unsatisfiable.
    ///
    /// Every `Some` result satisfies `start <= end < length`.
    pub fn normalize(self, length: u64) -> Option<ByteRange> {
        debug_assert!(length > 0, "normalize called on a zero-length resource");

        match self {
            RangeSpec::Bounded { first, last } => {
                if first >= length {
                    return None;
                }
                Some(ByteRange::new(first, last.min(length - 1)))
            }
            RangeSpec::Open { first } => {
                if first >= length {
                    return None;
                }
                Some(ByteRange::new(first, length - 1))
            }
            RangeSpec::Suffix { len } => {
                if len == 0 {
                    return None;
                }
                let bytes = len.min(length);
                Some(ByteRange::new(length - bytes, length - 1))
            }
        }
    }
}
