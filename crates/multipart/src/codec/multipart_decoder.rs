//! Multipart token decoder
//!
//! Splits a `multipart/*` body into [`Token`]s using a state machine:
//!
//! ```text
//! Preamble --first boundary--> Headers --CRLF CRLF--> Body --delimiter--> Headers ...
//!                                 |
//!                                 +--final boundary "--"--> Disposed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use micro_multipart::codec::MultipartDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = MultipartDecoder::new("XYZ", 10 * 1024);
//! let mut buffer = BytesMut::from(&b"--XYZ\r\nContent-Type: text/plain\r\n\r\nhello\r\n--XYZ--"[..]);
//! let headers = decoder.decode(&mut buffer);
//! let body = decoder.decode(&mut buffer);
//! ```

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::BodyDecoder;
use crate::codec::boundary::BoundaryMatcher;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{ParseError, PayloadItem, Token};

const TWO_HYPHENS: &[u8] = b"--";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    /// Discarding bytes until the first boundary
    Preamble,
    /// Reading a header block, or the final boundary marker
    Headers,
    /// Reading a part body until the next delimiter
    Body,
    /// Finished or failed, everything else is discarded
    Disposed,
}

/// A decoder turning raw multipart bytes into [`Token`]s.
///
/// Run it inside a `FramedRead`: the framed reader only reads the next chunk
/// from the underlying source when the token stream is polled, so a slow
/// consumer never causes unbounded buffering.
#[derive(Debug)]
pub struct MultipartDecoder {
    state: State,
    first_boundary: BoundaryMatcher,
    header_decoder: HeaderDecoder,
    body_decoder: BodyDecoder,
}

impl MultipartDecoder {
    /// Creates a decoder for `boundary` (the value of the `boundary` parameter,
    /// without leading dashes), limiting each part's header block to
    /// `max_headers_size` bytes.
    pub fn new<B: AsRef<[u8]>>(boundary: B, max_headers_size: usize) -> Self {
        let boundary = boundary.as_ref();
        let mut first_boundary = Vec::with_capacity(boundary.len() + TWO_HYPHENS.len());
        first_boundary.extend_from_slice(TWO_HYPHENS);
        first_boundary.extend_from_slice(boundary);

        Self {
            state: State::Preamble,
            first_boundary: BoundaryMatcher::new(&first_boundary),
            header_decoder: HeaderDecoder::new(max_headers_size),
            body_decoder: BodyDecoder::new(boundary),
        }
    }

    /// Returns true once the final boundary was read or an error occurred
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state == State::Disposed
    }

    fn dispose(&mut self, src: &mut BytesMut) {
        self.state = State::Disposed;
        src.clear();
    }

    fn decode_headers(&mut self, src: &mut BytesMut) -> Result<Option<Token>, ParseError> {
        if self.header_decoder.is_fresh() {
            match &src[..] {
                [] | [b'-'] => return Ok(None),
                [b'-', b'-', ..] => {
                    trace!("read final boundary");
                    self.dispose(src);
                    return Ok(None);
                }
                _ => {}
            }
        }

        match self.header_decoder.decode(src)? {
            Some(headers) => {
                trace!(header_count = headers.len(), "read part headers");
                self.state = State::Body;
                Ok(Some(Token::Headers(headers)))
            }
            None => Ok(None),
        }
    }
}

impl Decoder for MultipartDecoder {
    type Item = Token;
    type Error = ParseError;

    /// Attempts to decode the next token from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Token::Headers(_)))`: a new part started
    /// - `Ok(Some(Token::Body(_)))`: a chunk of the current part's body
    /// - `Ok(None)`: need more data, or the final boundary was read
    /// - `Err(_)`: the input is malformed or a limit was exceeded
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Preamble => match self.first_boundary.find(src) {
                    Some(idx) => {
                        trace!(preamble_size = idx + 1 - self.first_boundary.needle().len(), "found first boundary");
                        src.advance(idx + 1);
                        self.state = State::Headers;
                    }
                    None => {
                        // the matcher remembers a partial boundary, the bytes themselves are not needed
                        src.clear();
                        return Ok(None);
                    }
                },

                State::Headers => {
                    return self.decode_headers(src).inspect_err(|_| self.dispose(src));
                }

                State::Body => match self.body_decoder.decode(src) {
                    Ok(Some(PayloadItem::Chunk(bytes))) => return Ok(Some(Token::Body(bytes))),
                    Ok(Some(PayloadItem::Eof)) => self.state = State::Headers,
                    Ok(None) => return Ok(None),
                    Err(e) => {
                        self.dispose(src);
                        return Err(e);
                    }
                },

                State::Disposed => {
                    src.clear();
                    return Ok(None);
                }
            }
        }
    }

    /// Decodes what is left once the source is exhausted.
    ///
    /// Ending anywhere but after the final boundary is an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(token) = self.decode(src)? {
            return Ok(Some(token));
        }

        let error = match self.state {
            State::Disposed => return Ok(None),
            State::Preamble => ParseError::NoFirstBoundary,
            State::Headers => ParseError::NoEndOfHeaders,
            State::Body => ParseError::NoEndOfBody,
        };
        self.dispose(src);
        Err(error)
    }
}
