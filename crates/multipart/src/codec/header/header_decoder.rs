//! Part header block decoder
//!
//! Decodes the header block that follows a boundary line into an
//! [`http::HeaderMap`]. The block starts right after the boundary (the rest of
//! the boundary line, normally just `CRLF`) and ends with an empty line.
//!
//! # Limits
//!
//! - Maximum number of headers per part: 64
//! - Maximum block size: configurable, counted from the end of the boundary
//!   through the terminating `CRLF CRLF`
//!
//! Header lines are parsed with `httparse`. Folded continuation lines are not
//! supported and are reported as invalid headers.

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;
use memchr::memmem;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::boundary::BoundaryMatcher;
use crate::ensure;
use crate::protocol::ParseError;

/// Maximum number of headers allowed in one part
const MAX_HEADER_NUM: usize = 64;

const CRLF: &[u8] = b"\r\n";
const END_OF_HEADERS: &[u8] = b"\r\n\r\n";

/// Decoder for one part's header block.
///
/// The decoder remembers how much of `src` it already searched, so bytes are
/// only scanned once no matter how the block is split across reads.
#[derive(Debug, Clone)]
pub struct HeaderDecoder {
    max_size: usize,
    end_of_headers: BoundaryMatcher,
    scanned: usize,
}

impl HeaderDecoder {
    pub fn new(max_size: usize) -> Self {
        Self { max_size, end_of_headers: BoundaryMatcher::new(END_OF_HEADERS), scanned: 0 }
    }

    /// Returns true if no byte of the current block has been looked at yet
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.scanned == 0
    }
}

impl Decoder for HeaderDecoder {
    type Item = HeaderMap;
    type Error = ParseError;

    /// Attempts to decode a complete header block.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(headers))` once the terminating empty line was found; the block is removed from `src`
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError::TooLargeHeader)` if the block exceeds the size limit
    /// - `Err(ParseError::InvalidHeader)` if a header line is malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let unscanned = &src[self.scanned..];
        if unscanned.is_empty() {
            return Ok(None);
        }

        match self.end_of_headers.find(unscanned) {
            Some(idx) => {
                let block_size = self.scanned + idx + 1;
                self.scanned = 0;
                ensure!(block_size <= self.max_size, ParseError::too_large_header(block_size, self.max_size));

                let block = src.split_to(block_size);
                trace!(block_size, "parsed part header block");
                parse_block(&block).map(Some)
            }
            None => {
                self.scanned = src.len();
                ensure!(src.len() <= self.max_size, ParseError::too_large_header(src.len(), self.max_size));
                Ok(None)
            }
        }
    }
}

/// Parses `rest-of-boundary-line CRLF *(header-line CRLF) CRLF`.
fn parse_block(block: &[u8]) -> Result<HeaderMap, ParseError> {
    // the first line is whatever followed the boundary, usually empty
    let lines = match memmem::find(block, CRLF) {
        Some(idx) => &block[idx + CRLF.len()..],
        None => return Err(ParseError::invalid_header("missing line break after boundary")),
    };

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let parsed = httparse::parse_headers(lines, &mut headers).map_err(|e| match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        e => ParseError::invalid_header(e),
    })?;

    let parsed_headers = match parsed {
        Status::Complete((_, parsed_headers)) => parsed_headers,
        Status::Partial => return Err(ParseError::invalid_header("incomplete header block")),
    };

    let mut header_map = HeaderMap::with_capacity(parsed_headers.len());
    for header in parsed_headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
        header_map.append(name, value);
    }

    Ok(header_map)
}
