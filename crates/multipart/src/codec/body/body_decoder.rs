//! Decoder for the body of one part.
//!
//! The body ends at the delimiter `CRLF "--" boundary`. Body bytes are emitted
//! as soon as they are known not to belong to the delimiter; a tail that could
//! still turn out to be the start of the delimiter stays in the source buffer
//! until the following bytes decide it. That tail is never longer than the
//! delimiter itself.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::boundary::BoundaryMatcher;
use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone)]
pub struct BodyDecoder {
    delimiter: BoundaryMatcher,
    /// bytes at the front of `src` already fed to the matcher
    scanned: usize,
}

impl BodyDecoder {
    /// Creates a decoder for parts separated by `boundary` (without the leading dashes)
    pub fn new(boundary: &[u8]) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary);
        Self { delimiter: BoundaryMatcher::new(&delimiter), scanned: 0 }
    }
}

impl Decoder for BodyDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes the next piece of the body.
    ///
    /// # Returns
    /// * `Ok(Some(PayloadItem::Chunk(bytes)))` for body bytes that can no longer be part of the delimiter
    /// * `Ok(Some(PayloadItem::Eof))` when the delimiter was consumed; `src` then starts right after it
    /// * `Ok(None)` when more data is needed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let unscanned = &src[self.scanned..];
        if unscanned.is_empty() {
            return Ok(None);
        }

        let delimiter_len = self.delimiter.needle().len();

        match self.delimiter.find(unscanned) {
            Some(idx) => {
                let delimiter_end = self.scanned + idx + 1;
                let body_len = delimiter_end - delimiter_len;
                self.scanned = 0;

                if body_len > 0 {
                    // the delimiter is found again from the front on the next call
                    let bytes = src.split_to(body_len).freeze();
                    trace!(len = bytes.len(), "read last body bytes of part");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                src.advance(delimiter_len);
                trace!("reached end of part body");
                Ok(Some(PayloadItem::Eof))
            }
            None => {
                let held = self.delimiter.matched();
                let emit = src.len() - held;
                self.scanned = held;

                if emit == 0 {
                    return Ok(None);
                }

                let bytes = src.split_to(emit).freeze();
                trace!(len = bytes.len(), held, "read body bytes");
                Ok(Some(PayloadItem::Chunk(bytes)))
            }
        }
    }
}
