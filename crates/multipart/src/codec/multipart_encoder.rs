//! Multipart body encoder
//!
//! The inverse of [`MultipartDecoder`](crate::codec::MultipartDecoder):
//!
//! - `Message::Header(headers)` opens a part: `--boundary CRLF`, the header
//!   lines and an empty line. If a part is open, its body is first ended with `CRLF`.
//! - `Message::Payload(PayloadItem::Chunk(bytes))` writes raw body bytes.
//! - `Message::Payload(PayloadItem::Eof)` writes the closing delimiter
//!   `CRLF --boundary-- CRLF`; nothing may be encoded afterwards.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::HeaderMap;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, MultipartError, PayloadItem};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    /// no part opened yet
    Ready,
    PartOpen,
    Closed,
}

#[derive(Debug)]
pub struct MultipartEncoder {
    boundary: Bytes,
    header_encoder: HeaderEncoder,
    state: State,
}

impl MultipartEncoder {
    /// Creates an encoder writing parts separated by `boundary` (without leading dashes).
    pub fn new<B: Into<Bytes>>(boundary: B) -> Self {
        Self { boundary: boundary.into(), header_encoder: HeaderEncoder, state: State::Ready }
    }

    #[inline]
    pub fn boundary(&self) -> &[u8] {
        &self.boundary
    }

    /// Returns true once the closing delimiter was written
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    fn put_boundary(&self, dst: &mut BytesMut) {
        dst.put_slice(b"--");
        dst.put_slice(&self.boundary);
    }
}

impl<D: Buf> Encoder<Message<HeaderMap, D>> for MultipartEncoder {
    type Error = MultipartError;

    fn encode(&mut self, item: Message<HeaderMap, D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match (self.state, item) {
            (State::Closed, _) => {
                error!("multipart body is already closed");
                Err(MultipartError::aborted("multipart body is already closed"))
            }

            (state, Message::Header(headers)) => {
                dst.reserve(self.boundary.len() + 8);
                if state == State::PartOpen {
                    dst.put_slice(b"\r\n");
                }
                self.put_boundary(dst);
                dst.put_slice(b"\r\n");
                self.state = State::PartOpen;
                self.header_encoder.encode(&headers, dst)
            }

            (State::Ready, Message::Payload(PayloadItem::Chunk(_))) => {
                error!("expect part headers but receive body bytes");
                Err(MultipartError::UnexpectedBody)
            }

            (_, Message::Payload(PayloadItem::Chunk(data))) => {
                dst.put(data);
                Ok(())
            }

            (state, Message::Payload(PayloadItem::Eof)) => {
                dst.reserve(self.boundary.len() + 8);
                if state == State::PartOpen {
                    dst.put_slice(b"\r\n");
                }
                self.put_boundary(dst);
                dst.put_slice(b"--\r\n");
                self.state = State::Closed;
                Ok(())
            }
        }
    }
}
