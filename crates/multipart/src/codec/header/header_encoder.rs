//! Part header block encoder
//!
//! Serialises a part's [`HeaderMap`] as `Name: value CRLF` lines followed by
//! the empty line that separates headers from the part body.

use bytes::{BufMut, BytesMut};
use http::HeaderMap;
use tokio_util::codec::Encoder;

use crate::protocol::MultipartError;

/// Initial buffer size reserved for a header block
const INIT_HEADER_SIZE: usize = 256;

#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<&HeaderMap> for HeaderEncoder {
    type Error = MultipartError;

    fn encode(&mut self, headers: &HeaderMap, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_HEADER_SIZE);
        for (header_name, header_value) in headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
