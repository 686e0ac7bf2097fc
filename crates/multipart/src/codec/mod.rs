//! Multipart codec module for encoding and decoding multipart bodies
//!
//! This module provides the byte level half of the crate: turning a stream of
//! raw bytes into part tokens, and part headers plus body bytes back into a
//! multipart body. It uses a state machine pattern on top of
//! `tokio_util::codec` so it can be driven by `FramedRead` / `FramedWrite`.
//!
//! # Architecture
//!
//! - Decoding:
//!   - [`MultipartDecoder`]: Decodes a multipart body into [`Token`](crate::protocol::Token)s
//!   - Header block parsing via the `header` module
//!   - Part body splitting via the `body` module
//!   - [`BoundaryMatcher`]: delimiter search across chunk borders
//!
//! - Encoding:
//!   - [`MultipartEncoder`]: Encodes part headers and body bytes
//!
//! # Example
//!
//! ```no_run
//! use micro_multipart::codec::{MultipartDecoder, MultipartEncoder};
//! use micro_multipart::protocol::{Message, PayloadItem};
//! use tokio_util::codec::{Decoder, Encoder};
//! use bytes::{Bytes, BytesMut};
//! use http::HeaderMap;
//!
//! let mut encoder = MultipartEncoder::new("XYZ");
//! let mut buffer = BytesMut::new();
//! encoder.encode(Message::<HeaderMap, Bytes>::Header(HeaderMap::new()), &mut buffer).unwrap();
//! encoder.encode(Message::<HeaderMap, Bytes>::Payload(PayloadItem::Eof), &mut buffer).unwrap();
//!
//! let mut decoder = MultipartDecoder::new("XYZ", 10 * 1024);
//! let token = decoder.decode(&mut buffer);
//! ```

mod body;
mod boundary;
mod header;
mod multipart_decoder;
mod multipart_encoder;

pub use boundary::BoundaryMatcher;
pub use multipart_decoder::MultipartDecoder;
pub use multipart_encoder::MultipartEncoder;
