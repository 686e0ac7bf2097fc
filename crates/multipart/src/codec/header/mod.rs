//! Part header processing for encoding and decoding
//!
//! # Components
//!
//! - [`HeaderDecoder`]: Decodes a part's header block from raw bytes
//!   - Enforces the per-part header size limit
//!   - Parses `Name: Value` lines with `httparse`
//!
//! - [`HeaderEncoder`]: Encodes a part's headers to bytes

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
