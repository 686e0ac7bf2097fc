//! Part body handling.
//!
//! - [`BodyDecoder`]: splits a part body from the delimiter that ends it,
//!   holding back only the bytes that may still belong to the delimiter

mod body_decoder;

pub use body_decoder::BodyDecoder;
