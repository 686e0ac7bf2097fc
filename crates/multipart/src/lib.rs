//! An asynchronous streaming `multipart/form-data` codec
//!
//! This crate decodes and encodes multipart bodies (RFC 2046, RFC 7578) on
//! top of tokio. The body is processed chunk by chunk as it arrives: it is
//! never buffered as a whole, and upstream is only read while the consumer
//! keeps up.
//!
//! # Features
//!
//! - Boundary detection across arbitrary chunk splits
//! - Header block parsing into `http::HeaderMap`
//! - Form fields decoded with their declared charset
//! - Large parts spilled to temporary files
//! - Optional streaming mode with live part bodies
//! - Limits on header size, memory, disk usage and part count
//! - Multipart body generation
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use micro_multipart::protocol::Part;
//! use micro_multipart::{FormBuilder, MultipartConfig, MultipartReader, boundary_from_content_type};
//! use tracing::info;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let form = FormBuilder::new("XYZ").text("a", "1").file("f", "f.txt", mime::TEXT_PLAIN, "hello");
//!     let body = form.to_bytes()?;
//!     let boundary = boundary_from_content_type(&form.content_type())?;
//!
//!     let chunks = futures::stream::iter(vec![Ok::<_, std::io::Error>(body)]);
//!     let mut parts = MultipartReader::from_stream(chunks, boundary, MultipartConfig::default()).parts();
//!
//!     while let Some(part) = parts.next().await {
//!         match part? {
//!             Part::Field(field) => info!(name = field.name(), value = field.value(), "form field"),
//!             mut part => {
//!                 let bytes = part.content().await?.bytes().await?;
//!                 info!(name = part.name(), filename = part.filename(), len = bytes.len(), "file");
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`codec`]: byte level decoding into tokens and encoding of parts
//! - [`generator`]: assembly of tokens into parts
//! - [`protocol`]: tokens, parts, header values and errors
//!
//! # Core Components
//!
//! ## Token Decoding
//!
//! [`codec::MultipartDecoder`] is a `tokio_util::codec::Decoder` splitting the
//! body into a `Headers` token per part followed by its `Body` tokens. Run in
//! a `FramedRead`, it pulls the next chunk only when the token stream is polled.
//!
//! ## Part Assembly
//!
//! [`generator::PartGenerator`] consumes the tokens on its own task and emits
//! [`protocol::Part`]s through a bounded channel. Form fields are buffered in
//! memory; other parts are buffered, spilled to a file once they grow beyond
//! the memory limit, or (streaming mode) handed out with a live body.
//!
//! ## Reading
//!
//! [`MultipartReader`] wires an `AsyncRead` or a byte stream through both
//! layers, configured by [`MultipartConfig`].
//!
//! ## Error Handling
//!
//! - [`protocol::ParseError`]: malformed input or header limits, at token level
//! - [`protocol::MultipartError`]: every error a part stream can end with,
//!   classified by [`protocol::ErrorKind`]
//!
//! The first error ends the part stream; nothing is retried.
//!
//! # Limitations
//!
//! - Folded (multi-line) part headers are rejected
//! - Maximum number of headers per part: 64
//! - Boundaries are not generated; [`FormBuilder`] uses the one it is given

pub mod codec;
pub mod generator;
pub mod protocol;

mod config;
pub use config::DEFAULT_MAX_HEADERS_SIZE;
pub use config::DEFAULT_MAX_IN_MEMORY_SIZE;
pub use config::MultipartConfig;

mod form;
pub use form::FormBuilder;

mod reader;
pub use reader::MAX_BOUNDARY_LEN;
pub use reader::MultipartReader;
pub use reader::boundary_from_content_type;

mod utils;
pub(crate) use utils::ensure;
