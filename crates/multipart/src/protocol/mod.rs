//! Core multipart protocol abstractions.
//!
//! This module provides the types shared by the codec and the part generator:
//! tokens, parts, part bodies and errors.
//!
//! # Architecture
//!
//! - **Message Handling** ([`message`]): decoder output and encoder input
//!   - [`Token`]: a part's header block or a chunk of its body
//!   - [`Message`]: part headers or payload chunks fed to the encoder
//!   - [`PayloadItem`]: a body chunk or the end marker
//!
//! - **Parts** ([`part`]): assembled parts handed to the consumer
//!   - [`Part`]: a form field, a file part or a data part
//!   - [`Content`]: in memory, in a temporary file, or streaming
//!   - [`PartContent`]: the bytes of a part as a `Stream` and an `http_body::Body`
//!
//! - **Body Streaming** ([`body`]): live part bodies in streaming mode
//!   - [`PartBody`](body::PartBody): consumer side implementing `http_body::Body`
//!
//! - **Header Values**: [`ContentDisposition`] and [`Charset`]
//!
//! - **Error Handling** ([`error`]):
//!   - [`ParseError`]: token level errors
//!   - [`MultipartError`]: part level errors, classified by [`ErrorKind`]

pub mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::Token;

pub mod part;
pub use part::Content;
pub use part::DataPart;
pub use part::FilePart;
pub use part::FormFieldPart;
pub use part::Part;
pub use part::PartContent;

mod charset;
pub use charset::Charset;
pub use charset::UnsupportedCharset;

mod disposition;
pub use disposition::ContentDisposition;

pub mod error;
pub use error::ErrorKind;
pub use error::MultipartError;
pub use error::ParseError;

pub mod body;
