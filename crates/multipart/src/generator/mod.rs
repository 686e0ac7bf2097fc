//! Part assembly.
//!
//! [`PartGenerator`] consumes the token stream produced by
//! [`MultipartDecoder`](crate::codec::MultipartDecoder) and assembles each run
//! of `Headers, Body*` tokens into a [`Part`](crate::protocol::Part):
//!
//! - parts without a filename and without a non-text content type become form
//!   fields, buffered in memory up to the memory limit
//! - in streaming mode every other part is handed out at once with a live body
//! - otherwise the body is buffered in memory and moved to a temporary file
//!   once it exceeds the memory limit
//!
//! The generator runs on a dedicated task and hands parts out through a
//! bounded channel wrapped in a [`PartStream`]; it only reads further input
//! while the consumer keeps up.

mod part_generator;
mod part_stream;
mod storage;

pub use part_generator::PartGenerator;
pub use part_stream::PartStream;
