//! Streaming part bodies.
//!
//! In streaming mode a part is handed to the consumer before its body has
//! been read. The body is then pulled through a pair of channels:
//!
//! - [`PartBody`]: the consumer side, implementing `http_body::Body`
//! - `BodySender`: the producer side, running on the part generator's task
//!   and reading `Body` tokens on demand
//!
//! Every poll of the body sends one data request and waits for one chunk, so
//! there is never more than one outstanding read. When the consumer drops the
//! body, or moves on to the next part, the producer skips the remaining
//! tokens of the part so the following parts can still be reached.

mod body_channel;

pub use body_channel::PartBody;
pub(crate) use body_channel::{BodyRequestSignal, create_body_sender_receiver};
