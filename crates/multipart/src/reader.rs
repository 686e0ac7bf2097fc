//! The entry point tying the token decoder and the part generator together.

use std::io;

use bytes::Bytes;
use futures::Stream;
use mime::Mime;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::codec::MultipartDecoder;
use crate::config::MultipartConfig;
use crate::ensure;
use crate::generator::{PartGenerator, PartStream};
use crate::protocol::MultipartError;

/// Longest boundary allowed by RFC 2046
pub const MAX_BOUNDARY_LEN: usize = 70;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Reads a multipart body from an [`AsyncRead`].
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use micro_multipart::{MultipartConfig, MultipartReader, boundary_from_content_type};
///
/// # async fn handle(body: tokio::fs::File, content_type: &str) -> Result<(), micro_multipart::protocol::MultipartError> {
/// let boundary = boundary_from_content_type(content_type)?;
/// let mut parts = MultipartReader::new(body, boundary, MultipartConfig::default()).parts();
/// while let Some(part) = parts.next().await {
///     let mut part = part?;
///     let bytes = part.content().await?.bytes().await?;
///     println!("{}: {} bytes", part.name(), bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MultipartReader<R> {
    framed_read: FramedRead<R, MultipartDecoder>,
    config: MultipartConfig,
}

impl<R> MultipartReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a reader for a body whose parts are separated by `boundary`.
    pub fn new<B: AsRef<[u8]>>(reader: R, boundary: B, config: MultipartConfig) -> Self {
        let decoder = MultipartDecoder::new(boundary, config.max_headers_size());
        Self { framed_read: FramedRead::with_capacity(reader, decoder, READ_BUFFER_SIZE), config }
    }

    /// The raw token stream, see [`Token`](crate::protocol::Token)
    pub fn tokens(self) -> FramedRead<R, MultipartDecoder> {
        self.framed_read
    }

    #[inline]
    pub fn config(&self) -> &MultipartConfig {
        &self.config
    }
}

impl<R> MultipartReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Assembles the body into parts on a new task.
    ///
    /// Must be called within a tokio runtime.
    pub fn parts(self) -> PartStream {
        PartGenerator::spawn(self.framed_read, self.config)
    }
}

impl<S, E> MultipartReader<StreamReader<S, Bytes>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<io::Error>,
{
    /// Creates a reader for a body delivered as a stream of byte chunks,
    /// e.g. the data frames of an HTTP request body.
    pub fn from_stream<B: AsRef<[u8]>>(stream: S, boundary: B, config: MultipartConfig) -> Self {
        Self::new(StreamReader::new(stream), boundary, config)
    }
}

/// Extracts the `boundary` parameter of a `multipart/*` content type.
///
/// ```
/// use micro_multipart::boundary_from_content_type;
///
/// let boundary = boundary_from_content_type(r#"multipart/form-data; boundary="XYZ""#).unwrap();
/// assert_eq!(boundary, "XYZ");
/// assert!(boundary_from_content_type("text/plain").is_err());
/// ```
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let parsed: Mime = content_type.parse().map_err(MultipartError::invalid_boundary)?;
    ensure!(parsed.type_() == mime::MULTIPART, MultipartError::invalid_boundary(format!("not a multipart type: {parsed}")));

    let boundary = match parsed.get_param(mime::BOUNDARY) {
        Some(boundary) => boundary.as_str().trim_matches('"').to_string(),
        None => return Err(MultipartError::invalid_boundary("missing boundary parameter")),
    };
    ensure!(!boundary.is_empty(), MultipartError::invalid_boundary("empty boundary"));
    ensure!(
        boundary.len() <= MAX_BOUNDARY_LEN,
        MultipartError::invalid_boundary(format!("boundary longer than {MAX_BOUNDARY_LEN} bytes"))
    );
    Ok(boundary)
}
