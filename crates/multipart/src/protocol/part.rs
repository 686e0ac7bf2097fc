//! Assembled parts.
//!
//! A [`Part`] is one section of a multipart body after its tokens were put
//! together by the part generator:
//!
//! - [`FormFieldPart`]: a text field, fully decoded into a `String`
//! - [`FilePart`]: a part with a filename
//! - [`DataPart`]: any other part
//!
//! File and data parts keep their bytes in a [`Content`], which is in memory,
//! in a temporary file, or (streaming mode) still on the wire.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::protocol::body::{BodyRequestSignal, PartBody};
use crate::protocol::{Charset, MultipartError};

#[derive(Debug)]
pub enum Part {
    Field(FormFieldPart),
    File(FilePart),
    Data(DataPart),
}

impl Part {
    /// The `name` parameter of the part's `Content-Disposition`, empty if absent
    pub fn name(&self) -> &str {
        match self {
            Part::Field(field) => &field.name,
            Part::File(file) => &file.name,
            Part::Data(data) => &data.name,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Part::File(file) => Some(&file.filename),
            Part::Field(_) | Part::Data(_) => None,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        match self {
            Part::Field(field) => &field.headers,
            Part::File(file) => &file.headers,
            Part::Data(data) => &data.headers,
        }
    }

    #[inline]
    pub fn is_field(&self) -> bool {
        matches!(self, Part::Field(_))
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        matches!(self, Part::File(_))
    }

    pub fn as_field(&self) -> Option<&FormFieldPart> {
        match self {
            Part::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FilePart> {
        match self {
            Part::File(file) => Some(file),
            _ => None,
        }
    }

    /// Opens the part's bytes.
    ///
    /// In-memory and file backed content can be opened any number of times.
    /// A streaming part can be opened once; later calls fail with
    /// [`MultipartError::AlreadyConsumed`].
    pub async fn content(&mut self) -> Result<PartContent, MultipartError> {
        match self {
            Part::Field(field) => Ok(PartContent::memory(vec![field.raw.clone()])),
            Part::File(file) => file.content.open().await,
            Part::Data(data) => data.content.open().await,
        }
    }

    /// Writes the part's bytes to `dest`, replacing any existing file.
    pub async fn transfer_to<P: AsRef<Path>>(&mut self, dest: P) -> Result<(), MultipartError> {
        match self {
            Part::Field(field) => tokio::fs::write(dest, &field.raw).await.map_err(MultipartError::io),
            Part::File(file) => file.content.transfer_to(dest.as_ref()).await,
            Part::Data(data) => data.content.transfer_to(dest.as_ref()).await,
        }
    }

    /// Releases the part's storage: removes its temporary file, or skips its
    /// unread streaming body.
    pub async fn delete(&mut self) -> Result<(), MultipartError> {
        match self {
            Part::Field(_) => Ok(()),
            Part::File(file) => file.content.delete().await,
            Part::Data(data) => data.content.delete().await,
        }
    }

    /// Takes the path of the part's temporary file, leaving the content `Consumed`
    pub(crate) fn take_file(&mut self) -> Option<PathBuf> {
        let content = match self {
            Part::Field(_) => return None,
            Part::File(file) => &mut file.content,
            Part::Data(data) => &mut data.content,
        };
        match mem::replace(content, Content::Consumed) {
            Content::File(path) => Some(path),
            other => {
                *content = other;
                None
            }
        }
    }

    /// A handle to cancel the part's live body, if it has one
    pub(crate) fn body_signal(&self) -> Option<mpsc::Sender<BodyRequestSignal>> {
        let content = match self {
            Part::Field(_) => return None,
            Part::File(file) => &file.content,
            Part::Data(data) => &data.content,
        };
        match content {
            Content::Streaming(body) => Some(body.signal_sender()),
            _ => None,
        }
    }
}

/// A text form field
#[derive(Debug)]
pub struct FormFieldPart {
    headers: HeaderMap,
    name: String,
    value: String,
    raw: Bytes,
}

impl FormFieldPart {
    pub(crate) fn new(headers: HeaderMap, name: String, raw: Bytes, charset: Charset) -> Self {
        let value = charset.decode(&raw).into_owned();
        Self { headers, name, value, raw }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded field value
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[derive(Debug)]
pub struct FilePart {
    headers: HeaderMap,
    name: String,
    filename: String,
    content: Content,
}

impl FilePart {
    pub(crate) fn new(headers: HeaderMap, name: String, filename: String, content: Content) -> Self {
        Self { headers, name, filename, content }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content(&self) -> &Content {
        &self.content
    }
}

#[derive(Debug)]
pub struct DataPart {
    headers: HeaderMap,
    name: String,
    content: Content,
}

impl DataPart {
    pub(crate) fn new(headers: HeaderMap, name: String, content: Content) -> Self {
        Self { headers, name, content }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content(&self) -> &Content {
        &self.content
    }
}

/// Where the bytes of a file or data part live.
#[derive(Debug)]
pub enum Content {
    /// Buffered chunks, in order
    Memory(Vec<Bytes>),
    /// A temporary file owned by the part, see [`Part::delete`]
    File(PathBuf),
    /// A live body that can be read once
    Streaming(PartBody),
    /// A streaming body that was already taken, or deleted content
    Consumed,
}

impl Content {
    #[inline]
    pub fn is_in_memory(&self) -> bool {
        matches!(self, Content::Memory(_))
    }

    #[inline]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Content::Streaming(_))
    }

    /// The path of the temporary file, if the content was spilled to disk
    pub fn path(&self) -> Option<&Path> {
        match self {
            Content::File(path) => Some(path),
            _ => None,
        }
    }

    async fn open(&mut self) -> Result<PartContent, MultipartError> {
        if let Content::Streaming(_) = self {
            // a live body is moved out, leaving `Consumed` behind
            return match mem::replace(self, Content::Consumed) {
                Content::Streaming(body) => Ok(PartContent { inner: ContentInner::Streaming(body) }),
                _ => Err(MultipartError::AlreadyConsumed),
            };
        }

        match self {
            Content::Memory(chunks) => Ok(PartContent::memory(chunks.clone())),
            Content::File(path) => {
                let file = File::open(&path).await.map_err(MultipartError::io)?;
                Ok(PartContent { inner: ContentInner::File(ReaderStream::new(file)) })
            }
            Content::Streaming(_) | Content::Consumed => Err(MultipartError::AlreadyConsumed),
        }
    }

    async fn transfer_to(&mut self, dest: &Path) -> Result<(), MultipartError> {
        if let Content::File(path) = self {
            tokio::fs::copy(&path, dest).await.map_err(MultipartError::io)?;
            return Ok(());
        }

        let mut content = self.open().await?;
        let mut file = File::create(dest).await.map_err(MultipartError::io)?;
        while let Some(bytes) = content.next().await {
            file.write_all(&bytes?).await.map_err(MultipartError::io)?;
        }
        file.flush().await.map_err(MultipartError::io)
    }

    async fn delete(&mut self) -> Result<(), MultipartError> {
        match mem::replace(self, Content::Consumed) {
            Content::File(path) => {
                debug!(path = %path.display(), "removing part file");
                tokio::fs::remove_file(&path).await.map_err(MultipartError::io)
            }
            // dropping a live body skips the rest of it
            _ => Ok(()),
        }
    }
}

/// The bytes of one part, as a [`Stream`] of chunks and as an
/// [`http_body::Body`].
pub struct PartContent {
    inner: ContentInner,
}

enum ContentInner {
    Memory(VecDeque<Bytes>),
    File(ReaderStream<File>),
    Streaming(PartBody),
}

impl PartContent {
    fn memory(chunks: Vec<Bytes>) -> Self {
        Self { inner: ContentInner::Memory(chunks.into()) }
    }

    /// Reads all remaining bytes into one buffer
    pub async fn bytes(self) -> Result<Bytes, MultipartError> {
        Ok(BodyExt::collect(self).await?.to_bytes())
    }
}

impl fmt::Debug for PartContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            ContentInner::Memory(_) => "memory",
            ContentInner::File(_) => "file",
            ContentInner::Streaming(_) => "streaming",
        };
        f.debug_struct("PartContent").field("kind", &kind).finish()
    }
}

impl Stream for PartContent {
    type Item = Result<Bytes, MultipartError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().inner {
            ContentInner::Memory(chunks) => Poll::Ready(chunks.pop_front().map(Ok)),
            ContentInner::File(stream) => stream.poll_next_unpin(cx).map_err(MultipartError::io),
            ContentInner::Streaming(body) => loop {
                match ready!(Pin::new(&mut *body).poll_frame(cx)) {
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            return Poll::Ready(Some(Ok(data)));
                        }
                    }
                    Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                    None => return Poll::Ready(None),
                }
            },
        }
    }
}

impl Body for PartContent {
    type Data = Bytes;
    type Error = MultipartError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.poll_next(cx).map_ok(Frame::data)
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            ContentInner::Memory(chunks) => SizeHint::with_exact(chunks.iter().map(|c| c.len() as u64).sum()),
            _ => SizeHint::new(),
        }
    }
}
