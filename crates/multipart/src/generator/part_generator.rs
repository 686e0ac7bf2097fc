use std::iter;
use std::mem;

use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::future::poll_fn;
use futures::{Stream, StreamExt};
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use mime::Mime;
use tracing::{debug, error, warn};

use crate::config::MultipartConfig;
use crate::ensure;
use crate::generator::PartStream;
use crate::generator::storage::SpillFile;
use crate::protocol::body::create_body_sender_receiver;
use crate::protocol::{
    Charset, Content, ContentDisposition, DataPart, FilePart, FormFieldPart, MultipartError, ParseError, Part, Token,
};

/// the sender's own slot still queues one part
const PART_CHANNEL_SIZE: usize = 0;

/// Assembles the tokens of a multipart body into [`Part`]s.
///
/// The generator runs on its own task and is only reachable through the
/// [`PartStream`] returned by [`spawn`](PartGenerator::spawn).
#[derive(Debug)]
pub struct PartGenerator<S> {
    tokens: S,
    parts: mpsc::Sender<Result<Part, MultipartError>>,
    config: MultipartConfig,
    part_count: usize,
}

/// What is known about a part once its headers were read
struct PartHead {
    headers: HeaderMap,
    name: String,
    filename: Option<String>,
}

/// Per-part assembly state of a buffered part
enum PartState {
    /// a text field, always kept in memory
    FormField { buffer: BytesMut },
    InMemory { chunks: Vec<Bytes>, size: usize },
    File(SpillFile),
}

impl<S> PartGenerator<S>
where
    S: Stream<Item = Result<Token, ParseError>> + Unpin + Send + 'static,
{
    /// Starts assembling parts from `tokens` on a new task.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(tokens: S, config: MultipartConfig) -> PartStream {
        let (sender, receiver) = mpsc::channel(PART_CHANNEL_SIZE);
        let generator = Self { tokens, parts: sender, config, part_count: 0 };
        let driver = tokio::spawn(generator.run());
        PartStream::new(receiver, driver)
    }

    async fn run(mut self) {
        match self.generate().await {
            Ok(()) => debug!(part_count = self.part_count, "finished generating parts"),
            Err(e) => {
                error!(part_count = self.part_count, "failed to generate parts, {}", e);
                // the consumer may already be gone, nothing left to tell then
                let _ = emit(&mut self.parts, Err(e)).await;
            }
        }
    }

    async fn generate(&mut self) -> Result<(), MultipartError> {
        let mut headers = match self.tokens.next().await {
            Some(Ok(Token::Headers(headers))) => headers,
            Some(Ok(Token::Body(_))) => return Err(MultipartError::UnexpectedBody),
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(()),
        };

        loop {
            self.part_count += 1;
            if let Some(max_parts) = self.config.max_parts() {
                ensure!(self.part_count <= max_parts, MultipartError::too_many_parts(max_parts));
            }

            match self.generate_part(headers).await? {
                Some(next_headers) => headers = next_headers,
                None => return Ok(()),
            }
        }
    }

    /// Reads one part and hands it out, returning the headers of the next part
    async fn generate_part(&mut self, headers: HeaderMap) -> Result<Option<HeaderMap>, MultipartError> {
        let disposition = ContentDisposition::from_headers(&headers, self.config.headers_charset());
        let name = disposition.as_ref().and_then(|d| d.name()).unwrap_or_default().to_string();
        let filename = disposition.as_ref().and_then(|d| d.filename()).map(str::to_string);
        let head = PartHead { headers, name, filename };

        if head.filename.is_none() && is_form_field(&head.headers) {
            debug!(name = %head.name, "reading form field");
            return self.buffer_part(head, PartState::FormField { buffer: BytesMut::new() }).await;
        }

        if self.config.streaming() {
            return self.stream_part(head).await;
        }

        self.buffer_part(head, PartState::InMemory { chunks: Vec::new(), size: 0 }).await
    }

    async fn buffer_part(&mut self, head: PartHead, mut state: PartState) -> Result<Option<HeaderMap>, MultipartError> {
        let next_headers = match self.read_part(&mut state).await {
            Ok(next_headers) => next_headers,
            Err(e) => {
                state.discard().await;
                return Err(e);
            }
        };

        let part = state.complete(head).await?;
        debug!(name = part.name(), filename = part.filename(), "generated part");
        emit(&mut self.parts, Ok(part)).await?;
        Ok(next_headers)
    }

    async fn read_part(&mut self, state: &mut PartState) -> Result<Option<HeaderMap>, MultipartError> {
        loop {
            match self.tokens.next().await {
                Some(Ok(Token::Body(bytes))) => state.feed(bytes, &self.config).await?,
                Some(Ok(Token::Headers(next_headers))) => return Ok(Some(next_headers)),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    /// Hands the part out before its body is read, then serves the body on demand.
    async fn stream_part(&mut self, head: PartHead) -> Result<Option<HeaderMap>, MultipartError> {
        let (mut body_sender, body) = create_body_sender_receiver(&mut self.tokens);
        let part = build_part(head, Content::Streaming(body));
        debug!(name = part.name(), filename = part.filename(), "generated streaming part");

        emit(&mut self.parts, Ok(part)).await?;
        body_sender.start().await?;
        Ok(body_sender.into_next_headers())
    }
}

impl PartState {
    async fn feed(&mut self, bytes: Bytes, config: &MultipartConfig) -> Result<(), MultipartError> {
        let queued = match self {
            PartState::FormField { buffer } => {
                if let Some(max_size) = config.max_in_memory_size() {
                    ensure!(buffer.len() + bytes.len() <= max_size, MultipartError::too_large_in_memory(max_size));
                }
                buffer.extend_from_slice(&bytes);
                return Ok(());
            }
            PartState::InMemory { chunks, size } => match config.max_in_memory_size() {
                Some(max_size) if *size + bytes.len() > max_size => {
                    debug!(size = *size + bytes.len(), max_size, "part exceeds memory limit, switching to file");
                    mem::take(chunks)
                }
                _ => {
                    *size += bytes.len();
                    chunks.push(bytes);
                    return Ok(());
                }
            },
            PartState::File(file) => return file.write(&bytes).await,
        };

        let dir = config.file_storage_directory().to_path_buf();
        *self = PartState::File(SpillFile::create(dir, config.max_disk_usage_per_part()).await?);
        if let PartState::File(file) = self {
            for chunk in queued.iter().chain(iter::once(&bytes)) {
                file.write(chunk).await?;
            }
        }
        Ok(())
    }

    async fn complete(self, head: PartHead) -> Result<Part, MultipartError> {
        let content = match self {
            PartState::FormField { buffer } => {
                let charset = field_charset(&head.headers);
                return Ok(Part::Field(FormFieldPart::new(head.headers, head.name, buffer.freeze(), charset)));
            }
            PartState::InMemory { chunks, .. } => Content::Memory(chunks),
            PartState::File(file) => Content::File(file.finish().await?),
        };
        Ok(build_part(head, content))
    }

    async fn discard(self) {
        if let PartState::File(file) = self {
            file.discard().await;
        }
    }
}

fn build_part(head: PartHead, content: Content) -> Part {
    match head.filename {
        Some(filename) => Part::File(FilePart::new(head.headers, head.name, filename, content)),
        None => Part::Data(DataPart::new(head.headers, head.name, content)),
    }
}

/// Waits for room in the part channel, then sends `item`.
///
/// A part that cannot be delivered because the consumer is gone has its
/// temporary file removed.
async fn emit(
    parts: &mut mpsc::Sender<Result<Part, MultipartError>>,
    item: Result<Part, MultipartError>,
) -> Result<(), MultipartError> {
    let sent = match poll_fn(|cx| parts.poll_ready(cx)).await {
        Ok(()) => parts.try_send(item).map_err(|e| e.into_inner()),
        Err(_) => Err(item),
    };

    match sent {
        Ok(()) => Ok(()),
        Err(item) => {
            if let Ok(mut part) = item
                && let Some(path) = part.take_file()
            {
                // the blocking task completes even if this task is aborted meanwhile
                let removal = tokio::task::spawn_blocking(move || std::fs::remove_file(path));
                if let Ok(Err(e)) = removal.await {
                    warn!("failed to remove undelivered part file, {}", e);
                }
            }
            Err(MultipartError::aborted("part consumer is gone"))
        }
    }
}

fn content_type(headers: &HeaderMap) -> Option<Mime> {
    headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
}

/// A part without `Content-Type`, or with `text/plain`, is a form field
fn is_form_field(headers: &HeaderMap) -> bool {
    if !headers.contains_key(CONTENT_TYPE) {
        return true;
    }
    content_type(headers).is_some_and(|content_type| content_type.type_() == mime::TEXT && content_type.subtype() == mime::PLAIN)
}

fn field_charset(headers: &HeaderMap) -> Charset {
    content_type(headers)
        .and_then(|content_type| content_type.get_param(mime::CHARSET).map(|charset| Charset::from_label_or_utf8(charset.as_str())))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorKind;
    use futures::stream;
    use http::HeaderValue;
    use http::header::CONTENT_DISPOSITION;
    use std::time::Duration;

    fn headers(disposition: &str, content_type: Option<&str>) -> Result<Token, ParseError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_str(disposition).unwrap());
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        }
        Ok(Token::Headers(headers))
    }

    fn body(bytes: &'static [u8]) -> Result<Token, ParseError> {
        Ok(Token::Body(Bytes::from_static(bytes)))
    }

    fn spawn(tokens: Vec<Result<Token, ParseError>>, config: MultipartConfig) -> PartStream {
        PartGenerator::spawn(stream::iter(tokens), config)
    }

    async fn content_of(part: &mut Part) -> Bytes {
        part.content().await.unwrap().bytes().await.unwrap()
    }

    #[tokio::test]
    async fn field_and_file() {
        let tokens = vec![
            headers(r#"form-data; name="a""#, None),
            body(b"1"),
            headers(r#"form-data; name="f"; filename="f.txt""#, Some("text/plain")),
            body(b"hel"),
            body(b"lo"),
        ];
        let mut parts = spawn(tokens, MultipartConfig::default());

        let field = parts.next().await.unwrap().unwrap();
        assert_eq!(field.name(), "a");
        assert_eq!(field.as_field().unwrap().value(), "1");

        let mut file = parts.next().await.unwrap().unwrap();
        assert!(file.is_file());
        assert_eq!(file.name(), "f");
        assert_eq!(file.filename(), Some("f.txt"));
        assert!(file.as_file().unwrap().content().is_in_memory());
        assert_eq!(content_of(&mut file).await, Bytes::from_static(b"hello"));

        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_token_stream_has_no_parts() {
        let mut parts = spawn(vec![], MultipartConfig::default());
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn body_before_headers_fails() {
        let mut parts = spawn(vec![body(b"stray")], MultipartConfig::default());
        assert!(matches!(parts.next().await, Some(Err(MultipartError::UnexpectedBody))));
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn data_part_and_field_charset() {
        let tokens = vec![
            headers(r#"form-data; name="latin""#, Some("text/plain; charset=ISO-8859-1")),
            body(b"caf\xe9"),
            headers(r#"form-data; name="blob""#, Some("application/octet-stream")),
            body(b"\x00\x01"),
            headers("form-data", None),
        ];
        let mut parts = spawn(tokens, MultipartConfig::default());

        let latin = parts.next().await.unwrap().unwrap();
        assert_eq!(latin.as_field().unwrap().value(), "café");

        let mut blob = parts.next().await.unwrap().unwrap();
        assert!(matches!(blob, Part::Data(_)));
        assert_eq!(blob.filename(), None);
        assert_eq!(content_of(&mut blob).await, Bytes::from_static(b"\x00\x01"));

        // no name parameter and an empty body
        let unnamed = parts.next().await.unwrap().unwrap();
        assert_eq!(unnamed.name(), "");
        assert_eq!(unnamed.as_field().unwrap().value(), "");
    }

    #[tokio::test]
    async fn too_many_parts() {
        let tokens = vec![
            headers(r#"form-data; name="a""#, None),
            body(b"1"),
            headers(r#"form-data; name="b""#, None),
            body(b"2"),
            headers(r#"form-data; name="c""#, None),
            body(b"3"),
        ];
        let mut parts = spawn(tokens, MultipartConfig::default().with_max_parts(Some(2)));

        assert_eq!(parts.next().await.unwrap().unwrap().name(), "a");
        assert_eq!(parts.next().await.unwrap().unwrap().name(), "b");
        let error = parts.next().await.unwrap().unwrap_err();
        assert!(matches!(error, MultipartError::TooManyParts { max_parts: 2 }));
        assert!(error.is_limit_exceeded());
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn form_field_too_large() {
        let tokens = vec![headers(r#"form-data; name="a""#, None), body(b"1234"), body(b"5")];
        let mut parts = spawn(tokens, MultipartConfig::default().with_max_in_memory_size(Some(4)));

        let error = parts.next().await.unwrap().unwrap_err();
        assert!(matches!(error, MultipartError::TooLargeInMemory { max_size: 4 }));
    }

    #[tokio::test]
    async fn large_part_spills_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("uploads");
        let config =
            MultipartConfig::default().with_max_in_memory_size(Some(4)).with_file_storage_directory(&storage);
        let tokens = vec![
            headers(r#"form-data; name="f"; filename="big.bin""#, Some("application/octet-stream")),
            body(b"abc"),
            body(b"defg"),
            body(b"hij"),
        ];
        let mut parts = spawn(tokens, config);

        let mut part = parts.next().await.unwrap().unwrap();
        let path = part.as_file().unwrap().content().path().unwrap().to_path_buf();
        assert!(path.starts_with(&storage));
        assert_eq!(content_of(&mut part).await, Bytes::from_static(b"abcdefghij"));

        part.delete().await.unwrap();
        assert!(!path.exists());
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn disk_limit_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = MultipartConfig::default()
            .with_max_in_memory_size(Some(2))
            .with_max_disk_usage_per_part(Some(5))
            .with_file_storage_directory(dir.path());
        let tokens = vec![
            headers(r#"form-data; name="f"; filename="big.bin""#, Some("application/octet-stream")),
            body(b"abc"),
            body(b"def"),
        ];
        let mut parts = spawn(tokens, config);

        let error = parts.next().await.unwrap().unwrap_err();
        assert!(matches!(error, MultipartError::TooLargeOnDisk { max_size: 5 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn spill_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, b"occupied").unwrap();
        let config =
            MultipartConfig::default().with_max_in_memory_size(Some(2)).with_file_storage_directory(&not_a_dir);
        let tokens = vec![
            headers(r#"form-data; name="f"; filename="big.bin""#, Some("application/octet-stream")),
            body(b"abcdef"),
        ];
        let mut parts = spawn(tokens, config);

        let error = parts.next().await.unwrap().unwrap_err();
        assert!(matches!(error, MultipartError::Io { .. }));
        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn dropped_stream_removes_queued_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = MultipartConfig::default().with_max_in_memory_size(Some(16)).with_file_storage_directory(dir.path());
        let tokens = vec![
            headers(r#"form-data; name="f"; filename="big.bin""#, Some("application/octet-stream")),
            Ok(Token::Body(Bytes::from(vec![b'x'; 100 * 1024]))),
            headers(r#"form-data; name="g""#, None),
        ];
        // the last part never ends, so the spilled part stays queued
        let parts = PartGenerator::spawn(stream::iter(tokens).chain(stream::pending()), config);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        drop(parts);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn parse_error_is_last_item() {
        let tokens = vec![headers(r#"form-data; name="a""#, None), body(b"1"), Err(ParseError::NoEndOfBody)];
        let mut parts = spawn(tokens, MultipartConfig::default());

        let error = parts.next().await.unwrap().unwrap_err();
        assert!(matches!(error, MultipartError::Parse { source: ParseError::NoEndOfBody }));
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn streaming_parts() {
        let tokens = vec![
            headers(r#"form-data; name="a""#, None),
            body(b"1"),
            headers(r#"form-data; name="f"; filename="f.bin""#, Some("application/octet-stream")),
            body(b"first "),
            body(b"file"),
            headers(r#"form-data; name="g"; filename="g.bin""#, Some("application/octet-stream")),
            body(b"skipped"),
            headers(r#"form-data; name="h"; filename="h.bin""#, Some("application/octet-stream")),
            body(b"last"),
        ];
        let mut parts = spawn(tokens, MultipartConfig::default().with_streaming(true));

        // form fields are still buffered
        let field = parts.next().await.unwrap().unwrap();
        assert_eq!(field.as_field().unwrap().value(), "1");

        let mut first = parts.next().await.unwrap().unwrap();
        assert!(first.as_file().unwrap().content().is_streaming());
        assert_eq!(content_of(&mut first).await, Bytes::from_static(b"first file"));
        assert!(matches!(first.content().await, Err(MultipartError::AlreadyConsumed)));

        // asking for the next part skips the unread body of this one
        let skipped = parts.next().await.unwrap().unwrap();
        assert_eq!(skipped.name(), "g");

        let mut last = parts.next().await.unwrap().unwrap();
        assert_eq!(last.name(), "h");
        drop(skipped);
        assert_eq!(content_of(&mut last).await, Bytes::from_static(b"last"));
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn streaming_part_dropped_unread() {
        let tokens = vec![
            headers(r#"form-data; name="f"; filename="f.bin""#, Some("application/octet-stream")),
            body(b"never read"),
            headers(r#"form-data; name="b""#, None),
            body(b"2"),
        ];
        let mut parts = spawn(tokens, MultipartConfig::default().with_streaming(true));

        drop(parts.next().await.unwrap().unwrap());
        let field = parts.next().await.unwrap().unwrap();
        assert_eq!(field.as_field().unwrap().value(), "2");
    }
}
