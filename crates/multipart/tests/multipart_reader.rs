use std::io::{self, Cursor};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use http::HeaderMap;
use indoc::indoc;
use micro_multipart::codec::MultipartDecoder;
use micro_multipart::generator::PartStream;
use micro_multipart::protocol::{ErrorKind, MultipartError, ParseError, Part, Token};
use micro_multipart::{FormBuilder, MultipartConfig, MultipartReader};
use proptest::prelude::*;
use tokio_util::codec::Decoder;

fn wire(s: &str) -> Vec<u8> {
    s.replace('\n', "\r\n").into_bytes()
}

fn read_parts(body: Vec<u8>, config: MultipartConfig) -> PartStream {
    MultipartReader::new(Cursor::new(body), "XYZ", config).parts()
}

/// feeds `body` as a stream of `chunk_size` pieces
fn read_parts_chunked(body: &Bytes, chunk_size: usize, config: MultipartConfig) -> PartStream {
    let chunks: Vec<io::Result<Bytes>> = body.chunks(chunk_size).map(|chunk| Ok(body.slice_ref(chunk))).collect();
    MultipartReader::from_stream(futures::stream::iter(chunks), "XYZ", config).parts()
}

async fn content_of(part: &mut Part) -> Bytes {
    part.content().await.unwrap().bytes().await.unwrap()
}

#[tokio::test]
async fn field_then_file() {
    let body = wire(indoc! {r#"
        --XYZ
        Content-Disposition: form-data; name="a"

        1
        --XYZ
        Content-Disposition: form-data; name="f"; filename="f.txt"
        Content-Type: text/plain

        hello
        --XYZ--
    "#});
    let mut parts = read_parts(body, MultipartConfig::default());

    let field = parts.next().await.unwrap().unwrap();
    assert_eq!(field.name(), "a");
    assert_eq!(field.as_field().unwrap().value(), "1");

    let mut file = parts.next().await.unwrap().unwrap();
    assert_eq!(file.name(), "f");
    assert_eq!(file.filename(), Some("f.txt"));
    assert_eq!(file.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(content_of(&mut file).await, Bytes::from_static(b"hello"));

    assert!(parts.next().await.is_none());
}

#[tokio::test]
async fn form_builder_round_trip() {
    let mut custom = HeaderMap::new();
    custom.insert("content-disposition", "form-data; name=\"raw\"".parse().unwrap());
    custom.insert("content-type", "application/json".parse().unwrap());
    custom.insert("x-trace", "abc".parse().unwrap());

    let form = FormBuilder::new("XYZ")
        .text("greeting", "grüße")
        .file("doc", "résumé.pdf", mime::APPLICATION_PDF, Bytes::from_static(b"%PDF\r\n--XY\r\n-- not a boundary"))
        .part(custom, r#"{"k":1}"#);
    let body = form.to_bytes().unwrap();

    for chunk_size in [1, 2, 3, 7, 64, body.len()] {
        let mut parts = read_parts_chunked(&body, chunk_size, MultipartConfig::default());

        let greeting = parts.next().await.unwrap().unwrap();
        assert_eq!(greeting.as_field().unwrap().value(), "grüße");

        let mut doc = parts.next().await.unwrap().unwrap();
        assert_eq!(doc.filename(), Some("résumé.pdf"));
        assert_eq!(doc.headers().get("content-type").unwrap(), "application/pdf");
        assert_eq!(content_of(&mut doc).await, Bytes::from_static(b"%PDF\r\n--XY\r\n-- not a boundary"));

        let mut raw = parts.next().await.unwrap().unwrap();
        assert_eq!(raw.name(), "raw");
        assert_eq!(raw.headers().get("x-trace").unwrap(), "abc");
        assert_eq!(content_of(&mut raw).await, Bytes::from_static(br#"{"k":1}"#));

        assert!(parts.next().await.is_none(), "chunk size {chunk_size}");
    }
}

#[tokio::test]
async fn large_file_is_spilled_and_reconstructed() {
    let dir = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let body = FormBuilder::new("XYZ")
        .file("big", "big.bin", mime::APPLICATION_OCTET_STREAM, content.clone())
        .to_bytes()
        .unwrap();

    let config = MultipartConfig::default()
        .with_max_in_memory_size(Some(16 * 1024))
        .with_file_storage_directory(dir.path().join("spill"));
    let mut parts = read_parts_chunked(&body, 4096, config);

    let mut part = parts.next().await.unwrap().unwrap();
    let path = part.as_file().unwrap().content().path().unwrap().to_path_buf();
    assert_eq!(tokio::fs::read(&path).await.unwrap(), content);
    assert_eq!(content_of(&mut part).await, Bytes::from(content.clone()));

    let copy = dir.path().join("copy.bin");
    part.transfer_to(&copy).await.unwrap();
    assert_eq!(tokio::fs::read(&copy).await.unwrap(), content);

    part.delete().await.unwrap();
    assert!(!path.exists());
    assert!(parts.next().await.is_none());
}

#[tokio::test]
async fn oversized_form_field_fails() {
    let body = FormBuilder::new("XYZ").text("comment", "x".repeat(100)).to_bytes().unwrap();
    let mut parts = read_parts_chunked(&body, 16, MultipartConfig::default().with_max_in_memory_size(Some(64)));

    let error = parts.next().await.unwrap().unwrap_err();
    assert!(matches!(error, MultipartError::TooLargeInMemory { max_size: 64 }));
    assert_eq!(error.kind(), ErrorKind::LimitExceeded);
    assert!(parts.next().await.is_none());
}

#[tokio::test]
async fn part_count_limit() {
    let body = FormBuilder::new("XYZ").text("a", "1").text("b", "2").text("c", "3").to_bytes().unwrap();
    let mut parts = read_parts(body.to_vec(), MultipartConfig::default().with_max_parts(Some(2)));

    assert!(parts.next().await.unwrap().is_ok());
    assert!(parts.next().await.unwrap().is_ok());
    let error = parts.next().await.unwrap().unwrap_err();
    assert!(matches!(error, MultipartError::TooManyParts { max_parts: 2 }));
    assert!(error.is_limit_exceeded());
}

#[tokio::test]
async fn oversized_headers_fail_without_part() {
    let body = wire(indoc! {r#"
        --XYZ
        Content-Disposition: form-data; name="a"
        X-Padding: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa

        1
        --XYZ--
    "#});
    let mut parts = read_parts(body, MultipartConfig::default().with_max_headers_size(64));

    let error = parts.next().await.unwrap().unwrap_err();
    assert!(matches!(error, MultipartError::Parse { source: ParseError::TooLargeHeader { max_size: 64, .. } }));
    assert!(error.is_limit_exceeded());
    assert!(parts.next().await.is_none());
}

#[tokio::test]
async fn missing_final_boundary() {
    let body = wire(indoc! {r#"
        --XYZ
        Content-Disposition: form-data; name="a"

        1
        --XYZ
        Content-Disposition: form-data; name="b"

        truncated"#});
    let mut parts = read_parts(body, MultipartConfig::default());

    assert_eq!(parts.next().await.unwrap().unwrap().name(), "a");
    let error = parts.next().await.unwrap().unwrap_err();
    assert!(matches!(error, MultipartError::Parse { source: ParseError::NoEndOfBody }));
    assert_eq!(error.to_string(), "parse error: could not find end of body");
    assert_eq!(error.kind(), ErrorKind::Structural);
}

#[tokio::test]
async fn no_boundary_at_all() {
    let mut parts = read_parts(b"just some text".to_vec(), MultipartConfig::default());
    let error = parts.next().await.unwrap().unwrap_err();
    assert!(matches!(error, MultipartError::Parse { source: ParseError::NoFirstBoundary }));
}

#[tokio::test]
async fn parts_keep_input_order() {
    let form = (0..50).fold(FormBuilder::new("XYZ"), |form, i| form.text(format!("field-{i}"), i.to_string()));
    let body = form.to_bytes().unwrap();
    let mut parts = read_parts_chunked(&body, 5, MultipartConfig::default());

    let mut index = 0;
    while let Some(part) = parts.next().await {
        let part = part.unwrap();
        assert_eq!(part.name(), format!("field-{index}"));
        assert_eq!(part.as_field().unwrap().value(), index.to_string());
        index += 1;
    }
    assert_eq!(index, 50);
}

#[tokio::test]
async fn streaming_body_is_read_once() {
    let body = FormBuilder::new("XYZ")
        .file("f", "f.bin", mime::APPLICATION_OCTET_STREAM, "streamed content")
        .file("g", "g.bin", mime::APPLICATION_OCTET_STREAM, "ignored")
        .text("after", "still reached")
        .to_bytes()
        .unwrap();
    let mut parts = read_parts_chunked(&body, 4, MultipartConfig::default().with_streaming(true));

    let mut first = parts.next().await.unwrap().unwrap();
    let mut chunks = first.content().await.unwrap();
    let mut streamed = BytesMut::new();
    while let Some(chunk) = chunks.next().await {
        streamed.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(&streamed[..], b"streamed content");

    let error = first.content().await.unwrap_err();
    assert!(matches!(error, MultipartError::AlreadyConsumed));
    assert_eq!(error.kind(), ErrorKind::IllegalState);

    // never read, skipped when the next part is requested
    let second = parts.next().await.unwrap().unwrap();
    assert_eq!(second.name(), "g");

    let after = parts.next().await.unwrap().unwrap();
    assert_eq!(after.as_field().unwrap().value(), "still reached");
    assert!(parts.next().await.is_none());
}

/// decodes `body` split at `splits`, returning each part's headers and concatenated body
fn decode_split(body: &[u8], splits: &[usize]) -> Vec<(HeaderMap, Vec<u8>)> {
    let mut decoder = MultipartDecoder::new("XYZ", 1024);
    let mut buf = BytesMut::new();
    let mut parts: Vec<(HeaderMap, Vec<u8>)> = Vec::new();

    let mut on_token = |token: Token| match token {
        Token::Headers(headers) => parts.push((headers, Vec::new())),
        Token::Body(bytes) => {
            assert!(!bytes.is_empty());
            parts.last_mut().unwrap().1.extend_from_slice(&bytes);
        }
    };

    let mut start = 0;
    for &end in splits.iter().chain(std::iter::once(&body.len())) {
        buf.extend_from_slice(&body[start..end]);
        start = end;
        while let Some(token) = decoder.decode(&mut buf).unwrap() {
            on_token(token);
        }
    }
    while let Some(token) = decoder.decode_eof(&mut buf).unwrap() {
        on_token(token);
    }
    parts
}

proptest! {
    #[test]
    fn any_chunking_gives_same_parts(
        splits in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
        payload in proptest::collection::vec(prop_oneof![Just(b'\r'), Just(b'\n'), Just(b'-'), Just(b'X'), Just(b'Y'), Just(b'Z'), any::<u8>()], 0..64),
    ) {
        let body = FormBuilder::new("XYZ")
            .text("a", "1")
            .file("f", "f.bin", mime::APPLICATION_OCTET_STREAM, payload.clone())
            .to_bytes()
            .unwrap();

        // payloads containing the delimiter produce a different form, not a decoding error
        let delimiter = b"\r\n--XYZ";
        prop_assume!(!payload.windows(delimiter.len()).any(|w| w == delimiter));
        prop_assume!(!payload.ends_with(b"\r\n--XY") && !payload.ends_with(b"\r\n--X") && !payload.ends_with(b"\r\n--"));

        let mut offsets: Vec<usize> = splits.into_iter().map(|index| index.index(body.len() + 1)).collect();
        offsets.sort_unstable();

        let whole = decode_split(&body, &[]);
        let split = decode_split(&body, &offsets);
        prop_assert_eq!(whole.len(), 2);
        prop_assert_eq!(&whole[1].1, &payload);
        prop_assert_eq!(whole, split);
    }
}
