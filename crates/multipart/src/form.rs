//! Building `multipart/form-data` bodies.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use mime::Mime;
use tokio_util::codec::Encoder;

use crate::codec::MultipartEncoder;
use crate::ensure;
use crate::protocol::{ContentDisposition, Message, MultipartError, ParseError, PayloadItem};
use crate::reader::MAX_BOUNDARY_LEN;

/// Collects form fields and files into a complete multipart body.
///
/// The caller chooses the boundary; it must not occur in any part content.
///
/// ```
/// use micro_multipart::FormBuilder;
///
/// let form = FormBuilder::new("XYZ").text("a", "1").file("f", "f.txt", mime::TEXT_PLAIN, "hello");
/// assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
///
/// let body = form.to_bytes().unwrap();
/// assert!(body.starts_with(b"--XYZ\r\ncontent-disposition: form-data; name=\"a\"\r\n\r\n1\r\n"));
/// assert!(body.ends_with(b"\r\n--XYZ--\r\n"));
/// ```
#[derive(Debug)]
pub struct FormBuilder {
    boundary: String,
    parts: Vec<(HeaderMap, Bytes)>,
    error: Option<MultipartError>,
}

impl FormBuilder {
    pub fn new<S: Into<String>>(boundary: S) -> Self {
        Self { boundary: boundary.into(), parts: Vec::new(), error: None }
    }

    /// Adds a text field
    pub fn text<N: Into<String>, V: Into<String>>(self, name: N, value: V) -> Self {
        let disposition = ContentDisposition::form_data(name);
        self.disposition_part(&disposition, None, Bytes::from(value.into()))
    }

    /// Adds a file with its content type
    pub fn file<N, F, B>(self, name: N, filename: F, content_type: Mime, content: B) -> Self
    where
        N: Into<String>,
        F: Into<String>,
        B: Into<Bytes>,
    {
        let disposition = ContentDisposition::form_data(name).with_filename(filename);
        self.disposition_part(&disposition, Some(content_type), content.into())
    }

    /// Adds a part with arbitrary headers
    pub fn part<B: Into<Bytes>>(mut self, headers: HeaderMap, content: B) -> Self {
        self.parts.push((headers, content.into()));
        self
    }

    fn disposition_part(mut self, disposition: &ContentDisposition, content_type: Option<Mime>, content: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        match disposition.to_header_value() {
            Ok(value) => {
                headers.insert(CONTENT_DISPOSITION, value);
            }
            Err(e) => {
                self.record_error(ParseError::invalid_header(e));
            }
        }
        if let Some(content_type) = content_type {
            match HeaderValue::from_str(content_type.as_ref()) {
                Ok(value) => {
                    headers.insert(CONTENT_TYPE, value);
                }
                Err(e) => {
                    self.record_error(ParseError::invalid_header(e));
                }
            }
        }
        self.part(headers, content)
    }

    /// keeps the first error, reported by `to_bytes`
    fn record_error(&mut self, e: ParseError) {
        if self.error.is_none() {
            self.error = Some(e.into());
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The value for the `Content-Type` header of the request carrying this form
    pub fn content_type(&self) -> String {
        if self.boundary.bytes().all(is_token_byte) {
            format!("multipart/form-data; boundary={}", self.boundary)
        } else {
            format!("multipart/form-data; boundary=\"{}\"", self.boundary)
        }
    }

    /// Encodes all parts followed by the closing delimiter.
    pub fn to_bytes(&self) -> Result<Bytes, MultipartError> {
        if let Some(e) = &self.error {
            return Err(MultipartError::aborted(format!("form has an invalid part: {e}")));
        }
        ensure!(
            !self.boundary.is_empty() && self.boundary.len() <= MAX_BOUNDARY_LEN,
            MultipartError::invalid_boundary(format!("boundary must be 1 to {MAX_BOUNDARY_LEN} bytes"))
        );

        let mut encoder = MultipartEncoder::new(Bytes::copy_from_slice(self.boundary.as_bytes()));
        let mut dst = BytesMut::new();
        for (headers, content) in &self.parts {
            encoder.encode(Message::<_, Bytes>::Header(headers.clone()), &mut dst)?;
            if !content.is_empty() {
                encoder.encode(Message::<HeaderMap, _>::Payload(PayloadItem::Chunk(content.clone())), &mut dst)?;
            }
        }
        encoder.encode(Message::<HeaderMap, Bytes>::Payload(PayloadItem::Eof), &mut dst)?;
        Ok(dst.freeze())
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
