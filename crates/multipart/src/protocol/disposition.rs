//! `Content-Disposition` handling for multipart parts (RFC 7578 section 4.2,
//! RFC 6266, RFC 5987 extended parameters).

use std::fmt::Write;

use http::header::{CONTENT_DISPOSITION, InvalidHeaderValue};
use http::{HeaderMap, HeaderValue};

use crate::protocol::Charset;

/// The parsed `Content-Disposition` header of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    kind: String,
    name: Option<String>,
    filename: Option<String>,
}

impl ContentDisposition {
    /// A `form-data` disposition for the field `name`.
    pub fn form_data<S: Into<String>>(name: S) -> Self {
        Self { kind: "form-data".to_string(), name: Some(name.into()), filename: None }
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Reads the `Content-Disposition` of a part, decoding header bytes with `charset`.
    pub fn from_headers(headers: &HeaderMap, charset: Charset) -> Option<Self> {
        headers.get(CONTENT_DISPOSITION).map(|value| Self::parse(value.as_bytes(), charset))
    }

    /// Parses a raw header value.
    ///
    /// Parsing is lenient: malformed parameters are skipped. An extended
    /// `filename*` parameter takes precedence over a plain `filename`.
    pub fn parse(value: &[u8], charset: Charset) -> Self {
        let value = charset.decode(value);
        let mut segments = split_params(&value).into_iter();
        let kind = segments.next().map(|s| s.trim().to_ascii_lowercase()).unwrap_or_default();

        let mut name = None;
        let mut filename = None;
        let mut ext_filename = None;

        for segment in segments {
            let Some((key, raw)) = segment.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let raw = raw.trim();
            if key.eq_ignore_ascii_case("name") {
                name = Some(unquote(raw));
            } else if key.eq_ignore_ascii_case("filename") {
                filename = Some(unquote(raw));
            } else if key.eq_ignore_ascii_case("filename*") {
                ext_filename = decode_ext_value(&unquote(raw));
            }
        }

        Self { kind, name, filename: ext_filename.or(filename) }
    }

    /// The disposition type, lower-cased, e.g. `form-data`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Renders the header value.
    ///
    /// Non-ASCII filenames are written both raw and as an RFC 5987
    /// `filename*=UTF-8''...` parameter.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = self.kind.clone();
        if let Some(name) = &self.name {
            let _ = write!(value, "; name=\"{}\"", escape_quoted(name));
        }
        if let Some(filename) = &self.filename {
            let _ = write!(value, "; filename=\"{}\"", escape_quoted(filename));
            if !filename.is_ascii() {
                let _ = write!(value, "; filename*=UTF-8''{}", encode_ext_value(filename));
            }
        }
        HeaderValue::from_bytes(value.as_bytes())
    }
}

/// Splits on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut quoted = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                segments.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Decodes `charset'language'percent-encoded` values.
fn decode_ext_value(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;

    let charset: Charset = charset.parse().ok()?;
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut iter = encoded.bytes();
    while let Some(b) = iter.next() {
        if b == b'%' {
            let hi = iter.next().and_then(hex_value)?;
            let lo = iter.next().and_then(hex_value)?;
            bytes.push((hi << 4) | lo);
        } else {
            bytes.push(b);
        }
    }
    Some(charset.decode(&bytes).into_owned())
}

fn encode_ext_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            encoded.push(char::from(b));
        } else {
            let _ = write!(encoded, "%{b:02X}");
        }
    }
    encoded
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
