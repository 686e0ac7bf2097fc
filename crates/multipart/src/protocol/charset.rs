use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// The character sets understood when turning part headers and form field
/// values into text.
///
/// Unknown labels are rejected by [`FromStr`]; callers that read a charset from
/// the wire fall back to UTF-8 instead.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Charset {
    #[default]
    Utf8,
    Iso8859_1,
    UsAscii,
}

impl Charset {
    /// Decodes `bytes`, replacing invalid sequences with U+FFFD.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes),
            // every latin-1 byte maps to the code point of the same value
            Charset::Iso8859_1 => match std::str::from_utf8(bytes) {
                Ok(s) if s.is_ascii() => Cow::Borrowed(s),
                _ => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
            },
            Charset::UsAscii => {
                if bytes.is_ascii() {
                    String::from_utf8_lossy(bytes)
                } else {
                    Cow::Owned(bytes.iter().map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' }).collect())
                }
            }
        }
    }

    /// Resolves a charset label, falling back to UTF-8 for unknown labels.
    pub fn from_label_or_utf8(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Iso8859_1 => "ISO-8859-1",
            Charset::UsAscii => "US-ASCII",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported charset: {0}")]
pub struct UnsupportedCharset(String);

impl FromStr for Charset {
    type Err = UnsupportedCharset;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let label = label.trim().trim_matches('"');
        if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
            Ok(Charset::Utf8)
        } else if label.eq_ignore_ascii_case("iso-8859-1")
            || label.eq_ignore_ascii_case("iso8859-1")
            || label.eq_ignore_ascii_case("latin1")
        {
            Ok(Charset::Iso8859_1)
        } else if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
            Ok(Charset::UsAscii)
        } else {
            Err(UnsupportedCharset(label.to_string()))
        }
    }
}

impl TryFrom<String> for Charset {
    type Error = UnsupportedCharset;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
