use bytes::{Buf, Bytes};
use http::HeaderMap;

/// A token produced by the multipart decoder.
///
/// Every part starts with exactly one [`Token::Headers`], followed by zero or
/// more [`Token::Body`] chunks. The part ends at the next `Headers` token or at
/// the end of the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// The parsed header block that opens a new part
    Headers(HeaderMap),
    /// A non-empty chunk of the current part's body
    Body(Bytes),
}

impl Token {
    #[inline]
    pub fn is_headers(&self) -> bool {
        matches!(self, Token::Headers(_))
    }

    #[inline]
    pub fn is_body(&self) -> bool {
        matches!(self, Token::Body(_))
    }

    /// Returns the body bytes if this is a `Body` token
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Token::Body(bytes) => Some(bytes),
            Token::Headers(_) => None,
        }
    }

    /// Returns the header block if this is a `Headers` token
    pub fn as_headers(&self) -> Option<&HeaderMap> {
        match self {
            Token::Headers(headers) => Some(headers),
            Token::Body(_) => None,
        }
    }
}

/// A message fed to the multipart encoder.
///
/// `Header` opens a new part, `Payload(Chunk)` appends body bytes to it and
/// `Payload(Eof)` closes the whole multipart body.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    /// Contains the header information of type `T`
    Header(T),
    /// Contains a chunk of payload data or EOF marker
    Payload(PayloadItem<Data>),
}

/// Represents an item in a payload stream.
///
/// Used both for encoder input and for the chunks handed to a streaming part
/// body, where `Eof` marks the end of that part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

impl<T> Message<T> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

/// Converts bytes into a payload message
impl<T> From<Bytes> for Message<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the PayloadItem and returns the contained bytes if this is a Chunk
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
