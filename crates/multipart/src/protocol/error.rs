use std::io;
use thiserror::Error;

/// Errors raised while splitting a byte stream into multipart tokens.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("could not find first boundary")]
    NoFirstBoundary,

    #[error("could not find end of headers")]
    NoEndOfHeaders,

    #[error("could not find end of body")]
    NoEndOfBody,

    #[error("part headers size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("part header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid part header: {reason}")]
    InvalidHeader { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised while assembling parts, reading their content or encoding them.
#[derive(Error, Debug)]
pub enum MultipartError {
    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("part number exceed the limit {max_parts}")]
    TooManyParts { max_parts: usize },

    #[error("part exceeded the memory usage limit of {max_size} bytes")]
    TooLargeInMemory { max_size: usize },

    #[error("part exceeded the disk usage limit of {max_size} bytes")]
    TooLargeOnDisk { max_size: u64 },

    #[error("invalid boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("body token received before any part headers")]
    UnexpectedBody,

    #[error("part content has already been consumed")]
    AlreadyConsumed,

    #[error("multipart stream aborted: {reason}")]
    Aborted { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Coarse classification of a [`MultipartError`].
///
/// An HTTP layer maps `Structural` and `LimitExceeded` to client errors and
/// `Io` to server errors; `IllegalState` points at a programming error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    LimitExceeded,
    Io,
    IllegalState,
}

impl MultipartError {
    pub fn too_many_parts(max_parts: usize) -> Self {
        Self::TooManyParts { max_parts }
    }

    pub fn too_large_in_memory(max_size: usize) -> Self {
        Self::TooLargeInMemory { max_size }
    }

    pub fn too_large_on_disk(max_size: u64) -> Self {
        Self::TooLargeOnDisk { max_size }
    }

    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn aborted<S: ToString>(str: S) -> Self {
        Self::Aborted { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MultipartError::Parse { source } => match source {
                ParseError::TooLargeHeader { .. } | ParseError::TooManyHeaders { .. } => ErrorKind::LimitExceeded,
                ParseError::Io { .. } => ErrorKind::Io,
                _ => ErrorKind::Structural,
            },
            MultipartError::TooManyParts { .. }
            | MultipartError::TooLargeInMemory { .. }
            | MultipartError::TooLargeOnDisk { .. } => ErrorKind::LimitExceeded,
            MultipartError::InvalidBoundary { .. } => ErrorKind::Structural,
            MultipartError::UnexpectedBody | MultipartError::AlreadyConsumed | MultipartError::Aborted { .. } => {
                ErrorKind::IllegalState
            }
            MultipartError::Io { .. } => ErrorKind::Io,
        }
    }

    #[inline]
    pub fn is_limit_exceeded(&self) -> bool {
        self.kind() == ErrorKind::LimitExceeded
    }
}
