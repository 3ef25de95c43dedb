use thiserror::Error;

/// Result type alias for operations that may fail with [`VectorizeError`].
pub type VectorizeResult<T> = std::result::Result<T, VectorizeError>;

/// Error types that can occur while turning a raster image into a vector document.
///
/// Every variant maps onto a stable [`ErrorKind`] so callers on the other side of a
/// serialization boundary can branch on the kind rather than on the message text.
#[derive(Debug, Error)]
pub enum VectorizeError {
    /// Image decoding failed or the encoding is not supported.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    /// A raw pixel buffer does not match its declared dimensions.
    #[error("invalid pixel buffer: {0}")]
    InvalidBuffer(String),
    /// An option is outside its documented bounds.
    #[error("invalid option `{field}`: {message}")]
    Options {
        field: &'static str,
        message: String,
    },
    /// Tracing or fitting produced boundary data that cannot form a closed path.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
    /// The run was cancelled through its [`crate::CancelToken`].
    #[error("vectorization cancelled")]
    Cancelled,
    /// File system I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stable classification of a [`VectorizeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    Options,
    InvalidGeometry,
    Internal,
    Cancelled,
    Io,
}

impl ErrorKind {
    /// Name used when the error crosses a serialization boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Decode => "DecodeError",
            ErrorKind::Options => "OptionsError",
            ErrorKind::InvalidGeometry => "InvalidGeometry",
            ErrorKind::Internal => "Internal",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Io => "IoError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VectorizeError {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VectorizeError::Decode(_) | VectorizeError::InvalidBuffer(_) => ErrorKind::Decode,
            VectorizeError::Options { .. } => ErrorKind::Options,
            VectorizeError::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            VectorizeError::Internal(_) => ErrorKind::Internal,
            VectorizeError::Cancelled => ErrorKind::Cancelled,
            VectorizeError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn options(field: &'static str, message: impl Into<String>) -> Self {
        VectorizeError::Options {
            field,
            message: message.into(),
        }
    }
}
