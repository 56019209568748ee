use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn unsupported(operation: impl Into<String>, column_type: impl Into<String>) -> Error {
        Error(
            ErrorKind::Unsupported {
                operation: operation.into(),
                column_type: column_type.into(),
            }
            .into(),
        )
    }

    pub fn out_of_bounds(index: usize, len: usize) -> Error {
        Error(ErrorKind::OutOfBounds { index, len }.into())
    }

    pub fn illegal_state(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::IllegalState {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn format_overflow(format: impl Into<String>, value: u64, max: u64) -> Error {
        Error(
            ErrorKind::FormatOverflow {
                format: format.into(),
                value,
                max,
            }
            .into(),
        )
    }

    /// Returns `true` for malformed-argument failures.
    pub fn is_invalid_arg(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidArgument { .. })
    }

    /// Returns `true` when an operation was rejected by a column's capability set.
    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unsupported { .. })
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.kind(), ErrorKind::OutOfBounds { .. })
    }

    pub fn is_illegal_state(&self) -> bool {
        matches!(self.kind(), ErrorKind::IllegalState { .. })
    }

    pub fn is_format_overflow(&self) -> bool {
        matches!(self.kind(), ErrorKind::FormatOverflow { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("operation {operation} is not supported by {column_type} columns")]
    Unsupported {
        operation: String,
        column_type: String,
    },

    #[error("index {index} is out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[error("illegal state: {message}")]
    IllegalState { message: String },

    #[error("value {value} does not fit into {format} format (max {max})")]
    FormatOverflow {
        format: String,
        value: u64,
        max: u64,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
