use thiserror::Error;

/// Error type shared by every codec, directory and stream in the format layer.
///
/// The kinds follow the layer's failure taxonomy:
/// - contract violations ([`ErrorKind::ContractViolation`]): a writer or reader was
///   driven out of its state-machine order, or an ordering invariant was broken;
/// - decode errors ([`ErrorKind::InvalidFormat`], [`ErrorKind::ChecksumMismatch`]):
///   persisted bytes are malformed, truncated or disagree with the expected features;
/// - I/O failures of the storage collaborators ([`ErrorKind::Io`]).
///
/// Expected absence (no deletions, unknown field, end of a metadata sequence,
/// no committed generation) is never reported through this type.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns `true` if the error reports malformed persisted data.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidFormat { .. } | ErrorKind::ChecksumMismatch { .. }
        )
    }

    /// Returns `true` if the error reports a caller misusing a writer or reader.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self.kind(), ErrorKind::ContractViolation { .. })
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
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

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn contract(operation: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::ContractViolation {
                operation: operation.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn external<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::External {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("contract violation in '{operation}': {message}")]
    ContractViolation { operation: String, message: String },

    #[error("checksum mismatch for '{element}'")]
    ChecksumMismatch { element: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    External {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}
