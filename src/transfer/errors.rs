use crate::contract::ContractStoreError;
use crate::messages::MessageError;

pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors surfaced by the data-transfer orchestrator. Background download
/// failures are recorded in the contract store instead and reported through
/// the progress endpoint.
#[derive(Debug)]
pub enum TransferError {
    Decode(String),
    NotFound(String),
    Unauthorized,
    IncompleteResponses(String),
    IncompleteCoverage,
    IncompleteContracts,
    UnknownFileSize,
    SizeMismatch {
        expected: u64,
        actual: u64,
    },
    DecryptionFailed(String),
    Validation(String),
    Transport(String),
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(msg) => write!(f, "{msg}"),
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Unauthorized => write!(f, "failed to authorize access token"),
            Self::IncompleteResponses(msg) => write!(f, "{msg}"),
            Self::IncompleteCoverage => write!(
                f,
                "failed to coordinate the responses into contracts: selected files are not equal to the requested files"
            ),
            Self::IncompleteContracts => {
                write!(f, "incomplete number of contracts returned from verifiers")
            }
            Self::UnknownFileSize => write!(f, "file size is unknown for the requested file"),
            Self::SizeMismatch { expected, actual } => write!(
                f,
                "total downloaded parts size ({actual}) is not equal to the file size ({expected})"
            ),
            Self::DecryptionFailed(msg) => write!(f, "{msg}"),
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Transport(msg) => write!(f, "{msg}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<MessageError> for TransferError {
    fn from(value: MessageError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<ContractStoreError> for TransferError {
    fn from(value: ContractStoreError) -> Self {
        match value {
            ContractStoreError::ContractNotFound(hash) => {
                Self::NotFound(format!("contract {hash}"))
            }
            ContractStoreError::FileNotFound(hash) => Self::NotFound(format!("file {hash}")),
        }
    }
}
