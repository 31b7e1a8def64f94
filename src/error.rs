use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HuffError>;

#[derive(Debug, Error)]
pub enum HuffError {
    /// Nothing to count, so no tree and no header can exist.
    #[error("input is empty; nothing to compress")]
    EmptyInput,

    #[error("malformed header at offset {offset}: {reason}")]
    MalformedHeader { offset: usize, reason: String },

    /// The encode pass saw a byte the frequency pass did not.
    #[error("byte 0x{0:02x} has no code in the encoding map")]
    UnencodableSymbol(u8),

    #[error("bit stream ended inside a code (pending bits \"{pending}\")")]
    PrematureEndOfBits { pending: String },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl HuffError {
    pub(crate) fn header(offset: usize, reason: impl Into<String>) -> Self {
        HuffError::MalformedHeader {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<HuffError> for io::Error {
    fn from(e: HuffError) -> Self {
        match e {
            HuffError::Io(inner) => inner,
            HuffError::EmptyInput => io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            HuffError::PrematureEndOfBits { .. } => {
                io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string())
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}
