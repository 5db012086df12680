//! Failures raised while talking to a contactless reader.

pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Enumeration came back empty.
    #[error("No NFC reader found")]
    NoReader,

    #[error("Reader {reader} is not attached")]
    ReaderNotFound { reader: String },

    /// No card answers on the reader, or it left the field mid-exchange.
    #[error("Lost contact with tag: {detail}")]
    Disconnected { detail: String },

    /// The reader refused or aborted an exchange.
    #[error("Reader exchange failed: {detail}")]
    Exchange { detail: String },

    /// The reader answered with bytes that cannot be interpreted.
    #[error("Malformed reader response: {detail}")]
    Malformed { detail: String },

    #[cfg(feature = "hardware-pcsc")]
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn reader_not_found(reader: impl Into<String>) -> Self {
        Self::ReaderNotFound {
            reader: reader.into(),
        }
    }

    pub fn disconnected(detail: impl Into<String>) -> Self {
        Self::Disconnected {
            detail: detail.into(),
        }
    }

    pub fn exchange(detail: impl Into<String>) -> Self {
        Self::Exchange {
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}
