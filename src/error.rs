use thiserror::Error;

/// Result type for mailvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching, decrypting and storing mail
#[derive(Error, Debug)]
pub enum Error {
    /// A remote object is missing required envelope metadata or carries an unparseable value
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// The key management service refused or failed to unwrap a data key
    #[error("Key unwrap error: {0}")]
    KeyUnwrap(String),

    /// An authentication tag did not verify
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Serialized data (cipher token, hex dump) does not have the expected shape
    #[error("Format error: {0}")]
    Format(String),

    /// Errors raised by a cipher primitive, such as bad padding or an unsupported algorithm
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Decrypted local content has no recognizable mail structure
    #[error("Invalid cipher format: {0}")]
    InvalidCipherFormat(String),

    /// Errors reported by the key management service itself
    #[error("KMS error: {0}")]
    Kms(String),

    /// Errors reported by the remote object store
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested local mail file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
