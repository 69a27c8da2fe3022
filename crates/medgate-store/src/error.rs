/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but isn't a JSON object of strings.
    #[error("storage is corrupt: {0}")]
    Corrupt(String),

    /// A stored snapshot couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] medgate_protocol::ProtocolError),

    /// An empty token was handed to `TokenStore::write`.
    #[error("refusing to store an empty token")]
    EmptyToken,

    /// The alias layout is unusable (no keys, duplicates).
    #[error("invalid storage layout: {0}")]
    InvalidLayout(String),
}
