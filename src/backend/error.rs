use thiserror::Error;

/// Failure while retrieving a page of image metadata.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to decode image list: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    General(String),
    #[error("page numbers start at 1, got {0}")]
    InvalidPage(u32),
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        FetchError::General(err.to_string())
    }
}

/// Failure while retrieving the bytes of a single image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("download failed: {0}")]
    DownloadFailure(#[from] TransportError),
    #[error("could not decode image: {0}")]
    Undecodable(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}
