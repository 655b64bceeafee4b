use thiserror::Error;

/// Boxed cause carried by [`ApiError::Network`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by sticker service operations.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The configured base URL or an asset reference could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A 2xx response that was empty, markup, or missing required fields.
    #[error("Invalid response from sticker service: {0}")]
    InvalidResponse(String),

    /// Network-level request failure (DNS, connect, timeout, connection lost).
    #[error("{context}: {source}")]
    Network {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The request body could not be serialized.
    #[error("Failed to encode request body: {0}")]
    Encoding(#[source] serde_json::Error),

    /// A 2xx body was JSON but not the expected shape.
    #[error("Failed to decode response: {0}")]
    Decoding(#[source] serde_json::Error),

    /// HTTP 400, or an accepted-flag of `false` in a success envelope.
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP 500 with the server's message.
    #[error("Server error: {0}")]
    Server(String),

    /// Any other non-success HTTP status.
    #[error("Sticker service returned HTTP {status}")]
    Http { status: u16 },

    /// HTTP 429 or 503.
    #[error("Sticker service is overloaded")]
    Overloaded,

    /// The server reported the job itself as failed.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The result envelope reported success without an asset reference.
    #[error("Server did not return an image URL")]
    NoAssetReference,

    /// The asset could not be downloaded.
    #[error("Failed to download image: {0}")]
    AssetDownloadFailed(String),

    /// The response body was larger than the caller allowed.
    #[error("Response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// The downloaded bytes are not a decodable image.
    #[error("Downloaded data is not a valid image")]
    InvalidAssetData,

    /// The poll loop ran out of iterations before a terminal state.
    #[error("Timed out waiting for the sticker to be generated")]
    Timeout,
}

impl ApiError {
    pub(crate) fn network(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ApiError::Network {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Whether retrying the whole operation later can reasonably succeed.
    ///
    /// Only capacity and connectivity failures qualify; everything else is
    /// either authoritative or a client-side problem.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Overloaded | ApiError::Network { .. })
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ApiError::Overloaded => {
                "The sticker server is busy right now. Please try again in a few minutes."
            }
            ApiError::Network { .. } => {
                "Could not reach the sticker server. Check your connection and try again."
            }
            _ => "Something went wrong while creating your sticker. If this keeps happening, contact support.",
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiError>;
