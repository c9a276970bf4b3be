/// Errors from the annotation store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store refused the record; nothing was created.
    #[error("Annotation rejected: {0}")]
    Rejected(String),

    /// The store returned a non-2xx status other than a validation failure.
    #[error("Annotation store error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}
