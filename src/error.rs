use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The distinguished name could not be tokenized.
    #[error("Name format error: {0}")]
    NameFormat(String),

    /// Certificate extension or field data is malformed.
    #[error("Certificate format error: {0}")]
    CertificateFormat(String),

    /// The OCSP responder could not be reached or answered with an HTTP error.
    #[error("OCSP transport error: {0}")]
    OcspTransport(String),

    /// The OCSP request or response bytes are malformed.
    #[error("OCSP encoding error: {0}")]
    OcspEncoding(String),

    /// The responder echoed a nonce different from the one sent.
    #[error("OCSP nonce mismatch: response nonce does not match the request nonce")]
    OcspNonceMismatch,

    /// A check was requested for a feature that is turned off.
    #[error("Feature disabled: {0}")]
    FeatureDisabled(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("CRL error: {0}")]
    Crl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
