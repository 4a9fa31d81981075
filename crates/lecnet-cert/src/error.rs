//! Errors produced by the certificate helpers.

use thiserror::Error;

/// Failure modes for key, certificate, CSR, and CA-signing operations.
#[derive(Debug, Error)]
pub enum CertError {
    /// Writing or reading a key/cert/CSR file on disk failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being read or written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// RSA key generation failed.
    #[error("RSA key generation failed: {0}")]
    KeyGeneration(String),

    /// Encoding the generated key as PKCS#8 DER failed.
    #[error("PKCS#8 encoding failed: {0}")]
    Pkcs8Encoding(String),

    /// Building or signing the certificate/CSR via rcgen failed.
    #[error("certificate generation failed: {0}")]
    Rcgen(#[from] rcgen::Error),

    /// The CA's private key could not be decrypted with the given password.
    #[error("failed to decrypt CA private key: {0}")]
    KeyDecryption(String),

    /// A generated private key could not be password-encrypted for storage.
    #[error("failed to encrypt private key: {0}")]
    KeyEncryption(String),

    /// No PEM-encoded certificate or key was found in a file expected to
    /// contain one.
    #[error("no PEM-encoded {kind} found in {path}")]
    MissingPem {
        /// What was being looked for ("certificate" or "private key").
        kind: &'static str,
        /// The file that was scanned.
        path: String,
    },
}
