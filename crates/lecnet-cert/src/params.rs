//! Parameter structs for key, certificate, and CSR generation.

use std::path::PathBuf;

/// Parameters controlling RSA private key generation.
#[derive(Debug, Clone)]
pub struct PrivateKeyParams {
    /// Where to write the generated key.
    pub file_name: PathBuf,
    /// Optional password used to encrypt the key on disk.
    pub password: Option<String>,
    /// RSA modulus size in bits.
    pub bits: u16,
}

impl Default for PrivateKeyParams {
    fn default() -> Self {
        Self { file_name: PathBuf::from("rsa.key"), password: None, bits: 2048 }
    }
}

/// Parameters controlling self-signed certificate generation.
#[derive(Debug, Clone)]
pub struct CertificateParams {
    /// Where to write the generated certificate.
    pub file_name: PathBuf,
    /// Validity period in days.
    pub days: u16,
    /// Two-letter country code in the certificate's subject.
    pub country: String,
    /// Issuer organization name.
    pub issuer: String,
    /// Subject alternative names (hostnames/IPs) the certificate is valid
    /// for. TLS clients match the address they connected to against this
    /// list, not against `issuer`.
    pub subject_alt_names: Vec<String>,
}

impl Default for CertificateParams {
    fn default() -> Self {
        Self {
            file_name: PathBuf::from("cert.crt"),
            days: 365 * 3,
            country: "ZW".to_string(),
            issuer: "liblec".to_string(),
            subject_alt_names: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

/// Parameters controlling CSR (PKCS#10) generation.
#[derive(Debug, Clone)]
pub struct CsrParams {
    /// Where to write the generated CSR.
    pub file_name: PathBuf,
    /// Requested validity period in days (informational; the CA that
    /// signs the CSR decides the actual validity).
    pub days: u16,
    /// Two-letter country code in the CSR's subject.
    pub country: String,
    /// Issuer/organization name to request.
    pub issuer: String,
}

impl Default for CsrParams {
    fn default() -> Self {
        Self {
            file_name: PathBuf::from("certreq.csr"),
            days: 365,
            country: "ZW".to_string(),
            issuer: "lecnet".to_string(),
        }
    }
}
