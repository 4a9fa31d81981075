//! RSA key generation, self-signed certificates, CSRs, and CA signing.
//!
//! This crate is a thin, idiomatic wrapper over [`rsa`] (RSA key generation,
//! since [`rcgen`] cannot generate RSA keys itself) and [`rcgen`] (X.509
//! certificate and CSR construction/signing).
//!
//! Typical CA-issued server certificate flow:
//!
//! 1. [`gen_rsa_and_cert`] for the CA itself (self-signed).
//! 2. [`gen_rsa_and_csr`] for the server's key and CSR.
//! 3. [`sign_csr`] to issue the server certificate under the CA.
//! 4. The caller appends the server's private key to the issued certificate
//!    file if a single combined PEM is wanted, and deletes the CSR file; this
//!    crate does not do either on the caller's behalf.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod params;

use std::{fs, path::Path};

pub use error::CertError;
pub use params::{CertificateParams, CsrParams, PrivateKeyParams};
use pkcs8::{EncodePrivateKey, EncryptPrivateKey, der::pem::LineEnding};
use rcgen::{
    DistinguishedName, DnType, Issuer, KeyPair, PKCS_RSA_SHA256,
    CertificateParams as RcgenCertParams, CertificateSigningRequestParams,
};
use rsa::RsaPrivateKey;
use rustls_pki_types::PrivatePkcs8KeyDer;
use time::{Duration as TimeDuration, OffsetDateTime};

fn generate_rsa_keypair(bits: u16) -> Result<(RsaPrivateKey, KeyPair), CertError> {
    let mut rng = rand::thread_rng();
    let rsa_key = RsaPrivateKey::new(&mut rng, bits as usize)
        .map_err(|e| CertError::KeyGeneration(e.to_string()))?;

    let pkcs8_der =
        rsa_key.to_pkcs8_der().map_err(|e| CertError::Pkcs8Encoding(e.to_string()))?;

    let key_pair =
        KeyPair::from_pkcs8_der_and_sign_algo(
            &PrivatePkcs8KeyDer::from(pkcs8_der.as_bytes().to_vec()),
            &PKCS_RSA_SHA256,
        )?;

    Ok((rsa_key, key_pair))
}

fn write_file(path: &Path, contents: &str) -> Result<(), CertError> {
    fs::write(path, contents)
        .map_err(|source| CertError::Io { path: path.display().to_string(), source })
}

/// PEM-encode the private key, encrypting it with `password` if one is set.
fn key_pem(rsa_key: &RsaPrivateKey, key_pair: &KeyPair, password: Option<&str>) -> Result<String, CertError> {
    match password {
        None => Ok(key_pair.serialize_pem()),
        Some(password) => {
            let mut rng = rand::thread_rng();
            let encrypted = rsa_key
                .encrypt_private_key(&mut rng, password.as_bytes())
                .map_err(|e| CertError::KeyEncryption(e.to_string()))?;
            encrypted
                .to_pem("ENCRYPTED PRIVATE KEY", LineEnding::LF)
                .map(|pem| pem.to_string())
                .map_err(|e| CertError::KeyEncryption(e.to_string()))
        },
    }
}

fn distinguished_name(country: &str, issuer: &str) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    name.push(DnType::CountryName, country);
    name.push(DnType::OrganizationName, issuer);
    name
}

/// Generate an RSA key pair and a self-signed X.509 certificate, writing
/// both to disk.
///
/// If `key.file_name == cert.file_name`, the private key is appended to the
/// certificate file so both live in a single combined PEM.
///
/// # Errors
///
/// Returns an error if key generation, certificate construction, or the
/// file writes fail.
pub fn gen_rsa_and_cert(
    key: &PrivateKeyParams,
    cert: &CertificateParams,
) -> Result<(), CertError> {
    let (rsa_key, key_pair) = generate_rsa_keypair(key.bits)?;

    let mut params = RcgenCertParams::new(cert.subject_alt_names.clone())?;
    params.distinguished_name = distinguished_name(&cert.country, &cert.issuer);
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = params.not_before + TimeDuration::days(i64::from(cert.days));

    let certificate = params.self_signed(&key_pair)?;

    let key_pem = key_pem(&rsa_key, &key_pair, key.password.as_deref())?;
    write_file(&key.file_name, &key_pem)?;

    if cert.file_name == key.file_name {
        let combined = format!("{}\n{}", certificate.pem(), key_pem);
        write_file(&cert.file_name, &combined)?;
    } else {
        write_file(&cert.file_name, &certificate.pem())?;
    }

    tracing::info!(path = %cert.file_name.display(), "generated self-signed certificate");
    Ok(())
}

/// Generate an RSA key pair and a PKCS#10 certificate signing request,
/// writing both to disk.
///
/// # Errors
///
/// Returns an error if key generation, CSR construction, or the file
/// writes fail.
pub fn gen_rsa_and_csr(key: &PrivateKeyParams, csr: &CsrParams) -> Result<(), CertError> {
    let (rsa_key, key_pair) = generate_rsa_keypair(key.bits)?;

    let mut params = RcgenCertParams::new(Vec::<String>::new())?;
    params.distinguished_name = distinguished_name(&csr.country, &csr.issuer);

    let request = params.serialize_request(&key_pair)?;

    write_file(&key.file_name, &key_pem(&rsa_key, &key_pair, key.password.as_deref())?)?;
    write_file(&csr.file_name, &request.pem()?)?;

    tracing::info!(path = %csr.file_name.display(), "generated certificate signing request");
    Ok(())
}

/// Sign a pending CSR under a CA certificate/key, issuing a certificate.
///
/// `ca_key_password` is used to decrypt `ca_key_file` when it is an
/// encrypted PKCS#8 key; pass `None` for an unencrypted key.
///
/// The caller is responsible for deleting `csr_file` afterward; this
/// function never deletes files it did not itself create.
///
/// # Errors
///
/// Returns an error if the CA material, the CSR, or the issued certificate
/// cannot be parsed, decrypted, or written.
pub fn sign_csr(
    ca_cert_file: &Path,
    ca_key_file: &Path,
    ca_key_password: Option<&str>,
    csr_file: &Path,
    certificate_file: &Path,
    days: u16,
) -> Result<(), CertError> {
    let ca_cert_pem = fs::read_to_string(ca_cert_file)
        .map_err(|source| CertError::Io { path: ca_cert_file.display().to_string(), source })?;
    let ca_key_pem = fs::read_to_string(ca_key_file)
        .map_err(|source| CertError::Io { path: ca_key_file.display().to_string(), source })?;

    let ca_key_pair = load_ca_key_pair(&ca_key_pem, ca_key_password)?;

    let ca_params = RcgenCertParams::from_ca_cert_pem(&ca_cert_pem)?;
    let issuer = Issuer::new(ca_params, ca_key_pair);

    let csr_pem = fs::read_to_string(csr_file)
        .map_err(|source| CertError::Io { path: csr_file.display().to_string(), source })?;
    let mut request_params = CertificateSigningRequestParams::from_pem(&csr_pem)?;
    request_params.params.not_before = OffsetDateTime::now_utc();
    request_params.params.not_after =
        request_params.params.not_before + TimeDuration::days(i64::from(days));

    let certificate = request_params.signed_by(&issuer)?;

    write_file(certificate_file, &certificate.pem())?;

    tracing::info!(path = %certificate_file.display(), "signed certificate under CA");
    Ok(())
}

fn load_ca_key_pair(pem: &str, password: Option<&str>) -> Result<KeyPair, CertError> {
    match password {
        None => KeyPair::from_pem(pem).map_err(CertError::from),
        Some(password) => {
            let der = pkcs8_decrypt(pem, password)?;
            KeyPair::from_pkcs8_der_and_sign_algo(
                &PrivatePkcs8KeyDer::from(der),
                &PKCS_RSA_SHA256,
            )
            .map_err(CertError::from)
        },
    }
}

fn pkcs8_decrypt(pem: &str, password: &str) -> Result<Vec<u8>, CertError> {
    let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(
        pkcs8::der::Document::from_pem(pem)
            .map_err(|e| CertError::KeyDecryption(e.to_string()))?
            .1
            .as_bytes(),
    )
    .map_err(|e| CertError::KeyDecryption(e.to_string()))?;

    let decrypted = encrypted
        .decrypt(password.as_bytes())
        .map_err(|e| CertError::KeyDecryption(e.to_string()))?;

    Ok(decrypted.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn generates_self_signed_cert_and_key() {
        let dir = tempdir().expect("tempdir");
        let key = PrivateKeyParams { file_name: dir.path().join("rsa.key"), bits: 2048, ..Default::default() };
        let cert =
            CertificateParams { file_name: dir.path().join("cert.crt"), ..Default::default() };

        gen_rsa_and_cert(&key, &cert).expect("gen_rsa_and_cert");

        assert!(key.file_name.exists());
        assert!(cert.file_name.exists());
        let pem = fs::read_to_string(&cert.file_name).expect("read cert");
        assert!(pem.contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn generates_csr() {
        let dir = tempdir().expect("tempdir");
        let key = PrivateKeyParams { file_name: dir.path().join("server.key"), bits: 2048, ..Default::default() };
        let csr = CsrParams { file_name: dir.path().join("server.csr"), ..Default::default() };

        gen_rsa_and_csr(&key, &csr).expect("gen_rsa_and_csr");

        let pem = fs::read_to_string(&csr.file_name).expect("read csr");
        assert!(pem.contains("BEGIN CERTIFICATE REQUEST"));
    }
}
