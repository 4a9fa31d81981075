//! TLS configuration loading for the server and client.
//!
//! The server falls back to an ephemeral self-signed certificate when no
//! certificate/key pair is configured, exactly as the distilled spec's
//! `main.rs`-level warning describes ("NOT suitable for production use").
//! The client always verifies the server against the configured CA
//! certificate; there is no insecure-skip-verification mode.

use std::{fs, io::Cursor, path::Path, sync::Arc};

use rustls::{ClientConfig, RootCertStore, ServerConfig};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::TcpError;

/// Build a server-side TLS configuration.
///
/// If `cert_path`/`key_path` are both set, the certificate chain and key are
/// loaded from disk (decrypting the key with `key_password` if given).
/// Otherwise an ephemeral self-signed certificate is generated for the
/// current process.
///
/// # Errors
///
/// Returns [`TcpError::Tls`] if the certificate/key material is malformed
/// or the TLS config cannot be built, [`TcpError::Io`] if a file cannot be
/// read.
pub fn server_config(
    cert_path: Option<&Path>,
    key_path: Option<&Path>,
    key_password: Option<&str>,
) -> Result<ServerConfig, TcpError> {
    let (certs, key) = match (cert_path, key_path) {
        (Some(cert_path), Some(key_path)) => {
            load_cert_chain_and_key(cert_path, key_path, key_password)?
        },
        _ => self_signed_cert_and_key()?,
    };

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TcpError::Tls(e.to_string()))
}

/// Build a client-side TLS configuration trusting only `ca_cert_path`.
///
/// # Errors
///
/// Returns [`TcpError::Io`] if the CA file cannot be read, or
/// [`TcpError::Tls`] if it contains no usable certificate.
pub fn client_config(ca_cert_path: &Path) -> Result<ClientConfig, TcpError> {
    let pem = fs::read(ca_cert_path)?;
    let mut reader = Cursor::new(pem);
    let mut store = RootCertStore::empty();

    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut reader).collect::<Result<_, _>>().map_err(TcpError::Io)?;
    if certs.is_empty() {
        return Err(TcpError::Tls(format!("no certificate found in {}", ca_cert_path.display())));
    }
    for cert in certs {
        store.add(cert).map_err(|e| TcpError::Tls(e.to_string()))?;
    }

    Ok(ClientConfig::builder().with_root_certificates(store).with_no_client_auth())
}

fn load_cert_chain_and_key(
    cert_path: &Path,
    key_path: &Path,
    key_password: Option<&str>,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), TcpError> {
    let cert_pem = fs::read(cert_path)?;
    let mut cert_reader = Cursor::new(cert_pem);
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut cert_reader).collect::<Result<_, _>>().map_err(TcpError::Io)?;
    if certs.is_empty() {
        return Err(TcpError::Tls(format!("no certificate found in {}", cert_path.display())));
    }

    let key_pem = fs::read_to_string(key_path)?;
    let key_der = match key_password {
        None => {
            let mut key_reader = Cursor::new(key_pem.as_bytes());
            rustls_pemfile::private_key(&mut key_reader)
                .map_err(TcpError::Io)?
                .ok_or_else(|| TcpError::Tls(format!("no private key found in {}", key_path.display())))?
        },
        Some(password) => {
            let der = decrypt_pkcs8(&key_pem, password)?;
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der))
        },
    };

    Ok((certs, key_der))
}

fn decrypt_pkcs8(pem: &str, password: &str) -> Result<Vec<u8>, TcpError> {
    let (_, doc) =
        pkcs8::der::Document::from_pem(pem).map_err(|e| TcpError::Tls(e.to_string()))?;
    let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(doc.as_bytes())
        .map_err(|e| TcpError::Tls(e.to_string()))?;
    let decrypted =
        encrypted.decrypt(password.as_bytes()).map_err(|e| TcpError::Tls(e.to_string()))?;
    Ok(decrypted.as_bytes().to_vec())
}

fn self_signed_cert_and_key()
-> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), TcpError> {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| TcpError::Tls(e.to_string()))?;

    let cert_der = CertificateDer::from(cert.der().to_vec());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(signing_key.serialize_der()));

    Ok((vec![cert_der], key_der))
}

/// Shared `Arc`-wrapped client config, ready to clone into
/// `tokio_rustls::TlsConnector::from`.
pub type SharedClientConfig = Arc<ClientConfig>;
