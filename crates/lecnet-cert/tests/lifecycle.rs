//! End-to-end certificate lifecycle: CA, server CSR, CA-signed certificate.

use std::fs;

use lecnet_cert::{CertificateParams, CsrParams, PrivateKeyParams, gen_rsa_and_cert, gen_rsa_and_csr, sign_csr};
use tempfile::tempdir;

#[test]
fn ca_issues_server_certificate_from_csr() {
    let dir = tempdir().expect("tempdir");

    let ca_key = PrivateKeyParams { file_name: dir.path().join("ca.key"), bits: 2048, ..Default::default() };
    let ca_cert = CertificateParams {
        file_name: dir.path().join("ca.crt"),
        issuer: "lecnet-test-ca".to_string(),
        ..Default::default()
    };
    gen_rsa_and_cert(&ca_key, &ca_cert).expect("generate CA");

    let server_key =
        PrivateKeyParams { file_name: dir.path().join("server.key"), bits: 2048, ..Default::default() };
    let server_csr = CsrParams { file_name: dir.path().join("server.csr"), ..Default::default() };
    gen_rsa_and_csr(&server_key, &server_csr).expect("generate server CSR");

    let issued_cert_path = dir.path().join("server.crt");
    sign_csr(
        &ca_cert.file_name,
        &ca_key.file_name,
        None,
        &server_csr.file_name,
        &issued_cert_path,
        365,
    )
    .expect("sign CSR");

    let pem = fs::read_to_string(&issued_cert_path).expect("read issued cert");
    let mut reader = std::io::Cursor::new(pem.as_bytes());
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader).collect::<Result<_, _>>().expect("parse PEM");
    assert_eq!(certs.len(), 1);

    // The CSR file is still present; callers, not this crate, delete it.
    assert!(server_csr.file_name.exists());
}

#[test]
fn ca_key_can_be_password_protected() {
    let dir = tempdir().expect("tempdir");

    let ca_key = PrivateKeyParams {
        file_name: dir.path().join("ca.key"),
        password: Some("correct horse battery staple".to_string()),
        bits: 2048,
    };
    let ca_cert = CertificateParams {
        file_name: dir.path().join("ca.crt"),
        issuer: "lecnet-test-ca".to_string(),
        ..Default::default()
    };
    gen_rsa_and_cert(&ca_key, &ca_cert).expect("generate CA with encrypted key");

    let key_pem = fs::read_to_string(&ca_key.file_name).expect("read ca key");
    assert!(key_pem.contains("ENCRYPTED PRIVATE KEY"));

    let server_key =
        PrivateKeyParams { file_name: dir.path().join("server.key"), bits: 2048, ..Default::default() };
    let server_csr = CsrParams { file_name: dir.path().join("server.csr"), ..Default::default() };
    gen_rsa_and_csr(&server_key, &server_csr).expect("generate server CSR");

    let issued_cert_path = dir.path().join("server.crt");
    sign_csr(
        &ca_cert.file_name,
        &ca_key.file_name,
        ca_key.password.as_deref(),
        &server_csr.file_name,
        &issued_cert_path,
        365,
    )
    .expect("sign CSR with encrypted CA key");

    let wrong_password = sign_csr(
        &ca_cert.file_name,
        &ca_key.file_name,
        Some("wrong password"),
        &server_csr.file_name,
        &issued_cert_path,
        365,
    );
    assert!(wrong_password.is_err());
}
