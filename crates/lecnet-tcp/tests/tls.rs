//! TLS handshake scenario: server with a CA-issued certificate, client
//! verifying against that same CA.

use std::{sync::Arc, time::Duration};

use lecnet_cert::{CertificateParams, PrivateKeyParams, gen_rsa_and_cert};
use lecnet_tcp::{Client, ClientParams, Server, ServerParams};
use tempfile::tempdir;

#[tokio::test]
async fn tls_handshake_and_echo() {
    let dir = tempdir().expect("tempdir");
    let key = PrivateKeyParams { file_name: dir.path().join("server.key"), bits: 2048, ..Default::default() };
    let cert = CertificateParams {
        file_name: dir.path().join("server.crt"),
        issuer: "localhost".to_string(),
        ..Default::default()
    };
    gen_rsa_and_cert(&key, &cert).expect("generate server cert");

    let params = ServerParams {
        address: "127.0.0.1".to_string(),
        port: 0,
        max_clients: 10,
        magic_number: 7,
        use_ssl: true,
        cert_path: Some(cert.file_name.clone()),
        key_path: Some(key.file_name.clone()),
        ..Default::default()
    };
    let mut server = Server::new(params);
    server
        .start(Arc::new(|_addr, payload| payload.to_vec()), Arc::new(|_event| {}))
        .await
        .expect("server start");
    let port = server.local_addr().expect("bound").port();

    let client_params = ClientParams {
        address: "127.0.0.1".to_string(),
        port,
        use_ssl: true,
        ca_cert_path: cert.file_name,
        magic_number: 7,
        timeout_seconds: 5,
    };
    let mut client = Client::new(client_params);
    client.connect().await.expect("tls connect");

    let reply =
        client.send_data(b"over tls", Duration::from_secs(3), || {}).await.expect("send_data");
    assert_eq!(&reply[..], b"over tls");
}

#[tokio::test]
async fn tls_handshake_with_encrypted_key_and_wrong_ca_fails() {
    let dir = tempdir().expect("tempdir");
    let key = PrivateKeyParams {
        file_name: dir.path().join("server.key"),
        password: Some("swordfish".to_string()),
        bits: 2048,
    };
    let cert = CertificateParams {
        file_name: dir.path().join("server.crt"),
        issuer: "localhost".to_string(),
        ..Default::default()
    };
    gen_rsa_and_cert(&key, &cert).expect("generate server cert");

    let params = ServerParams {
        address: "127.0.0.1".to_string(),
        port: 0,
        max_clients: 10,
        magic_number: 9,
        use_ssl: true,
        cert_path: Some(cert.file_name.clone()),
        key_path: Some(key.file_name.clone()),
        key_password: key.password.clone(),
        ..Default::default()
    };
    let mut server = Server::new(params);
    server
        .start(Arc::new(|_addr, payload| payload.to_vec()), Arc::new(|_event| {}))
        .await
        .expect("server start with encrypted key");
    let port = server.local_addr().expect("bound").port();

    // A different, unrelated self-signed cert stands in for a wrong CA: the
    // client should refuse to trust the server's actual certificate.
    let wrong_ca_dir = tempdir().expect("tempdir");
    let wrong_key =
        PrivateKeyParams { file_name: wrong_ca_dir.path().join("other.key"), ..Default::default() };
    let wrong_cert = CertificateParams {
        file_name: wrong_ca_dir.path().join("other.crt"),
        issuer: "someone-else".to_string(),
        ..Default::default()
    };
    gen_rsa_and_cert(&wrong_key, &wrong_cert).expect("generate unrelated cert");

    let client_params = ClientParams {
        address: "127.0.0.1".to_string(),
        port,
        use_ssl: true,
        ca_cert_path: wrong_cert.file_name,
        magic_number: 9,
        timeout_seconds: 5,
    };
    let mut client = Client::new(client_params);
    let result = client.connect().await;
    assert!(result.is_err());
    assert!(!client.connected());
}
