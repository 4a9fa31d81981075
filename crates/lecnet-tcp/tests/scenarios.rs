//! End-to-end scenarios exercising the client/server pair together.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use lecnet_tcp::{Client, ClientParams, LogEvent, Server, ServerParams};

const MAGIC: u32 = 0x4C43_4E54;

fn echo_on_receive() -> lecnet_tcp::OnReceiveFn {
    Arc::new(|_address, payload| payload.to_vec())
}

fn silent_log() -> lecnet_tcp::log::LogFn {
    Arc::new(|_event| {})
}

async fn start_plain_server(max_clients: usize) -> Server {
    let params = ServerParams {
        address: "127.0.0.1".to_string(),
        port: 0,
        max_clients,
        magic_number: MAGIC,
        use_ssl: false,
        ..Default::default()
    };
    let mut server = Server::new(params);
    server.start(echo_on_receive(), silent_log()).await.expect("server start");
    server
}

async fn connect_plain_client(port: u16) -> Client {
    let params = ClientParams {
        address: "127.0.0.1".to_string(),
        port,
        use_ssl: false,
        magic_number: MAGIC,
        timeout_seconds: 5,
        ..Default::default()
    };
    let mut client = Client::new(params);
    client.connect().await.expect("client connect");
    client
}

#[tokio::test]
async fn plain_echo_round_trip() {
    let server = start_plain_server(10).await;
    let port = server.local_addr().expect("bound").port();
    let client = connect_plain_client(port).await;

    let reply = client
        .send_data(b"hello lecnet", Duration::from_secs(2), || {})
        .await
        .expect("send_data");
    assert_eq!(&reply[..], b"hello lecnet");

    let traffic = client.traffic();
    assert!(traffic.sent > 0);
}

#[tokio::test]
async fn magic_mismatch_is_tolerated_not_fatal() {
    let server = start_plain_server(10).await;
    let port = server.local_addr().expect("bound").port();

    // A client with the wrong magic number gets no matching reply; its
    // send_data call should time out rather than crash the server.
    let params = ClientParams {
        address: "127.0.0.1".to_string(),
        port,
        use_ssl: false,
        magic_number: MAGIC + 1,
        timeout_seconds: 5,
        ..Default::default()
    };
    let mut client = Client::new(params);
    client.connect().await.expect("client connect");

    let result = client.send_data(b"probe", Duration::from_millis(300), || {}).await;
    assert!(result.is_err());

    // The server itself is unaffected; a well-formed client still works.
    let good_client = connect_plain_client(port).await;
    let reply =
        good_client.send_data(b"still alive", Duration::from_secs(2), || {}).await.expect("send");
    assert_eq!(&reply[..], b"still alive");
}

#[tokio::test]
async fn admission_cap_denies_excess_clients() {
    let server = start_plain_server(1).await;
    let port = server.local_addr().expect("bound").port();

    let first = connect_plain_client(port).await;
    let reply = first.send_data(b"first", Duration::from_secs(2), || {}).await.expect("send");
    assert_eq!(&reply[..], b"first");

    // The second connection is accepted at the TCP layer, then denied and
    // closed without ever registering.
    let mut second = Client::new(ClientParams {
        address: "127.0.0.1".to_string(),
        port,
        use_ssl: false,
        magic_number: MAGIC,
        timeout_seconds: 5,
        ..Default::default()
    });
    second.connect().await.expect("tcp connect succeeds even though denied");

    let result = second.send_data(b"second", Duration::from_millis(500), || {}).await;
    assert!(result.is_err());

    assert_eq!(server.client_info().len(), 1);
}

#[tokio::test]
async fn fragmented_send_above_read_chunk_size() {
    let server = start_plain_server(10).await;
    let port = server.local_addr().expect("bound").port();
    let client = connect_plain_client(port).await;

    let payload = vec![0x5Au8; 200 * 1024];
    let reply =
        client.send_data(&payload, Duration::from_secs(5), || {}).await.expect("send_data");
    assert_eq!(reply.len(), payload.len());
    assert_eq!(&reply[..], payload.as_slice());
}

#[tokio::test]
async fn two_concurrent_async_sends_correlate_independently() {
    let server = start_plain_server(10).await;
    let port = server.local_addr().expect("bound").port();
    let client = connect_plain_client(port).await;

    let id_a = client
        .send_data_async(Bytes::from_static(b"request-a"), Duration::from_secs(2))
        .await
        .expect("send_data_async a");
    let id_b = client
        .send_data_async(Bytes::from_static(b"request-b"), Duration::from_secs(2))
        .await
        .expect("send_data_async b");
    assert_ne!(id_a, id_b);

    let mut reply_a = None;
    let mut reply_b = None;
    for _ in 0..50 {
        if reply_a.is_none() {
            reply_a = client.get_response(id_a);
        }
        if reply_b.is_none() {
            reply_b = client.get_response(id_b);
        }
        if reply_a.is_some() && reply_b.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(&reply_a.expect("reply a").expect("reply a ok")[..], b"request-a");
    assert_eq!(&reply_b.expect("reply b").expect("reply b ok")[..], b"request-b");
}

#[tokio::test]
async fn stop_is_idempotent() {
    let mut server = start_plain_server(10).await;
    assert!(server.running());

    server.stop().await;
    assert!(!server.running());

    // Calling stop a second time on an already-stopped server is a no-op,
    // not an error.
    server.stop().await;
    assert!(!server.running());
}

#[tokio::test]
async fn traffic_accounting_matches_request_and_reply_size() {
    let server = start_plain_server(10).await;
    let port = server.local_addr().expect("bound").port();
    let client = connect_plain_client(port).await;

    let payload = b"accounted";
    client.send_data(payload, Duration::from_secs(2), || {}).await.expect("send_data");

    // One request frame in, one reply frame (same payload) out: each frame
    // is a 12-byte header plus the payload.
    let frame_len = (12 + payload.len()) as u64;
    let info = server.client_info();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].traffic.received, frame_len);
    assert_eq!(info[0].traffic.sent, frame_len);

    let total = server.traffic();
    assert_eq!(total.received, frame_len);
    assert_eq!(total.sent, frame_len);
}

#[tokio::test]
async fn server_traffic_total_survives_client_disconnect() {
    let mut server = start_plain_server(10).await;
    let port = server.local_addr().expect("bound").port();
    let mut client = connect_plain_client(port).await;

    let payload = b"counted-before-disconnect";
    client.send_data(payload, Duration::from_secs(2), || {}).await.expect("send_data");
    client.disconnect().await;

    // Give the session a moment to notice the close and de-register.
    for _ in 0..50 {
        if server.client_info().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(server.client_info().is_empty());

    let frame_len = (12 + payload.len()) as u64;
    let total = server.traffic();
    assert_eq!(total.received, frame_len);
    assert_eq!(total.sent, frame_len);

    server.stop().await;
}

#[tokio::test]
async fn start_on_already_running_server_is_idempotent() {
    let mut server = start_plain_server(10).await;
    assert!(server.running());

    let saw_already_running = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&saw_already_running);
    let result = server
        .start(
            echo_on_receive(),
            Arc::new(move |event| {
                if matches!(event, LogEvent::AlreadyRunning) {
                    flag.store(true, Ordering::SeqCst);
                }
            }),
        )
        .await;

    assert!(result.is_ok());
    assert!(saw_already_running.load(Ordering::SeqCst));
    assert!(server.running());

    server.stop().await;
}

#[tokio::test]
async fn close_all_blocks_until_registry_is_drained() {
    let server = start_plain_server(10).await;
    let port = server.local_addr().expect("bound").port();
    let client = connect_plain_client(port).await;

    client.send_data(b"ping", Duration::from_secs(2), || {}).await.expect("send_data");
    assert_eq!(server.client_info().len(), 1);

    // No polling: by the time close_all returns, the registry must already
    // be empty.
    server.close_all().await;
    assert!(server.client_info().is_empty());
}
