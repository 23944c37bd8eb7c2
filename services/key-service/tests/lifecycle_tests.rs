//! Startup and shutdown of a served instance on a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use key_service::auth::JwtAuthenticator;
use key_service::{KeyService, MemoryKeyStore, ServiceOptions};
use test_utils::TEST_JWT_SECRET;

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_serve_reports_ready_then_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let service = KeyService::new(
        Arc::new(MemoryKeyStore::new()),
        Arc::new(JwtAuthenticator::new(TEST_JWT_SECRET.as_bytes(), None)),
        ServiceOptions {
            shutdown_timeout: Duration::from_millis(100),
            ..ServiceOptions::default()
        },
    );
    let shutdown = service.shutdown_handle();
    let server = tokio::spawn(service.serve(listener));

    let ready = http_get(addr, "/readyz").await;
    assert!(ready.starts_with("HTTP/1.1 200"), "{ready}");

    let missing = http_get(addr, "/keys/urn:sm:user:ghost").await;
    assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

    shutdown.initiate();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());

    assert!(TcpStream::connect(addr).await.is_err());
}
