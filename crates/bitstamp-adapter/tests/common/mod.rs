/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bitstamp-adapter tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;

use bitstamp_adapter::{BitstampClient, ClientConfig, Credentials};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_credentials() -> Credentials {
    Credentials::new("client-1", "api-key", "api-secret")
}

/// Client pointed at the mock server
pub fn test_client(server: &MockServer) -> BitstampClient {
    test_client_with_config(server, ClientConfig::default())
}

pub fn test_client_with_config(server: &MockServer, config: ClientConfig) -> BitstampClient {
    BitstampClient::with_config_and_base_url(test_credentials(), config, &server.uri())
        .expect("client init")
}

/// Decode a form-encoded request body
pub fn form_fields(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Count occurrences of a key in a form-encoded request body
pub fn form_key_count(body: &[u8], key: &str) -> usize {
    url::form_urlencoded::parse(body)
        .filter(|(name, _)| name == key)
        .count()
}

/// Accept one WebSocket connection on a local port and hand it to `handler`.
///
/// Returns the `ws://` URL to dial.
pub async fn spawn_ws_server<F, Fut>(handler: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake");
        handler(ws).await;
    });

    format!("ws://{addr}")
}
