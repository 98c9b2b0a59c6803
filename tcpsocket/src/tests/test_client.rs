//! 소켓 클라이언트 테스트

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::{
    assert_no_event, next_event, recording_connection_callbacks, recording_server_callbacks,
    socket_pair, Event,
};
use crate::callback::{ConnectionCallbacks, ON_DISCONNECT};
use crate::service::{SocketClient, SocketServer};
use crate::tool::error::SocketError;

async fn running_server() -> (SocketServer, tokio::sync::mpsc::UnboundedReceiver<Event>, u16) {
    let (callbacks, events) = recording_server_callbacks();
    let server = SocketServer::bind("127.0.0.1", 0).with_callbacks(callbacks);
    server.start().await.expect("서버 시작");
    let port = server.local_addr().expect("바인드 주소").port();
    (server, events, port)
}

/// 콜백이 빠지면 다이얼하지 않고 설정 에러
#[tokio::test]
async fn test_missing_callbacks_fail_before_dial() {
    let client = SocketClient::new("127.0.0.1", 1)
        .with_callbacks(ConnectionCallbacks::new().on_receive(|_, _| {}));

    match client.connect().await {
        Err(SocketError::Configuration { missing }) => assert_eq!(missing, vec![ON_DISCONNECT]),
        other => panic!("설정 에러가 나야 함: {:?}", other.err()),
    }
    assert!(!client.is_alive());
    assert!(client.peer().is_none());
}

#[tokio::test]
async fn test_refused_dial_is_io_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("리스너 바인드");
    let port = listener.local_addr().expect("리스너 주소").port();
    drop(listener);

    let (callbacks, _events) = recording_connection_callbacks();
    let client = SocketClient::new("127.0.0.1", port).with_callbacks(callbacks);

    let error = client.connect().await.expect_err("닫힌 포트로는 연결되지 않아야 함");
    assert!(matches!(error, SocketError::Io { .. }), "{:?}", error);
    assert!(!client.is_alive());
}

/// 응답 없는 주소로 다이얼하면 데드라인에서 끊김 (환경에 따라 즉시 I/O 에러)
#[tokio::test]
async fn test_connect_timeout() {
    let (callbacks, _events) = recording_connection_callbacks();
    let client = SocketClient::new("10.255.255.1", 9)
        .with_callbacks(callbacks)
        .with_connect_timeout(Duration::from_millis(200));

    let result = tokio::time::timeout(super::WAIT, client.connect())
        .await
        .expect("connect_timeout이 지켜지지 않음");
    match result {
        Err(SocketError::Timeout { operation, .. }) => assert_eq!(operation, "connect"),
        Err(SocketError::Io { .. }) => {}
        other => panic!("시간 초과 또는 I/O 에러가 나야 함: {:?}", other.err()),
    }
}

/// 이미 연결된 스트림으로 만든 클라이언트도 수신과 전송이 됨
#[tokio::test]
async fn test_from_stream() {
    let (mut dialed, accepted) = socket_pair().await;
    let dialed_addr = dialed.local_addr().expect("로컬 주소").to_string();

    let (callbacks, mut events) = recording_connection_callbacks();
    let client = SocketClient::from_stream(accepted).with_callbacks(callbacks);
    assert_eq!(client.target(), dialed_addr);

    client.connect().await.expect("연결 시작");
    assert!(client.is_alive());

    dialed.write_all(b"ok").await.expect("쓰기");
    assert_eq!(next_event(&mut events).await, Event::Received(b'o', dialed_addr.clone()));
    assert_eq!(next_event(&mut events).await, Event::Received(b'k', dialed_addr));

    client.send(b"back").await.expect("전송");
    let mut buffer = [0u8; 4];
    tokio::time::timeout(super::WAIT, dialed.read_exact(&mut buffer))
        .await
        .expect("읽기 시간 초과")
        .expect("읽기");
    assert_eq!(&buffer, b"back");

    client.close().await.expect("해제");
    assert!(matches!(next_event(&mut events).await, Event::Disconnected(_)));
}

/// 연결 전에는 close가 아무것도 하지 않고 send는 실패
#[tokio::test]
async fn test_close_and_send_before_connect() {
    let (callbacks, _events) = recording_connection_callbacks();
    let client = SocketClient::new("127.0.0.1", 1).with_callbacks(callbacks);

    assert!(client.close().await.is_ok());
    let error = client.send(b"a").await.expect_err("연결 전 전송은 실패해야 함");
    assert_eq!(error.io_kind(), Some(std::io::ErrorKind::NotConnected));
}

/// 클라이언트가 보낸 바이트는 서버에서 클라이언트의 로컬 주소로 표시됨
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bytes_reach_server_tagged_with_client_address() {
    let (server, mut server_events, port) = running_server().await;

    let (callbacks, _events) = recording_connection_callbacks();
    let client = SocketClient::new("127.0.0.1", port).with_callbacks(callbacks);
    client.connect().await.expect("연결");

    let peer = client.peer().expect("연결 식별자");
    let client_addr = peer.local_addr().to_string();
    assert!(matches!(next_event(&mut server_events).await, Event::Connected(_)));

    client.send(b"hi").await.expect("전송");
    assert_eq!(
        next_event(&mut server_events).await,
        Event::Received(b'h', client_addr.clone())
    );
    assert_eq!(
        next_event(&mut server_events).await,
        Event::Received(b'i', client_addr)
    );

    client.close().await.expect("해제");
    server.close().await.expect("서버 중지");

    println!("✅ 클라이언트 송신 테스트 통과");
}

/// 닫은 뒤 다시 connect하면 같은 대상으로 새로 다이얼
#[tokio::test]
async fn test_redial_after_close() {
    let (server, mut server_events, port) = running_server().await;

    let (callbacks, mut events) = recording_connection_callbacks();
    let client = SocketClient::new("127.0.0.1", port).with_callbacks(callbacks);

    client.connect().await.expect("첫 연결");
    let first = client.peer().expect("첫 연결 식별자");
    assert!(matches!(next_event(&mut server_events).await, Event::Connected(_)));

    client.close().await.expect("해제");
    assert_eq!(next_event(&mut events).await, Event::Disconnected(first));
    assert!(!client.is_alive());

    client.connect().await.expect("재연결");
    assert!(client.is_alive());
    let second = client.peer().expect("두 번째 연결 식별자");
    assert_ne!(first.local_addr(), second.local_addr());

    client.close().await.expect("해제");
    server.close().await.expect("서버 중지");
}

/// 동시에 connect를 불러도 다이얼은 한 번만 일어남
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connect_dials_once() {
    let (server, mut server_events, port) = running_server().await;

    let (callbacks, _events) = recording_connection_callbacks();
    let client = SocketClient::new("127.0.0.1", port).with_callbacks(callbacks);

    let (first, second, third) = tokio::join!(client.connect(), client.connect(), client.connect());
    first.expect("첫 번째 connect");
    second.expect("두 번째 connect");
    third.expect("세 번째 connect");

    assert!(matches!(next_event(&mut server_events).await, Event::Connected(_)));
    assert_no_event(&mut server_events).await;
    assert_eq!(server.connection_count(), 1);

    let peer = client.peer().expect("연결 식별자");
    assert_eq!(server.connections(), vec![peer.local_addr().to_string()]);

    client.close().await.expect("해제");
    server.close().await.expect("서버 중지");
}
