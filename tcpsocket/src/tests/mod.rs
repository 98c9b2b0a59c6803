//! 소켓 라이브러리 테스트 모듈
//!
//! 각 기능별로 분리된 테스트 파일들을 관리합니다.

pub mod test_client;

// 테스트 유틸리티
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::callback::{ConnectionCallbacks, PeerHandle, ServerCallbacks};

/// 이벤트 대기 상한
pub const WAIT: Duration = Duration::from_secs(3);

/// 콜백에서 관찰한 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Received(u8, String),
    Connected(PeerHandle),
    Disconnected(PeerHandle),
}

/// 루프백에서 연결된 (다이얼한 쪽, 수락한 쪽) 스트림 쌍
pub async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("리스너 바인드");
    let addr = listener.local_addr().expect("리스너 주소");

    let (dialed, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (dialed.expect("다이얼"), accepted.expect("수락").0)
}

/// 모든 이벤트를 채널로 보내는 연결 콜백
pub fn recording_connection_callbacks() -> (ConnectionCallbacks, UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let receive_tx = tx.clone();

    let callbacks = ConnectionCallbacks::new()
        .on_receive(move |byte, addr| {
            let _ = receive_tx.send(Event::Received(byte, addr.to_string()));
        })
        .on_disconnect(move |peer| {
            let _ = tx.send(Event::Disconnected(*peer));
        });

    (callbacks, rx)
}

/// 모든 이벤트를 채널로 보내는 서버 콜백
pub fn recording_server_callbacks() -> (ServerCallbacks, UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let receive_tx = tx.clone();
    let connect_tx = tx.clone();

    let callbacks = ServerCallbacks::new()
        .on_receive(move |byte, addr| {
            let _ = receive_tx.send(Event::Received(byte, addr.to_string()));
        })
        .on_new_connection(move |peer| {
            let _ = connect_tx.send(Event::Connected(*peer));
        })
        .on_disconnect(move |peer| {
            let _ = tx.send(Event::Disconnected(*peer));
        });

    (callbacks, rx)
}

/// 다음 이벤트를 기다립니다.
pub async fn next_event(rx: &mut UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("이벤트 대기 시간 초과")
        .expect("이벤트 채널이 닫힘")
}

/// 짧게 기다려도 추가 이벤트가 없는지 확인합니다.
pub async fn assert_no_event(rx: &mut UnboundedReceiver<Event>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err(), "예상하지 못한 추가 이벤트");
}
