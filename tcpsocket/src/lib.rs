//! TCP 소켓 라이브러리
//!
//! 여러 클라이언트 연결을 동시에 받는 서버와, 같은 연결 동작을 공유하는
//! 클라이언트를 제공합니다. 수신한 바이트와 연결/해제 이벤트는 사용자가 등록한
//! 콜백으로 전달됩니다.
//!
//! # 주요 기능
//!
//! - **연결 레지스트리**: 원격 주소(`host:port`)를 키로 살아있는 연결 관리
//! - **바이트 단위 전달**: 연결별 도착 순서대로 `on_receive` 호출
//! - **브로드캐스트**: 레지스트리 스냅샷 기반, 연결당 한 번만 전송
//! - **실패 격리**: 한 연결의 송수신 실패는 그 연결의 레지스트리 항목에만 영향
//! - **선택적 데드라인**: 다이얼/송신 타임아웃
//!
//! 메시지 프레이밍은 제공하지 않습니다. 바이트 스트림을 그대로 전달하며, 경계가
//! 필요하면 콜백 쪽에서 모읍니다 ([`LineBuffer`] 참고).
//!
//! # 아키텍처
//!
//! ```text
//! Socket Library
//! ├── Callback (콜백 계약)
//! │   ├── OnReceive / OnNewConnection / OnDisconnect
//! │   └── PeerHandle (전송 계층 식별자)
//! ├── Service Layer
//! │   ├── Connection (개별 연결)
//! │   ├── SocketClient (클라이언트)
//! │   ├── SocketServer (서버)
//! │   └── ConnectionRegistry (연결 레지스트리)
//! ├── Tool Layer
//! │   ├── Error (에러 처리)
//! │   └── LineBuffer (줄 단위 조립)
//! └── Config (릴레이 바이너리 설정)
//! ```
//!
//! # 사용 예시
//!
//! ```rust,no_run
//! use tcpsocket::{ServerCallbacks, SocketServer};
//!
//! # async fn run() -> tcpsocket::SocketResult<()> {
//! let server = SocketServer::bind("127.0.0.1", 5533).with_callbacks(
//!     ServerCallbacks::new()
//!         .on_receive(|byte, addr| println!("{} -> {:#04x}", addr, byte))
//!         .on_new_connection(|peer| println!("연결: {}", peer))
//!         .on_disconnect(|peer| println!("해제: {}", peer)),
//! );
//!
//! server.start().await?;
//! let report = server.send_all(b"x").await;
//! println!("{}/{}개 연결에 전송", report.delivered, report.attempted);
//! server.close().await?;
//! # Ok(())
//! # }
//! ```

/// 릴레이 바이너리 환경 설정
pub mod config;

/// 콜백 계약과 전송 계층 식별자
pub mod callback;

/// 연결, 클라이언트, 서버, 레지스트리
pub mod service;

/// 에러 처리와 프레이밍 도우미
pub mod tool;

#[cfg(test)]
mod tests;

pub use callback::{
    ConnectionCallbacks, OnDisconnect, OnNewConnection, OnReceive, PeerHandle, ServerCallbacks,
};
pub use config::{validate_config, SocketConfig, SocketMode};
pub use service::{BroadcastReport, Connection, ConnectionRegistry, SocketClient, SocketServer};
pub use tool::{ErrorHandler, ErrorSeverity, LineAssembler, LineBuffer, SocketError, SocketResult};
