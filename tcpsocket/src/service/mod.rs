//! 소켓 서비스 레이어
//!
//! # 서비스 구조
//!
//! ```text
//! Service Layer
//! ├── Connection (개별 연결)
//! │   ├── 수신 루프 (연결당 태스크 하나)
//! │   ├── 송신 / 데드라인 송신
//! │   └── 중복 없는 해제
//! ├── SocketClient (1:1 클라이언트)
//! │   └── 다이얼 후 Connection에 위임
//! ├── SocketServer (서버)
//! │   ├── accept 루프
//! │   ├── 개별 전송 / 브로드캐스트
//! │   └── 해제 / 재시작 / 종료
//! └── ConnectionRegistry (주소 → 연결)
//! ```
//!
//! # 동시성
//!
//! - 레지스트리는 DashMap 샤드 락으로 동기화되며 브로드캐스트는 스냅샷을 순회합니다.
//! - 콜백은 이벤트를 감지한 태스크에서 동기적으로 호출됩니다.
//! - 데드라인을 주지 않은 송신은 전송 계층이 막히는 동안 함께 기다립니다.

pub mod client;
pub mod connection;
pub mod registry;
pub mod server;

pub use client::SocketClient;
pub use connection::Connection;
pub use registry::ConnectionRegistry;
pub use server::{BroadcastReport, SocketServer};
