//! 소켓 계층 공통 유틸리티 모듈
//!
//! 에러 처리와 줄 단위 프레이밍 도우미를 제공합니다.

pub mod error;
pub mod line_buffer;

pub use error::{ErrorHandler, ErrorSeverity, SocketError, SocketResult};
pub use line_buffer::{LineAssembler, LineBuffer};
