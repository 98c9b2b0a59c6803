//! 공통 에러 처리 시스템
//!
//! 소켓 계층에서 발생하는 모든 에러를 분류하고, 호출자에게 돌려줄 수 없는
//! 에러(리더 루프, accept 루프 등)는 심각도에 맞는 로그 레벨로 처리합니다.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

/// 소켓 계층 에러 타입
#[derive(Error, Debug)]
pub enum SocketError {
    /// `connect()`/`start()` 시점에 필수 콜백이 빠져 있음
    #[error("설정 에러: 필수 콜백이 설정되지 않았습니다: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    /// 리스닝 포트를 사용할 수 없음
    #[error("바인드 에러 [{addr}]: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 레지스트리에 없는 주소
    #[error("연결이 존재하지 않습니다: {recipient}")]
    UnknownRecipient { recipient: String },

    /// 레지스트리에는 있지만 이미 끊어진 연결
    #[error("연결이 더 이상 살아있지 않습니다: {recipient}")]
    DeadConnection { recipient: String },

    /// 전송/연결/해제 중 발생한 I/O 에러
    #[error("네트워크 에러 [{addr}] [작업: {operation}]: {source}")]
    Io {
        addr: String,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// 데드라인 초과
    #[error("타임아웃 [{addr}] [작업: {operation}]: {timeout:?} 초과")]
    Timeout {
        addr: String,
        operation: &'static str,
        timeout: Duration,
    },
}

/// 결과 타입 별칭
pub type SocketResult<T> = Result<T, SocketError>;

impl SocketError {
    /// I/O 에러 생성
    pub fn io(addr: impl Into<String>, operation: &'static str, source: io::Error) -> Self {
        Self::Io {
            addr: addr.into(),
            operation,
            source,
        }
    }

    /// 이미 닫혔거나 아직 연결되지 않은 전송 계층에 대한 I/O 에러
    pub fn not_connected(addr: impl Into<String>, operation: &'static str) -> Self {
        Self::io(
            addr,
            operation,
            io::Error::new(io::ErrorKind::NotConnected, "소켓이 연결되어 있지 않습니다"),
        )
    }

    /// 타임아웃 에러 생성
    pub fn timeout(addr: impl Into<String>, operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout {
            addr: addr.into(),
            operation,
            timeout,
        }
    }

    /// 내부 `io::Error`가 있으면 그 종류를 돌려줍니다.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Bind { source, .. } | Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// 에러 심각도 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 정상 동작 중 발생하는 예상 가능한 상황
    Info,
    /// 주의가 필요하지만 서비스는 계속 가능
    Warning,
    /// 기능에 영향을 주지만 복구 가능
    Error,
    /// 서비스 중단이 필요한 심각한 문제
    Critical,
}

/// 에러 핸들러
///
/// 호출자에게 전파할 수 없는 에러를 중앙에서 로깅합니다.
pub struct ErrorHandler;

impl ErrorHandler {
    /// 에러를 심각도에 맞는 로그 레벨로 출력합니다.
    ///
    /// # Arguments
    ///
    /// * `error` - 처리할 에러
    /// * `severity` - 에러 심각도
    /// * `component` - 에러가 발생한 컴포넌트
    /// * `operation` - 에러가 발생한 작업
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcpsocket::tool::error::{ErrorHandler, ErrorSeverity, SocketError};
    ///
    /// let error = SocketError::not_connected("127.0.0.1:5533", "read");
    /// ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "Connection", "read_loop");
    /// ```
    pub fn handle_error(
        error: &SocketError,
        severity: ErrorSeverity,
        component: &str,
        operation: &str,
    ) {
        let log_message = format!("[{}] [{}] {}", component, operation, error);

        match severity {
            ErrorSeverity::Info => info!("{}", log_message),
            ErrorSeverity::Warning => warn!("{}", log_message),
            ErrorSeverity::Error => error!("{}", log_message),
            ErrorSeverity::Critical => {
                error!("🚨 CRITICAL: {}", log_message);
                error!("시스템 안정성에 영향을 줄 수 있는 심각한 문제입니다!");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 누락 콜백 목록이 메시지에 모두 포함되는지 확인
    #[test]
    fn test_configuration_display() {
        let error = SocketError::Configuration {
            missing: vec!["on_receive", "on_disconnect"],
        };

        let display_str = error.to_string();
        assert!(display_str.contains("on_receive, on_disconnect"));
        assert!(display_str.contains("설정 에러"));
    }

    #[test]
    fn test_io_kind() {
        let error = SocketError::not_connected("127.0.0.1:1", "send");
        assert_eq!(error.io_kind(), Some(io::ErrorKind::NotConnected));

        let error = SocketError::UnknownRecipient {
            recipient: "127.0.0.1:1".to_string(),
        };
        assert_eq!(error.io_kind(), None);
    }

    #[test]
    fn test_timeout_display() {
        let error = SocketError::timeout("10.0.0.1:80", "connect", Duration::from_millis(250));
        let display_str = error.to_string();

        assert!(display_str.contains("10.0.0.1:80"));
        assert!(display_str.contains("connect"));
        assert!(display_str.contains("250ms"));
    }

    /// 모든 심각도 레벨에서 로깅이 패닉 없이 동작하는지 확인
    #[test]
    fn test_error_severity() {
        let severities = [
            ErrorSeverity::Info,
            ErrorSeverity::Warning,
            ErrorSeverity::Error,
            ErrorSeverity::Critical,
        ];

        for severity in severities {
            let error = SocketError::DeadConnection {
                recipient: format!("테스트 {:?}", severity),
            };
            ErrorHandler::handle_error(&error, severity, "test_component", "test_operation");
        }
    }
}
