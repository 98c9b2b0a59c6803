//! 릴레이 바이너리 환경 설정 모듈
//!
//! .env 파일과 시스템 환경변수에서 실행 모드와 주소, 데드라인을 읽습니다.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

/// 실행 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketMode {
    /// 연결을 받아 stdin 줄을 모두에게 브로드캐스트
    Server,
    /// 서버에 연결해 stdin 줄을 전송
    Client,
}

impl FromStr for SocketMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            other => anyhow::bail!("알 수 없는 실행 모드: {}", other),
        }
    }
}

/// 소켓 릴레이 설정 구조체
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// 실행 모드
    pub mode: SocketMode,
    /// 서버 바인드 호스트 또는 클라이언트 대상 호스트
    ///
    /// 기본값 `127.0.0.1`은 클라이언트 모드의 대상으로도 쓰이므로 루프백입니다.
    /// 서버 모드에서 모든 인터페이스로 받으려면 `tcp_host=0.0.0.0`으로 지정합니다
    /// ([`SocketServer::new`](crate::SocketServer::new)의 기본 바인드와 같음).
    pub host: String,
    /// 포트 번호
    pub port: u16,
    /// 클라이언트 다이얼 데드라인 (0이면 없음)
    pub connect_timeout_ms: u64,
    /// 수신자별 쓰기 데드라인 (0이면 없음)
    pub send_timeout_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            mode: SocketMode::Server,
            host: "127.0.0.1".to_string(),
            port: 5533,
            connect_timeout_ms: 0,
            send_timeout_ms: 0,
        }
    }
}

impl SocketConfig {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// 로드 순서:
    /// 1. 상위 디렉토리의 .env 파일
    /// 2. 현재 디렉토리의 .env 파일
    /// 3. 시스템 환경변수
    /// 4. 기본값
    pub fn from_env() -> Result<Self> {
        Self::load_env_file();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        info!("소켓 설정 로드 완료: {:?}", config);
        Ok(config)
    }

    /// 키 조회 함수로부터 설정을 만듭니다. 숫자 파싱에 실패하면 기본값을 씁니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mode = match lookup("socket_mode") {
            Some(value) => value.parse()?,
            None => defaults.mode,
        };

        Ok(Self {
            mode,
            host: lookup("tcp_host").unwrap_or(defaults.host),
            port: lookup("tcp_port")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            connect_timeout_ms: lookup("connect_timeout_ms")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.connect_timeout_ms),
            send_timeout_ms: lookup("send_timeout_ms")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.send_timeout_ms),
        })
    }

    /// `host:port` 형태의 주소
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_ms > 0).then(|| Duration::from_millis(self.send_timeout_ms))
    }

    /// .env 파일을 로드합니다.
    fn load_env_file() {
        let env_paths = ["../.env", ".env", "../../.env"];

        let mut loaded = false;
        for path in env_paths {
            if Path::new(path).exists() && dotenv::from_filename(path).is_ok() {
                info!(".env 파일 로드 성공: {}", path);
                loaded = true;
                break;
            }
        }

        if !loaded {
            warn!(".env 파일을 찾을 수 없습니다. 기본값과 시스템 환경변수를 사용합니다.");
        }
    }
}

/// 설정 검증 유틸리티
pub fn validate_config(config: &SocketConfig) -> Result<()> {
    if config.port == 0 {
        anyhow::bail!("유효하지 않은 TCP 포트 번호: {}", config.port);
    }

    if config.host.trim().is_empty() {
        anyhow::bail!("TCP 호스트 주소가 비어있습니다");
    }

    Ok(())
}
