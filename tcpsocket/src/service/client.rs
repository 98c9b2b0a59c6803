//! 소켓 클라이언트
//!
//! 한 대상과 1:1로 통신하는 [`Connection`] 래퍼입니다. `connect()`는 필요하면
//! 먼저 대상 주소로 다이얼한 뒤 연결의 수신 루프를 시작합니다.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::callback::{ConnectionCallbacks, PeerHandle};
use crate::service::connection::Connection;
use crate::tool::error::{SocketError, SocketResult};

/// TCP 소켓 클라이언트
///
/// # Examples
///
/// ```rust,no_run
/// use tcpsocket::{ConnectionCallbacks, SocketClient};
///
/// # async fn run() -> tcpsocket::SocketResult<()> {
/// let client = SocketClient::new("127.0.0.1", 5533).with_callbacks(
///     ConnectionCallbacks::new()
///         .on_receive(|byte, _addr| print!("{}", byte as char))
///         .on_disconnect(|peer| println!("서버와 연결 해제: {}", peer)),
/// );
///
/// client.connect().await?;
/// client.send(b"hi\n").await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SocketClient {
    target: String,
    pending: Mutex<Option<TcpStream>>,
    callbacks: ConnectionCallbacks,
    connect_timeout: Option<Duration>,
    connection: Mutex<Option<Arc<Connection>>>,
    connecting: AsyncMutex<()>,
}

impl SocketClient {
    /// `host:port`로 다이얼할 클라이언트를 만듭니다. 다이얼은 `connect()`에서 합니다.
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self::with_target(format!("{}:{}", host.as_ref(), port), None)
    }

    /// 이미 연결된 스트림으로 클라이언트를 만듭니다.
    pub fn from_stream(stream: TcpStream) -> Self {
        let target = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self::with_target(target, Some(stream))
    }

    fn with_target(target: String, stream: Option<TcpStream>) -> Self {
        Self {
            target,
            pending: Mutex::new(stream),
            callbacks: ConnectionCallbacks::default(),
            connect_timeout: None,
            connection: Mutex::new(None),
            connecting: AsyncMutex::new(()),
        }
    }

    pub fn with_callbacks(mut self, callbacks: ConnectionCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// 콜백을 설정합니다. `connect()` 전에 호출해야 합니다.
    pub fn set_callbacks(&mut self, callbacks: ConnectionCallbacks) {
        self.callbacks = callbacks;
    }

    /// 다이얼에 데드라인을 둡니다.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// 대상에 연결하고 수신 루프를 시작합니다.
    ///
    /// 콜백 검사가 다이얼보다 먼저이므로 빠진 콜백이 있으면 네트워크에 접근하지 않습니다.
    /// 닫힌 뒤 다시 호출하면 같은 대상으로 새로 다이얼합니다. 동시에 여러 번 호출되면
    /// 하나만 다이얼하고 나머지는 그 결과를 보고 돌아갑니다.
    pub async fn connect(&self) -> SocketResult<()> {
        let _connecting = self.connecting.lock().await;
        if self.is_alive() {
            warn!("이미 {}에 연결되어 있습니다", self.target);
            return Ok(());
        }

        let missing = self.callbacks.missing();
        if !missing.is_empty() {
            return Err(SocketError::Configuration { missing });
        }

        let pending = self.pending.lock().take();
        let stream = match pending {
            Some(stream) => stream,
            None => self.dial().await?,
        };

        let connection = Arc::new(Connection::new(stream)?);
        connection.set_callbacks(self.callbacks.clone());
        connection.connect()?;

        info!("✅ {}에 연결되었습니다", connection.remote_address());
        *self.connection.lock() = Some(connection);
        Ok(())
    }

    async fn dial(&self) -> SocketResult<TcpStream> {
        let connect = TcpStream::connect(self.target.as_str());
        let result = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| SocketError::timeout(self.target.clone(), "connect", timeout))?,
            None => connect.await,
        };

        result.map_err(|e| SocketError::io(self.target.clone(), "connect", e))
    }

    fn current(&self) -> Option<Arc<Connection>> {
        self.connection.lock().clone()
    }

    /// 서버로 바이트를 보냅니다.
    pub async fn send(&self, data: &[u8]) -> SocketResult<()> {
        let connection = self
            .current()
            .ok_or_else(|| SocketError::not_connected(self.target.clone(), "send"))?;
        connection.send(data).await
    }

    pub async fn send_timeout(&self, data: &[u8], timeout: Duration) -> SocketResult<()> {
        let connection = self
            .current()
            .ok_or_else(|| SocketError::not_connected(self.target.clone(), "send"))?;
        connection.send_timeout(data, timeout).await
    }

    /// 연결을 닫습니다. 연결된 적이 없거나 이미 닫혀 있으면 아무것도 하지 않습니다.
    pub async fn close(&self) -> SocketResult<()> {
        match self.current() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current()
            .map(|connection| connection.is_alive())
            .unwrap_or(false)
    }

    /// 다이얼 대상 주소
    pub fn target(&self) -> &str {
        &self.target
    }

    /// 마지막으로 연결된 전송 계층의 식별자
    pub fn peer(&self) -> Option<PeerHandle> {
        self.current().map(|connection| connection.peer())
    }
}
