//! 콜백 계약
//!
//! 소켓 계층이 호출하는 세 가지 훅과, 훅에 넘겨지는 전송 계층 식별자를 정의합니다.
//!
//! 콜백은 이벤트를 감지한 태스크에서 동기적으로 호출됩니다. 오래 블로킹하면
//! 해당 연결의 리더 루프(`on_receive`, `on_disconnect`) 또는 서버의 accept
//! 루프(`on_new_connection`)가 그동안 멈춥니다.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::tool::error::{SocketError, SocketResult};

pub const ON_RECEIVE: &str = "on_receive";
pub const ON_NEW_CONNECTION: &str = "on_new_connection";
pub const ON_DISCONNECT: &str = "on_disconnect";

/// 연결된 전송 계층의 식별자
///
/// 연결이 살아있는 동안 `remote_address()`는 변하지 않으며 서버 레지스트리의 키로 쓰입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerHandle {
    remote: SocketAddr,
    local: SocketAddr,
}

impl PeerHandle {
    pub fn new(remote: SocketAddr, local: SocketAddr) -> Self {
        Self { remote, local }
    }

    /// 연결된 스트림에서 양 끝 주소를 읽습니다.
    pub fn from_stream(stream: &TcpStream) -> io::Result<Self> {
        Ok(Self::new(stream.peer_addr()?, stream.local_addr()?))
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// `host:port` 형태의 원격 주소 문자열
    pub fn remote_address(&self) -> String {
        self.remote.to_string()
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.remote)
    }
}

/// 바이트 수신 훅. 인자는 (수신 바이트, 원격 주소)
pub trait OnReceive: Send + Sync + 'static {
    fn on_receive(&self, byte: u8, remote_address: &str);
}

/// 새 연결 수락 훅 (서버 전용)
pub trait OnNewConnection: Send + Sync + 'static {
    fn on_new_connection(&self, peer: &PeerHandle);
}

/// 연결 해제 훅. 연결마다 정확히 한 번 호출됩니다.
pub trait OnDisconnect: Send + Sync + 'static {
    fn on_disconnect(&self, peer: &PeerHandle);
}

impl<F> OnReceive for F
where
    F: Fn(u8, &str) + Send + Sync + 'static,
{
    fn on_receive(&self, byte: u8, remote_address: &str) {
        self(byte, remote_address)
    }
}

impl<F> OnNewConnection for F
where
    F: Fn(&PeerHandle) + Send + Sync + 'static,
{
    fn on_new_connection(&self, peer: &PeerHandle) {
        self(peer)
    }
}

impl<F> OnDisconnect for F
where
    F: Fn(&PeerHandle) + Send + Sync + 'static,
{
    fn on_disconnect(&self, peer: &PeerHandle) {
        self(peer)
    }
}

/// 단일 연결(클라이언트 또는 서버가 수락한 연결)의 콜백 묶음
///
/// # Examples
///
/// ```rust
/// use tcpsocket::ConnectionCallbacks;
///
/// let callbacks = ConnectionCallbacks::new()
///     .on_receive(|byte, addr| println!("{} -> {}", addr, byte))
///     .on_disconnect(|peer| println!("끊김: {}", peer));
/// assert!(callbacks.missing().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct ConnectionCallbacks {
    on_receive: Option<Arc<dyn OnReceive>>,
    on_disconnect: Option<Arc<dyn OnDisconnect>>,
}

impl ConnectionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_receive<F>(mut self, handler: F) -> Self
    where
        F: Fn(u8, &str) + Send + Sync + 'static,
    {
        self.on_receive = Some(Arc::new(handler));
        self
    }

    pub fn on_disconnect<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PeerHandle) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(handler));
        self
    }

    /// 클로저 대신 `OnReceive`를 구현한 타입을 등록합니다.
    pub fn receive_handler(mut self, handler: Arc<dyn OnReceive>) -> Self {
        self.on_receive = Some(handler);
        self
    }

    pub fn disconnect_handler(mut self, handler: Arc<dyn OnDisconnect>) -> Self {
        self.on_disconnect = Some(handler);
        self
    }

    /// 설정되지 않은 콜백 이름 목록
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.on_receive.is_none() {
            missing.push(ON_RECEIVE);
        }
        if self.on_disconnect.is_none() {
            missing.push(ON_DISCONNECT);
        }
        missing
    }

    /// 모든 콜백이 있으면 고정된 묶음을 돌려줍니다.
    pub(crate) fn resolve(&self) -> SocketResult<ResolvedCallbacks> {
        match (&self.on_receive, &self.on_disconnect) {
            (Some(on_receive), Some(on_disconnect)) => Ok(ResolvedCallbacks {
                on_receive: on_receive.clone(),
                on_disconnect: on_disconnect.clone(),
            }),
            _ => Err(SocketError::Configuration {
                missing: self.missing(),
            }),
        }
    }
}

impl fmt::Debug for ConnectionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCallbacks")
            .field(ON_RECEIVE, &self.on_receive.is_some())
            .field(ON_DISCONNECT, &self.on_disconnect.is_some())
            .finish()
    }
}

/// `connect()` 이후 변하지 않는 콜백
#[derive(Clone)]
pub(crate) struct ResolvedCallbacks {
    pub(crate) on_receive: Arc<dyn OnReceive>,
    pub(crate) on_disconnect: Arc<dyn OnDisconnect>,
}

/// 서버 콜백 묶음. 서버가 수락한 모든 연결이 공유합니다.
#[derive(Clone, Default)]
pub struct ServerCallbacks {
    on_receive: Option<Arc<dyn OnReceive>>,
    on_new_connection: Option<Arc<dyn OnNewConnection>>,
    on_disconnect: Option<Arc<dyn OnDisconnect>>,
}

impl ServerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_receive<F>(mut self, handler: F) -> Self
    where
        F: Fn(u8, &str) + Send + Sync + 'static,
    {
        self.on_receive = Some(Arc::new(handler));
        self
    }

    pub fn on_new_connection<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PeerHandle) + Send + Sync + 'static,
    {
        self.on_new_connection = Some(Arc::new(handler));
        self
    }

    pub fn on_disconnect<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PeerHandle) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(handler));
        self
    }

    pub fn receive_handler(mut self, handler: Arc<dyn OnReceive>) -> Self {
        self.on_receive = Some(handler);
        self
    }

    pub fn new_connection_handler(mut self, handler: Arc<dyn OnNewConnection>) -> Self {
        self.on_new_connection = Some(handler);
        self
    }

    pub fn disconnect_handler(mut self, handler: Arc<dyn OnDisconnect>) -> Self {
        self.on_disconnect = Some(handler);
        self
    }

    /// 설정되지 않은 콜백 이름 목록
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.on_receive.is_none() {
            missing.push(ON_RECEIVE);
        }
        if self.on_new_connection.is_none() {
            missing.push(ON_NEW_CONNECTION);
        }
        if self.on_disconnect.is_none() {
            missing.push(ON_DISCONNECT);
        }
        missing
    }

    pub(crate) fn resolve(&self) -> SocketResult<ResolvedServerCallbacks> {
        match (&self.on_receive, &self.on_new_connection, &self.on_disconnect) {
            (Some(on_receive), Some(on_new_connection), Some(on_disconnect)) => {
                Ok(ResolvedServerCallbacks {
                    on_receive: on_receive.clone(),
                    on_new_connection: on_new_connection.clone(),
                    on_disconnect: on_disconnect.clone(),
                })
            }
            _ => Err(SocketError::Configuration {
                missing: self.missing(),
            }),
        }
    }
}

impl fmt::Debug for ServerCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCallbacks")
            .field(ON_RECEIVE, &self.on_receive.is_some())
            .field(ON_NEW_CONNECTION, &self.on_new_connection.is_some())
            .field(ON_DISCONNECT, &self.on_disconnect.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct ResolvedServerCallbacks {
    pub(crate) on_receive: Arc<dyn OnReceive>,
    pub(crate) on_new_connection: Arc<dyn OnNewConnection>,
    pub(crate) on_disconnect: Arc<dyn OnDisconnect>,
}
