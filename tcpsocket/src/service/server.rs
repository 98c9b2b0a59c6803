//! 소켓 서버
//!
//! 리스닝 소켓, accept 루프, 연결 레지스트리를 소유합니다.
//!
//! accept 루프는 별도 태스크에서 돌며 새 스트림마다 [`Connection`]을 만들어
//! 수신 루프를 시작하고 레지스트리에 등록한 뒤 `on_new_connection`을 호출합니다.
//! 전송은 어느 태스크에서든 `send`/`send_all`로 할 수 있고, 전송에 실패한 연결은
//! 닫힌 뒤 레지스트리에서 정리됩니다.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::callback::{ConnectionCallbacks, PeerHandle, ResolvedServerCallbacks, ServerCallbacks};
use crate::service::connection::Connection;
use crate::service::registry::ConnectionRegistry;
use crate::tool::error::{ErrorHandler, ErrorSeverity, SocketError, SocketResult};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);
const DEFAULT_HOST: &str = "0.0.0.0";

/// `send_all` 한 번의 결과
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// 스냅샷에 있던 연결 수
    pub attempted: usize,
    /// 전송에 성공한 연결 수
    pub delivered: usize,
    /// 실패한 연결의 주소와 에러. 이 연결들은 이미 닫히고 레지스트리에서 빠졌습니다.
    pub failed: Vec<(String, SocketError)>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// 실패한 연결 주소 목록
    pub fn failed_addresses(&self) -> Vec<&str> {
        self.failed.iter().map(|(address, _)| address.as_str()).collect()
    }
}

/// 실행 중인 accept 루프
struct AcceptTask {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// TCP 소켓 서버
///
/// # Examples
///
/// ```rust,no_run
/// use tcpsocket::{ServerCallbacks, SocketServer};
///
/// # async fn run() -> tcpsocket::SocketResult<()> {
/// let server = SocketServer::new(5533).with_callbacks(
///     ServerCallbacks::new()
///         .on_receive(|byte, addr| println!("{} -> {}", addr, byte))
///         .on_new_connection(|peer| println!("연결: {}", peer))
///         .on_disconnect(|peer| println!("해제: {}", peer)),
/// );
///
/// server.start().await?;
/// server.send_all(b"hello\n").await;
/// server.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SocketServer {
    host: String,
    port: u16,
    callbacks: ServerCallbacks,
    send_timeout: Option<Duration>,
    registry: Arc<ConnectionRegistry>,
    alive: Arc<AtomicBool>,
    accept_task: Mutex<Option<AcceptTask>>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
}

impl SocketServer {
    /// 모든 인터페이스의 `port`에서 수신할 서버를 만듭니다. 리스너는 `start()`에서 바인드됩니다.
    pub fn new(port: u16) -> Self {
        Self::bind(DEFAULT_HOST, port)
    }

    /// 특정 호스트 주소에 바인드할 서버를 만듭니다. 포트 0이면 OS가 포트를 고릅니다.
    pub fn bind(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            callbacks: ServerCallbacks::default(),
            send_timeout: None,
            registry: Arc::new(ConnectionRegistry::new()),
            alive: Arc::new(AtomicBool::new(false)),
            accept_task: Mutex::new(None),
            local_addr: parking_lot::Mutex::new(None),
        }
    }

    pub fn with_callbacks(mut self, callbacks: ServerCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// 콜백을 설정합니다. `start()` 전에 호출해야 합니다.
    pub fn set_callbacks(&mut self, callbacks: ServerCallbacks) {
        self.callbacks = callbacks;
    }

    /// 수신자별 쓰기에 데드라인을 둡니다. 초과하면 실패한 전송으로 처리됩니다.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// 리스너를 바인드하고 accept 루프를 시작합니다.
    ///
    /// 세 콜백이 모두 설정되어 있지 않으면 바인드하지 않고
    /// `SocketError::Configuration`을, 포트를 쓸 수 없으면 `SocketError::Bind`를 돌려줍니다.
    pub async fn start(&self) -> SocketResult<()> {
        let mut accept_task = self.accept_task.lock().await;
        if accept_task.is_some() {
            warn!("소켓 서버가 이미 실행 중입니다");
            return Ok(());
        }

        let callbacks = self.callbacks.resolve()?;

        let bind_addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|source| SocketError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| SocketError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;

        self.alive.store(true, Ordering::SeqCst);
        *self.local_addr.lock() = Some(local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let acceptor = Acceptor::new(self.registry.clone(), callbacks);
        let handle = tokio::spawn(acceptor.run(listener, local_addr, shutdown_rx));

        *accept_task = Some(AcceptTask {
            local_addr,
            shutdown_tx,
            handle,
        });

        info!("✅ 소켓 서버가 {}에서 실행 중입니다", local_addr);
        Ok(())
    }

    /// 특정 연결로 데이터를 보냅니다.
    ///
    /// 레지스트리에 없으면 `UnknownRecipient`, 이미 끊어졌으면 항목을 정리한 뒤
    /// `DeadConnection`을 돌려줍니다. 전송이 실패하거나 데드라인을 넘기면 연결을 닫고 항목을
    /// 정리한 뒤 그 에러를 돌려줍니다.
    pub async fn send(&self, recipient: &str, data: &[u8]) -> SocketResult<()> {
        let connection = self
            .registry
            .get(recipient)
            .ok_or_else(|| SocketError::UnknownRecipient {
                recipient: recipient.to_string(),
            })?;

        self.deliver(recipient, &connection, data).await
    }

    /// 등록된 모든 연결로 데이터를 보내고 결과를 돌려줍니다.
    ///
    /// 호출 시점의 레지스트리 스냅샷을 순회하므로 순회 중 연결이 추가되거나 제거되어도
    /// 영향이 없고, 한 호출에서 같은 연결로 두 번 보내지 않습니다. 실패한 연결은
    /// `send`와 같은 방식으로 정리되고 주소와 에러가 [`BroadcastReport::failed`]에 남습니다.
    pub async fn send_all(&self, data: &[u8]) -> BroadcastReport {
        let snapshot = self.registry.snapshot();
        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..BroadcastReport::default()
        };

        for (recipient, connection) in &snapshot {
            match self.deliver(recipient, connection, data).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    ErrorHandler::handle_error(&e, ErrorSeverity::Warning, "SocketServer", "send_all");
                    report.failed.push((recipient.clone(), e));
                }
            }
        }

        debug!(
            "브로드캐스트 완료: {}/{} 성공",
            report.delivered, report.attempted
        );
        report
    }

    async fn deliver(
        &self,
        recipient: &str,
        connection: &Arc<Connection>,
        data: &[u8],
    ) -> SocketResult<()> {
        if !connection.is_alive() {
            if let Err(e) = connection.close().await {
                ErrorHandler::handle_error(&e, ErrorSeverity::Info, "SocketServer", "deliver");
            }
            self.registry.remove_if_same(recipient, connection);
            return Err(SocketError::DeadConnection {
                recipient: recipient.to_string(),
            });
        }

        let result = match self.send_timeout {
            Some(timeout) => connection.send_timeout(data, timeout).await,
            None => connection.send(data).await,
        };

        if result.is_err() {
            // 읽지 않는 피어는 수신 루프가 감지하지 못하므로 여기서 닫습니다.
            if let Err(e) = connection.close().await {
                ErrorHandler::handle_error(&e, ErrorSeverity::Info, "SocketServer", "deliver");
            }
            if self.registry.remove_if_same(recipient, connection) {
                debug!(peer = %recipient, "전송 실패로 레지스트리에서 제거");
            }
        }
        result
    }

    /// 연결을 레지스트리에서 빼고 닫습니다.
    pub async fn disconnect(&self, target: &str) -> SocketResult<()> {
        let connection = self
            .registry
            .remove(target)
            .ok_or_else(|| SocketError::UnknownRecipient {
                recipient: target.to_string(),
            })?;

        connection.close().await
    }

    /// `close()` 후 다시 `start()` 합니다. 기존 연결은 모두 끊어집니다.
    pub async fn reset(&self) -> SocketResult<()> {
        self.close().await?;
        self.start().await
    }

    /// 서버를 멈춥니다.
    ///
    /// accept 루프를 멈춰 리스너를 닫은 뒤 등록된 모든 연결을 닫고 레지스트리를 비웁니다.
    /// 연결을 닫다가 난 첫 번째 에러를 돌려주되 나머지 연결도 모두 닫습니다.
    pub async fn close(&self) -> SocketResult<()> {
        let mut accept_task = self.accept_task.lock().await;
        self.alive.store(false, Ordering::SeqCst);

        let Some(task) = accept_task.take() else {
            debug!("소켓 서버가 이미 중지되어 있습니다");
            return Ok(());
        };

        info!("🛑 소켓 서버 중지 중... ({})", task.local_addr);
        task.shutdown_tx.send_replace(true);
        if let Err(e) = task.handle.await {
            warn!("accept 루프 종료 대기 실패: {}", e);
        }

        let mut first_error = None;
        let connections = self.registry.drain();
        let count = connections.len();
        for connection in connections {
            if let Err(e) = connection.close().await {
                ErrorHandler::handle_error(&e, ErrorSeverity::Warning, "SocketServer", "close");
                first_error.get_or_insert(e);
            }
        }

        *self.local_addr.lock() = None;
        info!("✅ 소켓 서버 중지 완료 (연결 {}개 해제)", count);

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// 바인드된 주소. 실행 중이 아니면 `None`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// 현재 등록된 연결 주소 목록 (순서 보장 없음)
    pub fn connections(&self) -> Vec<String> {
        self.registry.addresses()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.registry.contains(address)
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        // 리스너만 닫습니다. 수락된 연결은 피어가 끊을 때까지 남습니다.
        if let Some(task) = self.accept_task.get_mut().take() {
            task.shutdown_tx.send_replace(true);
        }
    }
}

/// accept 루프 태스크가 소유하는 상태
struct Acceptor {
    registry: Arc<ConnectionRegistry>,
    callbacks: ResolvedServerCallbacks,
    connection_callbacks: ConnectionCallbacks,
}

impl Acceptor {
    fn new(registry: Arc<ConnectionRegistry>, callbacks: ResolvedServerCallbacks) -> Self {
        // 끊어진 연결은 사용자 콜백 전에 레지스트리에서 정리합니다.
        let weak_registry = Arc::downgrade(&registry);
        let on_disconnect = callbacks.on_disconnect.clone();
        let connection_callbacks = ConnectionCallbacks::new()
            .receive_handler(callbacks.on_receive.clone())
            .on_disconnect(move |peer: &PeerHandle| {
                if let Some(registry) = weak_registry.upgrade() {
                    registry.prune_dead(&peer.remote_address());
                }
                on_disconnect.on_disconnect(peer);
            });

        Self {
            registry,
            callbacks,
            connection_callbacks,
        }
    }

    async fn run(
        self,
        listener: TcpListener,
        local_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.register(stream, addr),
                    Err(e) => {
                        let error = SocketError::io(local_addr.to_string(), "accept", e);
                        ErrorHandler::handle_error(&error, ErrorSeverity::Error, "SocketServer", "accept_loop");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        info!("accept 루프 종료 ({})", local_addr);
    }

    fn register(&self, stream: TcpStream, addr: SocketAddr) {
        let connection = match Connection::new(stream) {
            Ok(connection) => Arc::new(connection),
            Err(e) => {
                ErrorHandler::handle_error(&e, ErrorSeverity::Warning, "SocketServer", "register");
                return;
            }
        };

        connection.set_callbacks(self.connection_callbacks.clone());
        if let Err(e) = connection.connect() {
            ErrorHandler::handle_error(&e, ErrorSeverity::Error, "SocketServer", "register");
            return;
        }

        let address = connection.remote_address().to_string();
        if let Some(previous) = self.registry.insert(connection.clone()) {
            warn!(peer = %address, alive = previous.is_alive(), "같은 주소의 이전 연결을 대체합니다");
        }
        // 등록 전에 피어가 이미 끊었다면 해제 콜백의 정리가 항목을 놓쳤을 수 있습니다.
        if !connection.is_alive() {
            self.registry.remove_if_same(&address, &connection);
        }

        info!("새 클라이언트 연결: {}", addr);
        self.callbacks
            .on_new_connection
            .on_new_connection(&connection.peer());
    }
}
