//! 연결 서비스
//!
//! 하나의 TCP 스트림을 감싸 송신, 수신 루프, 해제를 담당합니다.
//!
//! 수신 루프는 연결마다 하나의 태스크에서만 돌기 때문에 한 연결에서 들어온
//! 바이트는 도착 순서대로 `on_receive`에 전달됩니다. 바이트 단위로 전달하므로
//! 메시지 경계가 필요하면 콜백 쪽에서 직접 모아야 합니다
//! ([`LineBuffer`](crate::tool::LineBuffer) 참고).

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::callback::{ConnectionCallbacks, OnReceive, PeerHandle, ResolvedCallbacks};
use crate::tool::error::{ErrorHandler, ErrorSeverity, SocketError, SocketResult};

const READ_BUFFER_SIZE: usize = 4096;
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// 피어가 사라졌음을 뜻하는 I/O 에러인지 판별합니다.
///
/// 이 경우 수신 루프는 연결을 닫고, 그 외 에러는 로그만 남기고 계속 읽습니다.
pub(crate) fn is_connection_lost(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}

/// 살아있는 TCP 연결 하나
///
/// 수신 루프와 `close()`는 서로 다른 태스크에서 실행될 수 있으며,
/// `close()`는 몇 번 호출되든 `on_disconnect`를 정확히 한 번만 호출합니다.
pub struct Connection {
    peer: PeerHandle,
    remote_address: String,
    alive: AtomicBool,
    callbacks: Mutex<ConnectionCallbacks>,
    active: OnceLock<ResolvedCallbacks>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: AsyncMutex<Option<BufWriter<OwnedWriteHalf>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Connection {
    /// 이미 연결된 스트림으로 연결 객체를 만듭니다. 수신 루프는 `connect()`에서 시작됩니다.
    pub fn new(stream: TcpStream) -> SocketResult<Self> {
        let peer = PeerHandle::from_stream(&stream)
            .map_err(|e| SocketError::io("unknown", "peer_addr", e))?;
        let (reader, writer) = stream.into_split();
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            peer,
            remote_address: peer.remote_address(),
            alive: AtomicBool::new(false),
            callbacks: Mutex::new(ConnectionCallbacks::default()),
            active: OnceLock::new(),
            reader: Mutex::new(Some(reader)),
            writer: AsyncMutex::new(Some(BufWriter::new(writer))),
            shutdown_tx,
        })
    }

    /// 콜백을 설정합니다. `connect()` 이후에는 바꿀 수 없습니다.
    pub fn set_callbacks(&self, callbacks: ConnectionCallbacks) {
        if self.active.get().is_some() {
            warn!(peer = %self.remote_address, "연결 이후에는 콜백을 바꿀 수 없습니다");
            return;
        }
        *self.callbacks.lock() = callbacks;
    }

    /// 수신 루프를 시작합니다.
    ///
    /// `on_receive`와 `on_disconnect`가 모두 설정되어 있어야 하며, 빠진 콜백이 있으면
    /// 이름을 담은 `SocketError::Configuration`을 돌려줍니다. 루프는 별도 태스크에서
    /// 돌기 때문에 바로 반환됩니다. tokio 런타임 안에서 호출해야 합니다.
    pub fn connect(self: &Arc<Self>) -> SocketResult<()> {
        if self.is_alive() {
            warn!(peer = %self.remote_address, "이미 연결되어 있습니다");
            return Ok(());
        }

        let resolved = self.callbacks.lock().resolve()?;
        let reader = self
            .reader
            .lock()
            .take()
            .ok_or_else(|| SocketError::not_connected(self.remote_address.clone(), "connect"))?;

        let on_receive = resolved.on_receive.clone();
        // connect()는 수신 절반을 가져간 한 번만 여기까지 오므로 set은 실패하지 않습니다.
        let _ = self.active.set(resolved);
        self.alive.store(true, Ordering::SeqCst);

        let shutdown_rx = self.shutdown_tx.subscribe();
        let connection = Arc::clone(self);
        tokio::spawn(async move {
            connection.read_loop(reader, on_receive, shutdown_rx).await;
        });

        debug!(peer = %self.remote_address, "연결 수신 루프 시작");
        Ok(())
    }

    async fn read_loop(
        self: Arc<Self>,
        mut reader: OwnedReadHalf,
        on_receive: Arc<dyn OnReceive>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut buffer = [0u8; READ_BUFFER_SIZE];

        while self.is_alive() {
            let result = tokio::select! {
                _ = shutdown_rx.changed() => break,
                result = reader.read(&mut buffer) => result,
            };

            match result {
                Ok(0) => {
                    debug!(peer = %self.remote_address, "원격 측이 스트림을 종료했습니다");
                    self.close_from_reader().await;
                    break;
                }
                Ok(read) => {
                    for &byte in &buffer[..read] {
                        if !self.is_alive() {
                            break;
                        }
                        on_receive.on_receive(byte, &self.remote_address);
                    }
                }
                Err(e) if is_connection_lost(&e) => {
                    debug!(peer = %self.remote_address, error = %e, "연결이 끊어졌습니다");
                    self.close_from_reader().await;
                    break;
                }
                Err(e) => {
                    let error = SocketError::io(self.remote_address.clone(), "read", e);
                    ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "Connection", "read_loop");
                    tokio::time::sleep(READ_ERROR_BACKOFF).await;
                }
            }
        }

        debug!(peer = %self.remote_address, "연결 수신 루프 종료");
    }

    async fn close_from_reader(&self) {
        if let Err(e) = self.close().await {
            ErrorHandler::handle_error(&e, ErrorSeverity::Info, "Connection", "close_from_reader");
        }
    }

    /// 바이트를 그대로 쓰고 flush합니다.
    ///
    /// 내부 버퍼링이나 백프레셔는 없으며, 전송 계층의 쓰기가 막히는 동안 함께 기다립니다.
    pub async fn send(&self, data: &[u8]) -> SocketResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = match guard.as_mut() {
            Some(writer) if self.is_alive() => writer,
            _ => return Err(SocketError::not_connected(self.remote_address.clone(), "send")),
        };

        writer
            .write_all(data)
            .await
            .map_err(|e| SocketError::io(self.remote_address.clone(), "send", e))?;
        writer
            .flush()
            .await
            .map_err(|e| SocketError::io(self.remote_address.clone(), "send", e))?;

        debug!(peer = %self.remote_address, bytes = data.len(), "데이터 전송");
        Ok(())
    }

    /// `send`에 데드라인을 둡니다. 시간이 지나면 `SocketError::Timeout`을 돌려주며,
    /// 이때 데이터 일부는 이미 전송되었을 수 있습니다.
    pub async fn send_timeout(&self, data: &[u8], timeout: Duration) -> SocketResult<()> {
        match tokio::time::timeout(timeout, self.send(data)).await {
            Ok(result) => result,
            Err(_) => Err(SocketError::timeout(self.remote_address.clone(), "send", timeout)),
        }
    }

    /// 연결을 닫습니다. 이미 닫혀 있으면 아무것도 하지 않습니다.
    ///
    /// 살아있는 상태를 먼저 내린 뒤 `on_disconnect`를 한 번 호출하고, 수신 루프와
    /// 송신 절반을 정리합니다. 정리 중 첫 번째 에러를 돌려주되 나머지 정리는 계속합니다.
    pub async fn close(&self) -> SocketResult<()> {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(callbacks) = self.active.get() {
            callbacks.on_disconnect.on_disconnect(&self.peer);
        }

        let mut first_error = None;

        self.shutdown_tx.send_replace(true);
        drop(self.reader.lock().take());

        // BufWriter의 shutdown은 남은 버퍼를 flush하므로 읽지 않는 피어 앞에서 멈출 수 있습니다.
        // send가 매번 flush하므로 남은 바이트는 실패한 전송의 잔여분뿐이라 버립니다.
        let writer = self.writer.lock().await.take();
        if let Some(writer) = writer {
            let mut write_half = writer.into_inner();
            if let Err(e) = write_half.shutdown().await {
                // 피어가 먼저 끊은 경우는 이미 해제된 것으로 봅니다.
                if !is_connection_lost(&e) {
                    first_error = Some(SocketError::io(self.remote_address.clone(), "close", e));
                }
            }
        }

        info!(peer = %self.remote_address, "연결 해제 완료");
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// 현재 살아있는지 여부. 읽은 직후에 바뀔 수 있는 힌트일 뿐입니다.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn peer(&self) -> PeerHandle {
        self.peer
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("alive", &self.is_alive())
            .finish()
    }
}
