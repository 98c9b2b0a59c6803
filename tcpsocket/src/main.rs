//! TCP 소켓 릴레이
//!
//! - `socket_mode=server`: 연결을 받아 stdin의 각 줄을 모든 연결에 브로드캐스트하고,
//!   받은 줄을 `<주소> SAYS: <줄>` 형태로 출력합니다.
//! - `socket_mode=client`: 서버에 연결해 stdin의 각 줄을 전송하고, 받은 줄을
//!   `CLIENT RECEIVED: <줄>` 형태로 출력합니다.
//!
//! 서버 모드도 기본으로는 루프백(`127.0.0.1`)에만 바인드합니다. 다른 호스트에서
//! 접속을 받으려면 `tcp_host=0.0.0.0`을 지정하세요.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use tcpsocket::{
    validate_config, ConnectionCallbacks, LineAssembler, LineBuffer, ServerCallbacks,
    SocketClient, SocketConfig, SocketMode, SocketServer,
};

/// 소켓 릴레이 메인 진입점
///
/// 환경변수:
/// - socket_mode: `server` 또는 `client` (기본값: "server")
/// - tcp_host: 바인드/대상 호스트 (기본값: "127.0.0.1", 모든 인터페이스는 "0.0.0.0")
/// - tcp_port: 포트 (기본값: "5533")
/// - connect_timeout_ms: 다이얼 데드라인, 0이면 없음
/// - send_timeout_ms: 수신자별 쓰기 데드라인, 0이면 없음
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = SocketConfig::from_env()?;
    validate_config(&config)?;

    info!("=== 소켓 릴레이 설정 ===");
    info!("모드: {:?}", config.mode);
    info!("주소: {}", config.address());
    info!("=======================");

    match config.mode {
        SocketMode::Server => run_server(&config).await,
        SocketMode::Client => run_client(&config).await,
    }
}

/// 로그는 stderr로 보내 stdout에는 릴레이 출력만 남깁니다.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_server(config: &SocketConfig) -> Result<()> {
    let assembler = Arc::new(LineAssembler::new());
    let receive_lines = Arc::clone(&assembler);
    let forget_lines = Arc::clone(&assembler);

    let callbacks = ServerCallbacks::new()
        .on_receive(move |byte, addr| {
            if let Some(line) = receive_lines.push(addr, byte) {
                println!("{} SAYS: {}", addr, line);
            }
        })
        .on_new_connection(|peer| println!("Connected to {}", peer))
        .on_disconnect(move |peer| {
            forget_lines.forget(&peer.remote_address());
            println!("Disconnected from {}", peer);
        });

    let mut server = SocketServer::bind(config.host.clone(), config.port).with_callbacks(callbacks);
    if let Some(timeout) = config.send_timeout() {
        server = server.with_send_timeout(timeout);
    }

    server.start().await.context("소켓 서버 시작 실패")?;
    println!("Started server on {}", config.address());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("stdin 읽기 실패")? {
                Some(line) => {
                    let report = server.send_all(format!("{}\n", line).as_bytes()).await;
                    if !report.is_complete() {
                        warn!("전송 실패: {:?}", report.failed_addresses());
                    }
                    debug!("{}/{}개 연결에 전송", report.delivered, report.attempted);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("종료 시그널 수신, 서버를 중지합니다...");
                break;
            }
        }
    }

    server.close().await.context("소켓 서버 중지 실패")?;
    Ok(())
}

async fn run_client(config: &SocketConfig) -> Result<()> {
    let buffer = Mutex::new(LineBuffer::new());

    let callbacks = ConnectionCallbacks::new()
        .on_receive(move |byte, _addr| {
            if let Some(line) = buffer.lock().push(byte) {
                println!("CLIENT RECEIVED: {}", line);
            }
        })
        .on_disconnect(|peer| println!("Disconnected from server {}", peer));

    let mut client = SocketClient::new(&config.host, config.port).with_callbacks(callbacks);
    if let Some(timeout) = config.connect_timeout() {
        client = client.with_connect_timeout(timeout);
    }

    client
        .connect()
        .await
        .with_context(|| format!("{} 연결 실패", config.address()))?;
    println!("Started client on {}", config.address());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("stdin 읽기 실패")? {
                Some(line) => {
                    let data = format!("{}\n", line);
                    let result = match config.send_timeout() {
                        Some(timeout) => client.send_timeout(data.as_bytes(), timeout).await,
                        None => client.send(data.as_bytes()).await,
                    };
                    if let Err(e) = result {
                        warn!("전송 실패: {}", e);
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("종료 시그널 수신, 연결을 닫습니다...");
                break;
            }
        }
    }

    client.close().await.context("연결 해제 실패")?;
    Ok(())
}
