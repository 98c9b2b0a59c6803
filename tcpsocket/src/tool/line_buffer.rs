//! 줄 단위 프레이밍 도우미
//!
//! 소켓 계층은 바이트를 하나씩 `on_receive`로 넘기기만 하므로, 메시지 경계가
//! 필요한 쪽에서 직접 바이트를 모아야 합니다. `LineBuffer`는 개행 문자로
//! 끝나는 줄을 조립하고, `LineAssembler`는 주소별로 버퍼를 분리해 둡니다.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

/// 개행 없이 모을 수 있는 최대 바이트 수
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// 개행 단위로 바이트를 모으는 버퍼
///
/// 개행 없이 `max_line_length`바이트가 쌓이면 그때까지의 바이트를 한 줄로 내보냅니다.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    max_line_length: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_length: max_line_length.max(1),
        }
    }

    /// 바이트 하나를 추가하고, 줄이 완성되면 개행을 뺀 문자열을 돌려줍니다.
    ///
    /// `\r\n`의 `\r`도 제거하며, UTF-8이 아닌 바이트는 대체 문자로 바뀝니다.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte != b'\n' {
            self.buffer.push(byte);
            if self.buffer.len() >= self.max_line_length {
                debug!(length = self.buffer.len(), "최대 줄 길이 도달, 잘라서 내보냅니다");
                return Some(self.take_line());
            }
            return None;
        }

        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        Some(self.take_line())
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }

    /// 아직 개행을 만나지 못한 바이트 수
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// 원격 주소별 `LineBuffer` 모음
///
/// 여러 연결의 리더 태스크에서 동시에 호출되어도 안전합니다.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffers: Mutex<HashMap<String, LineBuffer>>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `remote_address`에서 온 바이트를 추가합니다.
    pub fn push(&self, remote_address: &str, byte: u8) -> Option<String> {
        let mut buffers = self.buffers.lock();
        buffers
            .entry(remote_address.to_string())
            .or_default()
            .push(byte)
    }

    /// 연결이 끊긴 주소의 미완성 줄을 버립니다.
    pub fn forget(&self, remote_address: &str) {
        self.buffers.lock().remove(remote_address);
    }
}
