//! 연결 레지스트리
//!
//! 원격 주소 문자열을 키로 서버가 수락한 연결을 보관합니다. accept 루프(추가),
//! 전송 실패 처리(정리), `disconnect`/`close`(제거)가 동시에 접근하므로 DashMap
//! 샤드 락으로 동기화하며, 호출자는 맵 내부 참조를 await 너머로 들고 있지 않습니다.
//!
//! 레지스트리는 연결 상태와 최종적으로만 일치합니다. 끊어진 연결의 항목은 다음 전송
//! 실패, 명시적 해제, 또는 해제 콜백에서의 정리 때까지 남아 있을 수 있습니다.

use std::sync::Arc;

use dashmap::DashMap;

use crate::service::connection::Connection;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 연결의 원격 주소로 등록합니다. 같은 주소의 이전 항목이 있으면 돌려줍니다.
    pub fn insert(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        self.connections
            .insert(connection.remote_address().to_string(), connection)
    }

    pub fn get(&self, address: &str) -> Option<Arc<Connection>> {
        self.connections
            .get(address)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, address: &str) -> Option<Arc<Connection>> {
        self.connections
            .remove(address)
            .map(|(_, connection)| connection)
    }

    /// 항목이 여전히 `connection`을 가리킬 때만 제거합니다.
    pub fn remove_if_same(&self, address: &str, connection: &Arc<Connection>) -> bool {
        self.connections
            .remove_if(address, |_, current| Arc::ptr_eq(current, connection))
            .is_some()
    }

    /// 항목이 끊어진 연결일 때만 제거합니다.
    pub fn prune_dead(&self, address: &str) -> bool {
        self.connections
            .remove_if(address, |_, current| !current.is_alive())
            .is_some()
    }

    /// 현재 항목의 불변 복사본
    ///
    /// 샤드 락은 복사하는 동안만 잡히므로 순회 중에도 accept 루프가 막히지 않습니다.
    pub fn snapshot(&self) -> Vec<(String, Arc<Connection>)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// 모든 항목을 꺼내 비웁니다.
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        self.snapshot()
            .into_iter()
            .filter(|(address, connection)| self.remove_if_same(address, connection))
            .map(|(_, connection)| connection)
            .collect()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.connections.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
