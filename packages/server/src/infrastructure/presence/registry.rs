//! Presence Registry
//!
//! ## 責務
//!
//! - 接続中のコネクションの登録・登録解除
//! - ユーザー単位のオンライン状態（最初の接続でオンライン、最後の切断でオフライン）
//! - ユーザー宛て・全体へのノンブロッキング配信と、詰まったコネクションの切り離し
//! - 「誰がどのルームを見ているか」の問い合わせ
//!
//! ## 設計ノート
//!
//! 登録状態の変更はすべて 1 つの制御ループ（tokio タスク）に直列化されます。
//! ライブなコネクション集合は制御ループだけが所有し、ユーザー索引は制御ループが
//! 短時間だけロックを取って書き換えます。
//!
//! - 問い合わせ（`is_user_online` など）とユーザー宛て送信は索引のロックを短く取るだけで、
//!   制御ループを待ちません。
//! - 送信はすべて `try_send` です。キューが満杯のコネクションはその場でキューを閉じられ、
//!   登録解除が制御ループに依頼されます。

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::connection::{ConnectionHandle, SendError, lock};
use crate::domain::{ConnectionId, RoomId, UserId};
use crate::infrastructure::dto::websocket::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("presence registry is no longer running")]
    Closed,
}

enum Control {
    Register {
        connection: Arc<ConnectionHandle>,
        reply: oneshot::Sender<Vec<UserId>>,
    },
    Unregister {
        id: ConnectionId,
        reply: Option<oneshot::Sender<bool>>,
    },
    Broadcast(String),
    #[cfg(test)]
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Registry state as seen by the control loop, for consistency checks.
#[cfg(test)]
#[derive(Debug)]
struct Snapshot {
    live: std::collections::HashSet<ConnectionId>,
    index: HashMap<UserId, Vec<(UserId, ConnectionId)>>,
}

/// Connections grouped by user, readable from any task.
#[derive(Default)]
struct UserIndex {
    users: HashMap<UserId, Vec<Arc<ConnectionHandle>>>,
}

/// Cloneable handle to the presence hub.
#[derive(Clone)]
pub struct PresenceRegistry {
    control: mpsc::UnboundedSender<Control>,
    index: Arc<Mutex<UserIndex>>,
}

impl PresenceRegistry {
    /// Start the control loop on the current tokio runtime.
    ///
    /// The loop stops once every clone of the returned handle is dropped.
    pub fn spawn() -> Self {
        let (control, rx) = mpsc::unbounded_channel();
        let index = Arc::new(Mutex::new(UserIndex::default()));

        let control_loop = ControlLoop {
            live: HashMap::new(),
            index: index.clone(),
        };
        tokio::spawn(control_loop.run(rx));

        Self { control, index }
    }

    /// Admit a connection.
    ///
    /// Returns the other users online at admission time, sorted. When this is the user's
    /// first connection every other connection is told the user came online.
    pub async fn register(
        &self,
        connection: Arc<ConnectionHandle>,
    ) -> Result<Vec<UserId>, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(Control::Register { connection, reply })
            .map_err(|_| RegistryError::Closed)?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    /// Remove a connection. Safe to call more than once.
    ///
    /// Returns `false` when the connection was not registered.
    pub async fn unregister(&self, id: ConnectionId) -> Result<bool, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(Control::Unregister {
                id,
                reply: Some(reply),
            })
            .map_err(|_| RegistryError::Closed)?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    /// Queue a payload for every live connection.
    pub fn broadcast(&self, payload: String) -> Result<(), RegistryError> {
        self.control
            .send(Control::Broadcast(payload))
            .map_err(|_| RegistryError::Closed)
    }

    /// Enqueue a payload on every connection of `user_id` without blocking.
    ///
    /// Connections whose queue is full are closed and scheduled for removal.
    /// Returns the number of connections the payload was queued on; `0` when the user
    /// is offline.
    pub fn send_to_user(&self, user_id: UserId, payload: &str) -> usize {
        let connections = {
            let index = lock(&self.index);
            match index.users.get(&user_id) {
                Some(connections) => connections.clone(),
                None => return 0,
            }
        };

        connections
            .iter()
            .filter(|connection| self.deliver(connection, payload.to_string()))
            .count()
    }

    /// Enqueue a payload on one connection without blocking, with the same eviction
    /// policy as [`PresenceRegistry::send_to_user`].
    pub fn send_to_connection(&self, connection: &ConnectionHandle, payload: String) -> bool {
        self.deliver(connection, payload)
    }

    fn deliver(&self, connection: &ConnectionHandle, payload: String) -> bool {
        match connection.try_send(payload) {
            Ok(()) => true,
            Err(SendError::Full) => {
                tracing::warn!(
                    "Outbound queue full for user {} (connection {}), evicting",
                    connection.user_id(),
                    connection.id()
                );
                connection.close();
                let _ = self.control.send(Control::Unregister {
                    id: connection.id(),
                    reply: None,
                });
                false
            }
            Err(SendError::Closed) => {
                tracing::debug!("Connection {} is closing, skipping", connection.id());
                false
            }
        }
    }

    pub fn is_user_online(&self, user_id: UserId) -> bool {
        lock(&self.index).users.contains_key(&user_id)
    }

    /// Users with at least one connection, sorted.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = lock(&self.index).users.keys().copied().collect();
        users.sort_unstable();
        users
    }

    /// Whether any connection of `user_id` is currently viewing `room_id`.
    pub fn is_user_in_room(&self, user_id: UserId, room_id: RoomId) -> bool {
        lock(&self.index)
            .users
            .get(&user_id)
            .is_some_and(|connections| {
                connections
                    .iter()
                    .any(|c| c.active_room() == Some(room_id))
            })
    }

    /// Users with at least one connection viewing `room_id`, sorted.
    pub fn users_in_room(&self, room_id: RoomId) -> Vec<UserId> {
        let mut users: Vec<UserId> = lock(&self.index)
            .users
            .iter()
            .filter(|(_, connections)| {
                connections
                    .iter()
                    .any(|c| c.active_room() == Some(room_id))
            })
            .map(|(user_id, _)| *user_id)
            .collect();
        users.sort_unstable();
        users
    }

    /// Number of connections currently held by `user_id`.
    pub fn connection_count(&self, user_id: UserId) -> usize {
        lock(&self.index)
            .users
            .get(&user_id)
            .map_or(0, Vec::len)
    }
}

/// Single writer of the registry state.
struct ControlLoop {
    live: HashMap<ConnectionId, Arc<ConnectionHandle>>,
    index: Arc<Mutex<UserIndex>>,
}

impl ControlLoop {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Control>) {
        while let Some(control) = rx.recv().await {
            match control {
                Control::Register { connection, reply } => {
                    let others = self.register(connection);
                    let _ = reply.send(others);
                }
                Control::Unregister { id, reply } => {
                    let removed = self.unregister(id);
                    if let Some(reply) = reply {
                        let _ = reply.send(removed);
                    }
                }
                Control::Broadcast(payload) => self.broadcast(payload, None),
                #[cfg(test)]
                Control::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }
        tracing::debug!("Presence registry control loop stopped");
    }

    fn register(&mut self, connection: Arc<ConnectionHandle>) -> Vec<UserId> {
        let user_id = connection.user_id();
        let (first, mut others) = {
            let mut index = lock(&self.index);
            let connections = index.users.entry(user_id).or_default();
            let first = connections.is_empty();
            connections.push(connection.clone());
            let others: Vec<UserId> = index
                .users
                .keys()
                .copied()
                .filter(|id| *id != user_id)
                .collect();
            (first, others)
        };
        others.sort_unstable();
        self.live.insert(connection.id(), connection.clone());

        tracing::info!(
            "Connection {} registered for user {} (total connections: {})",
            connection.id(),
            user_id,
            self.live.len()
        );

        if first {
            self.broadcast_status(user_id, true);
        }
        others
    }

    fn unregister(&mut self, id: ConnectionId) -> bool {
        let Some((user_id, last)) = self.remove(id) else {
            return false;
        };
        if last {
            self.broadcast_status(user_id, false);
        }
        true
    }

    #[cfg(test)]
    fn snapshot(&self) -> Snapshot {
        let index = lock(&self.index);
        Snapshot {
            live: self.live.keys().copied().collect(),
            index: index
                .users
                .iter()
                .map(|(user_id, connections)| {
                    let entries = connections.iter().map(|c| (c.user_id(), c.id())).collect();
                    (*user_id, entries)
                })
                .collect(),
        }
    }

    /// Drop a connection from both the live set and the user index and close its queue.
    ///
    /// Returns the owning user and whether it was the user's last connection.
    fn remove(&mut self, id: ConnectionId) -> Option<(UserId, bool)> {
        let connection = self.live.remove(&id)?;
        connection.close();

        let user_id = connection.user_id();
        let last = {
            let mut index = lock(&self.index);
            match index.users.get_mut(&user_id) {
                Some(connections) => {
                    connections.retain(|c| c.id() != id);
                    if connections.is_empty() {
                        index.users.remove(&user_id);
                        true
                    } else {
                        false
                    }
                }
                None => true,
            }
        };

        tracing::info!(
            "Connection {} unregistered for user {} (total connections: {})",
            id,
            user_id,
            self.live.len()
        );
        Some((user_id, last))
    }

    fn broadcast_status(&mut self, user_id: UserId, is_online: bool) {
        let event = ServerEvent::UserStatus {
            user_id: user_id.value(),
            is_online,
        };
        match event.to_json() {
            Ok(payload) => self.broadcast(payload, Some(user_id)),
            Err(e) => tracing::error!("Failed to encode user_status: {}", e),
        }
    }

    /// Deliver to every live connection except those of `skip`.
    ///
    /// Saturated connections are evicted. An eviction that takes a user offline queues a
    /// further `user_status` broadcast, handled in the same pass.
    fn broadcast(&mut self, payload: String, skip: Option<UserId>) {
        let mut queue = VecDeque::from([(payload, skip)]);

        while let Some((payload, skip)) = queue.pop_front() {
            let mut evicted = Vec::new();
            for connection in self.live.values() {
                if Some(connection.user_id()) == skip {
                    continue;
                }
                match connection.try_send(payload.clone()) {
                    Ok(()) => {}
                    Err(SendError::Full) => evicted.push(connection.id()),
                    Err(SendError::Closed) => {}
                }
            }

            for id in evicted {
                tracing::warn!("Outbound queue full for connection {}, evicting", id);
                let Some((user_id, true)) = self.remove(id) else {
                    continue;
                };
                let event = ServerEvent::UserStatus {
                    user_id: user_id.value(),
                    is_online: false,
                };
                match event.to_json() {
                    Ok(payload) => queue.push_back((payload, Some(user_id))),
                    Err(e) => tracing::error!("Failed to encode user_status: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::time::timeout;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - register / unregister とオンライン状態の通知
    // - send_to_user とブロードキャスト
    // - キューが詰まったコネクションの切り離し
    // - ルーム閲覧状態の問い合わせ
    //
    // 【どのようなシナリオをテストするか】
    // 1. 新規接続は自分以外のオンラインユーザー一覧を受け取る
    // 2. 同一ユーザーの 2 本目の接続ではオンライン通知が重複しない
    // 3. 最後の接続が切れたときだけオフライン通知が出る
    // 4. unregister は冪等
    // 5. 満杯のキューを持つコネクションは閉じられ、オフライン通知が出る
    // 6. 登録・解除・切り離しを混ぜた操作列の後も、ライブ集合とユーザー索引が一致する
    // ========================================

    fn user(id: u64) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn recv_json(rx: &mut mpsc::Receiver<String>) -> Value {
        let payload = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("outbound queue closed");
        serde_json::from_str(&payload).unwrap()
    }

    #[tokio::test]
    async fn test_register_returns_other_online_users() {
        // テスト項目: 新規接続は自分以外のオンラインユーザー一覧を受け取る
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let (alice, _alice_rx) = ConnectionHandle::new(user(1), 8);
        let (carol, _carol_rx) = ConnectionHandle::new(user(3), 8);
        registry.register(alice).await.unwrap();
        registry.register(carol).await.unwrap();

        // when (操作):
        let (bob, _bob_rx) = ConnectionHandle::new(user(2), 8);
        let others = registry.register(bob).await.unwrap();

        // then (期待する結果):
        assert_eq!(others, vec![user(1), user(3)]);
        assert_eq!(registry.online_users(), vec![user(1), user(2), user(3)]);
    }

    #[tokio::test]
    async fn test_first_connection_announces_online_once() {
        // テスト項目: オンライン通知は最初の接続のときだけ他ユーザーに送られる
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let (alice, mut alice_rx) = ConnectionHandle::new(user(1), 8);
        registry.register(alice).await.unwrap();

        // when (操作):
        let (bob_phone, mut bob_phone_rx) = ConnectionHandle::new(user(2), 8);
        let (bob_laptop, _bob_laptop_rx) = ConnectionHandle::new(user(2), 8);
        registry.register(bob_phone).await.unwrap();
        registry.register(bob_laptop).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            recv_json(&mut alice_rx).await,
            json!({"type": "user_status", "user_id": 2, "is_online": true})
        );
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_phone_rx.try_recv().is_err());
        assert_eq!(registry.connection_count(user(2)), 2);
    }

    #[tokio::test]
    async fn test_offline_only_after_last_connection() {
        // テスト項目: オフライン通知は最後の接続が切れたときだけ送られる
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let (alice, mut alice_rx) = ConnectionHandle::new(user(1), 8);
        let (bob_phone, _bob_phone_rx) = ConnectionHandle::new(user(2), 8);
        let (bob_laptop, _bob_laptop_rx) = ConnectionHandle::new(user(2), 8);
        registry.register(alice).await.unwrap();
        registry.register(bob_phone.clone()).await.unwrap();
        registry.register(bob_laptop.clone()).await.unwrap();
        recv_json(&mut alice_rx).await; // online

        // when (操作):
        registry.unregister(bob_phone.id()).await.unwrap();
        let still_online = registry.is_user_online(user(2));
        registry.unregister(bob_laptop.id()).await.unwrap();

        // then (期待する結果):
        assert!(still_online);
        assert!(!registry.is_user_online(user(2)));
        assert_eq!(
            recv_json(&mut alice_rx).await,
            json!({"type": "user_status", "user_id": 2, "is_online": false})
        );
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        // テスト項目: 同じ接続の登録解除を繰り返しても問題ない
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let (alice, mut alice_rx) = ConnectionHandle::new(user(1), 8);
        let (bob, _bob_rx) = ConnectionHandle::new(user(2), 8);
        registry.register(alice).await.unwrap();
        registry.register(bob.clone()).await.unwrap();
        recv_json(&mut alice_rx).await; // online

        // when (操作):
        let first = registry.unregister(bob.id()).await.unwrap();
        let second = registry.unregister(bob.id()).await.unwrap();

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert!(bob.is_closed());
        recv_json(&mut alice_rx).await; // offline
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_user_reaches_every_connection() {
        // テスト項目: ユーザー宛ての送信はそのユーザーの全接続に届く
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let (phone, mut phone_rx) = ConnectionHandle::new(user(2), 8);
        let (laptop, mut laptop_rx) = ConnectionHandle::new(user(2), 8);
        registry.register(phone).await.unwrap();
        registry.register(laptop).await.unwrap();

        // when (操作):
        let delivered = registry.send_to_user(user(2), r#"{"type":"ping"}"#);
        let offline = registry.send_to_user(user(9), r#"{"type":"ping"}"#);

        // then (期待する結果):
        assert_eq!(delivered, 2);
        assert_eq!(offline, 0);
        assert_eq!(recv_json(&mut phone_rx).await, json!({"type": "ping"}));
        assert_eq!(recv_json(&mut laptop_rx).await, json!({"type": "ping"}));
    }

    #[tokio::test]
    async fn test_saturated_connection_is_evicted_on_send() {
        // テスト項目: キューが満杯の接続は閉じられ、他ユーザーにオフライン通知が届く
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let (alice, mut alice_rx) = ConnectionHandle::new(user(1), 8);
        let (bob, mut bob_rx) = ConnectionHandle::new(user(2), 1);
        registry.register(alice).await.unwrap();
        registry.register(bob.clone()).await.unwrap();
        recv_json(&mut alice_rx).await; // online
        assert_eq!(registry.send_to_user(user(2), "\"first\""), 1);

        // when (操作):
        let delivered = registry.send_to_user(user(2), "\"second\"");
        let removed_again = registry.unregister(bob.id()).await.unwrap();

        // then (期待する結果):
        assert_eq!(delivered, 0);
        assert!(!removed_again);
        assert!(bob.is_closed());
        assert!(!registry.is_user_online(user(2)));
        assert_eq!(bob_rx.recv().await.as_deref(), Some("\"first\""));
        assert_eq!(bob_rx.recv().await, None);
        assert_eq!(
            recv_json(&mut alice_rx).await,
            json!({"type": "user_status", "user_id": 2, "is_online": false})
        );
    }

    #[tokio::test]
    async fn test_broadcast_evicts_saturated_connection() {
        // テスト項目: ブロードキャスト中に満杯の接続が見つかると切り離される
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let (alice, mut alice_rx) = ConnectionHandle::new(user(1), 8);
        let (bob, mut bob_rx) = ConnectionHandle::new(user(2), 1);
        registry.register(alice).await.unwrap();
        registry.register(bob.clone()).await.unwrap();
        recv_json(&mut alice_rx).await; // online
        registry.send_to_user(user(2), "\"filler\"");

        // when (操作):
        registry.broadcast("\"news\"".to_string()).unwrap();

        // then (期待する結果):
        assert_eq!(recv_json(&mut alice_rx).await, json!("news"));
        assert_eq!(
            recv_json(&mut alice_rx).await,
            json!({"type": "user_status", "user_id": 2, "is_online": false})
        );
        assert_eq!(bob_rx.recv().await.as_deref(), Some("\"filler\""));
        assert_eq!(bob_rx.recv().await, None);
        assert!(!registry.is_user_online(user(2)));
    }

    #[tokio::test]
    async fn test_room_queries_follow_active_room() {
        // テスト項目: ルーム閲覧状態の問い合わせはアクティブルームを反映する
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let room = RoomId::new(5).unwrap();
        let other_room = RoomId::new(6).unwrap();
        let (alice, _alice_rx) = ConnectionHandle::new(user(1), 8);
        let (bob_phone, _bob_phone_rx) = ConnectionHandle::new(user(2), 8);
        let (bob_laptop, _bob_laptop_rx) = ConnectionHandle::new(user(2), 8);
        registry.register(alice.clone()).await.unwrap();
        registry.register(bob_phone.clone()).await.unwrap();
        registry.register(bob_laptop.clone()).await.unwrap();

        // when (操作):
        alice.set_active_room(Some(other_room));
        bob_laptop.set_active_room(Some(room));

        // then (期待する結果):
        assert!(registry.is_user_in_room(user(2), room));
        assert!(!registry.is_user_in_room(user(1), room));
        assert!(!registry.is_user_in_room(user(9), room));
        assert_eq!(registry.users_in_room(room), vec![user(2)]);

        registry.unregister(bob_laptop.id()).await.unwrap();
        assert!(!registry.is_user_in_room(user(2), room));
        assert!(registry.users_in_room(room).is_empty());
    }

    async fn snapshot(registry: &PresenceRegistry) -> Snapshot {
        let (reply, rx) = oneshot::channel();
        registry.control.send(Control::Snapshot(reply)).unwrap();
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_live_set_matches_index_after_mixed_operations() {
        // テスト項目: 登録・解除・切り離しを混ぜても、ライブ集合は「登録したもの − 解除したもの」と
        //             一致し、ユーザー索引とも矛盾しない
        // given (前提条件):
        let registry = PresenceRegistry::spawn();
        let mut live: Vec<(Arc<ConnectionHandle>, mpsc::Receiver<String>)> = Vec::new();
        let mut removed: Vec<Arc<ConnectionHandle>> = Vec::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (seed >> 33) % bound
        };

        for step in 0..80 {
            // when (操作):
            match next(4) {
                0 | 1 => {
                    let (handle, rx) = ConnectionHandle::new(user(next(5) + 1), 256);
                    registry.register(handle.clone()).await.unwrap();
                    live.push((handle, rx));
                }
                2 if !live.is_empty() => {
                    let (handle, _rx) = live.swap_remove(next(live.len() as u64) as usize);
                    assert!(registry.unregister(handle.id()).await.unwrap());
                    removed.push(handle);
                }
                3 if !live.is_empty() => {
                    let (handle, rx) = live.swap_remove(next(live.len() as u64) as usize);
                    while handle.try_send("filler".to_string()).is_ok() {}
                    assert!(!registry.send_to_connection(&handle, "overflow".to_string()));
                    drop(rx);
                    removed.push(handle);
                }
                _ => {
                    // 再度の解除は何も変えない
                    if let Some(handle) = removed.last() {
                        assert!(!registry.unregister(handle.id()).await.unwrap());
                    }
                }
            }

            // then (期待する結果):
            let snapshot = snapshot(&registry).await;
            let expected: std::collections::HashSet<ConnectionId> =
                live.iter().map(|(h, _)| h.id()).collect();
            assert_eq!(snapshot.live, expected, "live set diverged at step {}", step);

            let mut indexed = std::collections::HashSet::new();
            for (user_id, entries) in &snapshot.index {
                assert!(!entries.is_empty(), "empty index entry for user {}", user_id);
                for (owner, id) in entries {
                    assert_eq!(owner, user_id);
                    assert!(indexed.insert(*id), "connection {} indexed twice", id);
                }
            }
            assert_eq!(indexed, expected, "user index diverged at step {}", step);

            let mut online: Vec<UserId> = live.iter().map(|(h, _)| h.user_id()).collect();
            online.sort_unstable();
            online.dedup();
            assert_eq!(registry.online_users(), online);
            assert!(removed.iter().all(|h| h.is_closed()));
        }
    }
}
