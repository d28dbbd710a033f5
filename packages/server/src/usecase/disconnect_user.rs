//! UseCase: 接続の登録解除

use crate::infrastructure::presence::{ConnectionHandle, PresenceRegistry};

/// 接続登録解除のユースケース
pub struct DisconnectUserUseCase {
    registry: PresenceRegistry,
}

impl DisconnectUserUseCase {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    /// 接続を登録解除し、送信キューを閉じる
    ///
    /// 何度呼んでもよい。登録解除されたのが今回であれば `true` を返す。
    pub async fn execute(&self, connection: &ConnectionHandle) -> bool {
        let removed = match self.registry.unregister(connection.id()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!("Failed to unregister connection {}: {}", connection.id(), e);
                false
            }
        };
        connection.close();
        removed
    }
}
