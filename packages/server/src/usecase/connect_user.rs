//! UseCase: 接続の登録
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectUserUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - 新しい接続が自分以外のオンラインユーザー一覧を必ず受け取ることを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：他のユーザーがオンラインの状態で接続
//! - エッジケース：誰もオンラインでない状態で接続（空の一覧が届く）

use std::sync::Arc;

use crate::{
    domain::UserId,
    infrastructure::{
        dto::websocket::ServerEvent,
        presence::{ConnectionHandle, PresenceRegistry, RegistryError},
    },
};

use super::notify::encode;

/// 接続登録のユースケース
pub struct ConnectUserUseCase {
    registry: PresenceRegistry,
}

impl ConnectUserUseCase {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    /// 接続を Presence Registry に登録し、`online_users_list` を本人に送る
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<UserId>)` - 登録時点でオンラインだった他のユーザー（昇順）
    /// * `Err(RegistryError)` - Registry が停止している
    pub async fn execute(
        &self,
        connection: Arc<ConnectionHandle>,
    ) -> Result<Vec<UserId>, RegistryError> {
        let others = self.registry.register(connection.clone()).await?;

        let event = ServerEvent::OnlineUsersList {
            user_ids: others.iter().map(UserId::value).collect(),
        };
        if let Some(payload) = encode(&event) {
            self.registry.send_to_connection(&connection, payload);
        }

        Ok(others)
    }
}
