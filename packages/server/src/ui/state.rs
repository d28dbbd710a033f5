//! Shared application state.

use std::sync::Arc;

use lapak_shared::time::Clock;

use crate::{
    config::ConnectionSettings,
    domain::{ChatRoomRepository, PendingMessageStore},
    infrastructure::presence::PresenceRegistry,
    usecase::{
        ConnectUserUseCase, DisconnectUserUseCase, DrainMessagesUseCase, GetRoomStatusUseCase,
        InitPrivateChatUseCase, JoinRoomUseCase, LeaveChatUseCase, LeaveRoomUseCase,
        ListChatsUseCase, MarkReadUseCase, RoomStatusNotifier, SendChatUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectUserUseCase（接続登録のユースケース）
    pub connect_user_usecase: Arc<ConnectUserUseCase>,
    /// DisconnectUserUseCase（接続登録解除のユースケース）
    pub disconnect_user_usecase: Arc<DisconnectUserUseCase>,
    /// SendChatUseCase（チャット送信のユースケース）
    pub send_chat_usecase: Arc<SendChatUseCase>,
    /// MarkReadUseCase（既読処理のユースケース）
    pub mark_read_usecase: Arc<MarkReadUseCase>,
    /// JoinRoomUseCase（ルーム入室のユースケース）
    pub join_room_usecase: Arc<JoinRoomUseCase>,
    /// LeaveRoomUseCase（ルーム退室のユースケース）
    pub leave_room_usecase: Arc<LeaveRoomUseCase>,
    /// InitPrivateChatUseCase（1 対 1 チャット開始のユースケース）
    pub init_private_chat_usecase: Arc<InitPrivateChatUseCase>,
    /// GetRoomStatusUseCase（在室状況取得のユースケース）
    pub get_room_status_usecase: Arc<GetRoomStatusUseCase>,
    /// DrainMessagesUseCase（未読メッセージ取り出しのユースケース）
    pub drain_messages_usecase: Arc<DrainMessagesUseCase>,
    /// ListChatsUseCase（チャット一覧取得のユースケース）
    pub list_chats_usecase: Arc<ListChatsUseCase>,
    /// LeaveChatUseCase（チャット退出のユースケース）
    pub leave_chat_usecase: Arc<LeaveChatUseCase>,
    /// 接続ごとの上限とタイマー
    pub connection_settings: ConnectionSettings,
}

impl AppState {
    /// Wire every use case to the given store, registry and clock.
    pub fn new(
        chat_rooms: Arc<dyn ChatRoomRepository>,
        pending: Arc<dyn PendingMessageStore>,
        registry: PresenceRegistry,
        clock: Arc<dyn Clock>,
        connection_settings: ConnectionSettings,
    ) -> Self {
        let notifier = Arc::new(RoomStatusNotifier::new(
            chat_rooms.clone(),
            registry.clone(),
        ));

        Self {
            connect_user_usecase: Arc::new(ConnectUserUseCase::new(registry.clone())),
            disconnect_user_usecase: Arc::new(DisconnectUserUseCase::new(registry.clone())),
            send_chat_usecase: Arc::new(SendChatUseCase::new(
                chat_rooms.clone(),
                pending.clone(),
                registry.clone(),
                clock.clone(),
            )),
            mark_read_usecase: Arc::new(MarkReadUseCase::new(
                chat_rooms.clone(),
                pending.clone(),
                registry.clone(),
            )),
            join_room_usecase: Arc::new(JoinRoomUseCase::new(
                chat_rooms.clone(),
                pending.clone(),
                registry.clone(),
                notifier.clone(),
            )),
            leave_room_usecase: Arc::new(LeaveRoomUseCase::new(notifier)),
            init_private_chat_usecase: Arc::new(InitPrivateChatUseCase::new(
                chat_rooms.clone(),
                clock,
            )),
            get_room_status_usecase: Arc::new(GetRoomStatusUseCase::new(
                chat_rooms.clone(),
                registry,
            )),
            drain_messages_usecase: Arc::new(DrainMessagesUseCase::new(
                chat_rooms.clone(),
                pending.clone(),
            )),
            list_chats_usecase: Arc::new(ListChatsUseCase::new(
                chat_rooms.clone(),
                pending.clone(),
            )),
            leave_chat_usecase: Arc::new(LeaveChatUseCase::new(chat_rooms, pending)),
            connection_settings,
        }
    }
}
