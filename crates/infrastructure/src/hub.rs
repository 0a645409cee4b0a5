//! 实时推送中心
//!
//! 每个 WebSocket 连接注册一个无界发送端，按聊天分组订阅。
//! 发布只投递给当前分组内的连接，不缓存、不重放。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use application::{BroadcastError, ChatEvent, MessageBroadcaster};
use async_trait::async_trait;
use domain::{ChatId, UserId};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub type ConnectionId = Uuid;

#[derive(Default)]
struct HubState {
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<ChatEvent>>,
    /// 连接所属用户，移除成员时据此找到其全部连接
    owners: HashMap<ConnectionId, UserId>,
    /// 分组名到连接集合
    groups: HashMap<String, HashSet<ConnectionId>>,
    /// 连接到已加入分组的反向索引，断开时用来清理
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

#[derive(Clone, Default)]
pub struct ChatHub {
    state: Arc<RwLock<HubState>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为用户注册新连接，返回连接标识和事件接收端
    pub async fn connect(
        &self,
        user_id: UserId,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ChatEvent>) {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut state = self.state.write().await;
        state.senders.insert(connection_id, sender);
        state.owners.insert(connection_id, user_id);
        state.memberships.insert(connection_id, HashSet::new());
        debug!(%connection_id, %user_id, "connection registered");

        (connection_id, receiver)
    }

    /// 加入聊天分组，重复加入不会产生重复投递。连接未注册时返回 false。
    pub async fn join(&self, connection_id: ConnectionId, chat_id: ChatId) -> bool {
        let group = chat_id.group_name();
        let mut state = self.state.write().await;
        if !state.senders.contains_key(&connection_id) {
            return false;
        }

        state
            .groups
            .entry(group.clone())
            .or_default()
            .insert(connection_id);
        state
            .memberships
            .entry(connection_id)
            .or_default()
            .insert(group);
        debug!(%connection_id, %chat_id, "joined chat group");
        true
    }

    /// 离开聊天分组，未加入时为空操作
    pub async fn leave(&self, connection_id: ConnectionId, chat_id: ChatId) {
        let group = chat_id.group_name();
        let mut state = self.state.write().await;
        Self::remove_from_group(&mut state, connection_id, &group);
        debug!(%connection_id, %chat_id, "left chat group");
    }

    /// 断开连接并退出它加入过的所有分组
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        state.senders.remove(&connection_id);
        state.owners.remove(&connection_id);

        let groups = state.memberships.remove(&connection_id).unwrap_or_default();
        for group in groups {
            if let Some(members) = state.groups.get_mut(&group) {
                members.remove(&connection_id);
                if members.is_empty() {
                    state.groups.remove(&group);
                }
            }
        }
        debug!(%connection_id, "connection removed");
    }

    fn remove_from_group(state: &mut HubState, connection_id: ConnectionId, group: &str) -> bool {
        let mut removed = false;
        if let Some(members) = state.groups.get_mut(group) {
            removed = members.remove(&connection_id);
            if members.is_empty() {
                state.groups.remove(group);
            }
        }
        if let Some(groups) = state.memberships.get_mut(&connection_id) {
            groups.remove(group);
        }
        removed
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.senders.len()
    }

    pub async fn group_size(&self, chat_id: ChatId) -> usize {
        self.state
            .read()
            .await
            .groups
            .get(&chat_id.group_name())
            .map_or(0, HashSet::len)
    }
}

#[async_trait]
impl MessageBroadcaster for ChatHub {
    async fn publish(&self, chat_id: ChatId, event: ChatEvent) -> Result<usize, BroadcastError> {
        let state = self.state.read().await;
        let Some(members) = state.groups.get(&chat_id.group_name()) else {
            return Ok(0);
        };

        let mut delivered = 0;
        for connection_id in members {
            let Some(sender) = state.senders.get(connection_id) else {
                continue;
            };
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!(%connection_id, %chat_id, "dropping event for closed connection");
            }
        }

        debug!(%chat_id, delivered, "event published");
        Ok(delivered)
    }

    async fn evict_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<usize, BroadcastError> {
        let group = chat_id.group_name();
        let mut state = self.state.write().await;
        let connections: Vec<ConnectionId> = state
            .owners
            .iter()
            .filter(|(_, owner)| **owner == user_id)
            .map(|(connection_id, _)| *connection_id)
            .collect();

        let mut evicted = 0;
        for connection_id in connections {
            if Self::remove_from_group(&mut state, connection_id, &group) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(%chat_id, %user_id, evicted, "evicted member connections");
        }
        Ok(evicted)
    }
}
