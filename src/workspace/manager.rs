//! Channel-to-workspace routing and the global `channel:message` bridge
//! (spec.md §4.F).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;

use super::events::{EventEmitter, HandlerId};
use super::runtime::{WorkspaceRuntime, WorkspaceSettings};
use super::WorkspaceError;
use crate::orchestrator::ChatOrchestrator;

/// An outbound delivery mechanism for a channel (e.g. a chat platform adapter).
/// Registered per channel id; `generate_response` looks one up after a turn
/// completes and forwards the reply.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    async fn send(&self, channel_id: &str, content: &str) -> Result<(), WorkspaceError>;
}

/// Owns the set of live workspaces, the channel-id to workspace-id map, and
/// the default-workspace pointer used when a channel has no explicit mapping.
pub struct WorkspaceManager {
    workspaces: DashMap<String, Arc<WorkspaceRuntime>>,
    channel_routes: DashMap<String, String>,
    default_workspace_id: Mutex<Option<String>>,
    adapters: Arc<DashMap<String, Arc<dyn ChannelAdapter>>>,
    chat: Arc<ChatOrchestrator>,
    global_events: Arc<EventEmitter>,
    subscription: Mutex<Option<HandlerId>>,
    disposed: AtomicBool,
}

impl WorkspaceManager {
    /// Builds a manager and subscribes it to `global_events`'s `channel:message`
    /// event for channel bridging.
    pub fn new(global_events: Arc<EventEmitter>, chat: Arc<ChatOrchestrator>) -> Arc<Self> {
        let manager = Arc::new(Self {
            workspaces: DashMap::new(),
            channel_routes: DashMap::new(),
            default_workspace_id: Mutex::new(None),
            adapters: Arc::new(DashMap::new()),
            chat,
            global_events,
            subscription: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&manager);
        let handler_id = manager.global_events.on("channel:message", move |payload| {
            let Some(manager) = weak.upgrade() else { return };
            tokio::spawn(async move {
                manager.handle_channel_message(payload).await;
            });
        });
        *manager.subscription.lock().unwrap() = Some(handler_id);
        manager
    }

    /// Creates a new, empty workspace for `user_id`.
    pub fn create_workspace(&self, id: impl Into<String>, user_id: impl Into<String>) -> Arc<WorkspaceRuntime> {
        let id = id.into();
        let runtime = Arc::new(WorkspaceRuntime::new(
            id.clone(),
            user_id,
            WorkspaceSettings::default(),
            self.chat.clone(),
            self.adapters.clone(),
        ));
        self.workspaces.insert(id, runtime.clone());
        runtime
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkspaceRuntime>> {
        self.workspaces.get(id).map(|w| w.clone())
    }

    /// Returns the default workspace, creating one (owned by `user_id`) if none exists yet.
    pub fn get_or_create_default(&self, user_id: &str) -> Arc<WorkspaceRuntime> {
        let mut default_id = self.default_workspace_id.lock().unwrap();
        if let Some(id) = default_id.as_ref() {
            if let Some(ws) = self.workspaces.get(id) {
                return ws.clone();
            }
        }
        let ws = self.create_workspace(uuid::Uuid::new_v4().to_string(), user_id);
        *default_id = Some(ws.id.clone());
        ws
    }

    /// Maps `channel_id` to `workspace_id`. Overwrites any prior mapping for that channel.
    pub fn associate_channel(&self, channel_id: impl Into<String>, workspace_id: impl Into<String>) {
        self.channel_routes.insert(channel_id.into(), workspace_id.into());
    }

    /// Removes a channel mapping. Unknown channel ids are a no-op.
    pub fn disassociate_channel(&self, channel_id: &str) {
        self.channel_routes.remove(channel_id);
    }

    pub fn get_by_channel(&self, channel_id: &str) -> Option<Arc<WorkspaceRuntime>> {
        let workspace_id = self.channel_routes.get(channel_id)?;
        self.workspaces.get(workspace_id.as_str()).map(|w| w.clone())
    }

    pub fn register_adapter(&self, channel_id: impl Into<String>, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters.insert(channel_id.into(), adapter);
    }

    async fn handle_channel_message(&self, payload: serde_json::Value) {
        let Some(channel_id) = payload.get("channelId").and_then(|v| v.as_str()) else {
            tracing::warn!("channel:message payload missing channelId");
            return;
        };
        let Some(content) = payload.get("content").and_then(|v| v.as_str()) else {
            tracing::warn!(channel_id, "channel:message payload missing content");
            return;
        };
        let user_id = payload.get("userId").and_then(|v| v.as_str()).unwrap_or("default");

        let workspace = match self.get_by_channel(channel_id) {
            Some(ws) => ws,
            None => self.get_or_create_default(user_id),
        };

        if let Err(err) = workspace.process_incoming_message(content, Some(channel_id)).await {
            tracing::warn!(channel_id, error = %err, "channel message delivery failed, isolated from other workspaces");
        }
    }

    /// Unsubscribes from the global event bus. Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(id) = self.subscription.lock().unwrap().take() {
            self.global_events.off("channel:message", id);
        }
    }
}
