//! Per-workspace state machine (spec.md §4.F): message buffer with pruning,
//! `idle`/`processing`/`waiting`/`error` states, and the turn loop that bridges
//! an incoming message to the chat agent and an optional channel adapter.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;

use super::events::EventEmitter;
use super::manager::ChannelAdapter;
use super::WorkspaceError;
use crate::message::Message;
use crate::orchestrator::{ChatOrchestrator, TurnRequest};
use crate::stream::ChatStreamWriter;

/// Lifecycle state of a workspace. Mirrors the states spec.md names; `waiting`
/// is reserved for a future approval-gate integration and is set only via
/// [`WorkspaceRuntime::set_state`], never by the runtime itself today.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    Idle,
    Processing,
    Waiting,
    Error,
}

/// Per-workspace tunables.
#[derive(Clone, Debug)]
pub struct WorkspaceSettings {
    pub auto_reply: bool,
    pub max_context_messages: usize,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            auto_reply: true,
            max_context_messages: 20,
        }
    }
}

/// One conversation's live state: message buffer, lifecycle state, and the
/// event emitter clients subscribe to for `stateChange`/`streamStart`/`streamEnd`.
pub struct WorkspaceRuntime {
    pub id: String,
    user_id: String,
    conversation_id: RwLock<String>,
    messages: RwLock<Vec<Message>>,
    state: RwLock<WorkspaceState>,
    error: RwLock<Option<String>>,
    last_activity_at: RwLock<DateTime<Utc>>,
    settings: WorkspaceSettings,
    events: EventEmitter,
    chat: Arc<ChatOrchestrator>,
    adapters: Arc<DashMap<String, Arc<dyn ChannelAdapter>>>,
}

impl WorkspaceRuntime {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        settings: WorkspaceSettings,
        chat: Arc<ChatOrchestrator>,
        adapters: Arc<DashMap<String, Arc<dyn ChannelAdapter>>>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            conversation_id: RwLock::new(uuid::Uuid::new_v4().to_string()),
            messages: RwLock::new(Vec::new()),
            state: RwLock::new(WorkspaceState::Idle),
            error: RwLock::new(None),
            last_activity_at: RwLock::new(Utc::now()),
            settings,
            events: EventEmitter::new(),
            chat,
            adapters,
        }
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn state(&self) -> WorkspaceState {
        *self.state.read().unwrap()
    }

    pub fn conversation_id(&self) -> String {
        self.conversation_id.read().unwrap().clone()
    }

    /// Appends a message, pruning the oldest entries once the buffer exceeds
    /// `5 * maxContextMessages`.
    pub fn add_message(&self, message: Message) {
        let mut messages = self.messages.write().unwrap();
        messages.push(message);
        let cap = 5 * self.settings.max_context_messages.max(1);
        if messages.len() > cap {
            let excess = messages.len() - cap;
            messages.drain(0..excess);
        }
    }

    /// Returns a copy of the full buffer.
    pub fn get_messages(&self) -> Vec<Message> {
        self.messages.read().unwrap().clone()
    }

    /// Returns the last `limit` messages, defaulting to `maxContextMessages`.
    pub fn get_context_messages(&self, limit: Option<usize>) -> Vec<Message> {
        let limit = limit.unwrap_or(self.settings.max_context_messages);
        let messages = self.messages.read().unwrap();
        let start = messages.len().saturating_sub(limit);
        messages[start..].to_vec()
    }

    /// Clears the buffer and rotates the conversation id, so a cleared
    /// workspace never reuses a prior turn's identity.
    pub fn clear_messages(&self) {
        self.messages.write().unwrap().clear();
        *self.conversation_id.write().unwrap() = uuid::Uuid::new_v4().to_string();
    }

    /// Transitions to `state`, touching `lastActivityAt` and emitting
    /// `stateChange`. Entering anything but `error` clears the stored error.
    pub fn set_state(&self, state: WorkspaceState, error: Option<String>) {
        *self.state.write().unwrap() = state;
        *self.last_activity_at.write().unwrap() = Utc::now();
        if state == WorkspaceState::Error {
            *self.error.write().unwrap() = error.clone();
        } else {
            *self.error.write().unwrap() = None;
        }
        self.events.emit(
            "stateChange",
            json!({ "state": state, "error": error, "workspaceId": self.id }),
        );
    }

    /// Appends a normalised user message and, if `autoReply` is set, drives a
    /// full response turn.
    pub async fn process_incoming_message(
        &self,
        content: &str,
        channel_id: Option<&str>,
    ) -> Result<(), WorkspaceError> {
        self.add_message(Message::user(content));
        if self.settings.auto_reply {
            self.generate_response(channel_id).await?;
        }
        Ok(())
    }

    /// Runs one turn against the chat agent for the last user message,
    /// appends the assistant reply, and forwards it to a channel adapter if
    /// one is registered for `channel_id`. Any failure transitions the
    /// workspace to `error` and is re-raised.
    pub async fn generate_response(&self, channel_id: Option<&str>) -> Result<(), WorkspaceError> {
        self.set_state(WorkspaceState::Processing, None);
        let stream_id = uuid::Uuid::new_v4().to_string();
        self.events.emit("streamStart", json!({ "id": stream_id }));

        let result = self.run_turn().await;

        match result {
            Ok(content) => {
                self.add_message(Message::assistant(&content));
                self.events.emit("streamEnd", json!({ "id": stream_id }));
                self.set_state(WorkspaceState::Idle, None);
                if let Some(channel_id) = channel_id {
                    if let Some(adapter) = self.adapters.get(channel_id) {
                        adapter
                            .send(channel_id, &content)
                            .await
                            .map_err(|e| WorkspaceError::AdapterSend(e.to_string()))?;
                    }
                }
                Ok(())
            }
            Err(err) => {
                self.set_state(WorkspaceState::Error, Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn run_turn(&self) -> Result<String, WorkspaceError> {
        let content = self
            .get_messages()
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::User { content } => Some(content.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let request = TurnRequest {
            conversation_id: self.conversation_id(),
            user_id: self.user_id.clone(),
            content,
            history: self.get_context_messages(None),
            max_context_tokens: 8_000,
        };
        let (tx, mut rx) = tokio::sync::mpsc::channel(32);
        let stream = ChatStreamWriter::new(tx);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let outcome = self.chat.run_turn(request, stream).await;
        drop(drain);
        match outcome.error {
            Some(message) => Err(WorkspaceError::TurnFailed(message)),
            None => Ok(outcome.content),
        }
    }
}
