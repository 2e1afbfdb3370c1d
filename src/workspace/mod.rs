//! Workspace Runtime (spec.md §4.F): per-conversation message buffer with
//! pruning, a small state machine, a local fire-and-forget event emitter, and
//! channel-to-workspace routing.

mod error;
mod events;
mod manager;
mod runtime;

pub use error::WorkspaceError;
pub use events::{EventEmitter, HandlerId};
pub use manager::{ChannelAdapter, WorkspaceManager};
pub use runtime::{WorkspaceRuntime, WorkspaceSettings, WorkspaceState};
