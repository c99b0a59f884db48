//! # FlowZone Sync
//!
//! Keeps remote UIs in step with the engine. Each tick the
//! [`StateBroadcaster`] diffs the new state tree against the last one sent
//! and emits either a `STATE_PATCH` of [`PatchOp`]s or, when the patch would
//! be large, a `STATE_FULL` snapshot. Every message carries a revision id so
//! clients can detect gaps and ask for a full resend.
//!
//! ```
//! use flowzone_sync::{AppState, Broadcast, StateBroadcaster};
//!
//! let broadcaster = StateBroadcaster::default();
//! broadcaster.set_transport(|msg: &str| println!("{msg}"));
//!
//! let mut state = AppState::default();
//! broadcaster.broadcast_full_state(&state)?;
//!
//! state.transport.bpm = 140.0;
//! let sent = broadcaster.broadcast_state_update(&state)?;
//! assert!(matches!(sent, Broadcast::Patch { op_count: 1, .. }));
//! # Ok::<(), flowzone_sync::SyncError>(())
//! ```

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod message;
pub mod patch;
pub mod state;
pub mod ticker;

pub use broadcaster::{Broadcast, StateBroadcaster, Transport};
pub use config::BroadcastConfig;
pub use error::{Result, SyncError};
pub use message::StateMessage;
pub use patch::{apply_patch, diff, PatchOp};
pub use state::AppState;
pub use ticker::BroadcastTicker;
