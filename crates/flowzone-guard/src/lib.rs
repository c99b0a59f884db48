//! # FlowZone Guard
//!
//! Crash detection and staged recovery. A sentinel file under the storage
//! root marks a running session; finding it at startup means the previous
//! run died. Recorded failures escalate through [`SafeModeLevel`]s:
//!
//! - **Level 1**: three failures from one component within a minute.
//! - **Level 2**: any audio driver failure.
//! - **Level 3**: three failures of mixed cause within five minutes.
//!
//! ```no_run
//! use flowzone_guard::{CrashGuard, GuardConfig};
//!
//! let mut guard = CrashGuard::new(GuardConfig::new("/var/lib/flowzone"))?;
//! if guard.should_disable_plugins() {
//!     println!("{}", guard.safe_mode_description());
//! }
//! guard.mark_active();
//! // ... run ...
//! guard.mark_clean();
//! # Ok::<(), flowzone_guard::GuardError>(())
//! ```

pub mod config;
pub mod error;
pub mod event;
mod guard;
mod journal;
pub mod level;
mod store;

pub use config::{Clock, GuardConfig, ManualClock, SystemClock, LOG_FILE_NAME, SENTINEL_FILE_NAME};
pub use error::{GuardError, Result};
pub use event::{CrashEvent, CrashSeverity};
pub use guard::CrashGuard;
pub use level::SafeModeLevel;
