//! # RetroAchievements Reporter Core
//!
//! Session plugin logic for reporting RetroAchievements progress from a
//! game-session tracking host. While a session is active the reporter polls
//! the RetroAchievements user summary, diffs it against the last snapshot and
//! posts what changed to the session log and to notification services.
//!
//! ## Architecture
//!
//! - **Snapshot**: presence text plus recent achievements, and the diff that
//!   turns two snapshots into a report
//! - **Client**: `API_GetUserSummary.php` over reqwest
//! - **Reporter**: per-session state machine driven by host events, re-armed
//!   through a single-slot [`CancellableTimer`]
//! - **Storage**: TOML plugin configuration and per-session JSON state
//! - **Integrations**: notification services (Discord webhook)
//!
//! ## Key Components
//!
//! - [`SnapshotReporter`]: fetch, diff, report, reschedule
//! - [`EventBus`]: session start/end signal dispatch
//! - [`PluginConfig`]: user settings
//! - [`NotificationService`]: trait for status forwarding

use std::future::Future;
use std::pin::Pin;

pub mod client;
pub mod error;
pub mod events;
pub mod host;
pub mod integrations;
pub mod logging;
pub mod reporter;
pub mod snapshot;
pub mod storage;
pub mod timer;

/// Boxed, sendable future used at trait-object seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use client::{Credentials, RetroAchievementsClient};
pub use error::{ApiError, ConfigError, CoreError, StorageError};
pub use events::{EventBus, SessionEvent};
pub use host::{Host, PlaySession, UserApp};
pub use integrations::{DiscordNotifier, NotificationService};
pub use reporter::{Lifecycle, ReportPhase, SnapshotReporter};
pub use snapshot::{AchievementRecord, Snapshot};
pub use storage::{PluginConfig, StateStore};
pub use timer::{CancellableTimer, TimerHandle};
