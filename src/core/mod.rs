//! Core module - classification, bootstrap, polling, snapshots, channels, logging
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! so that additions to submodules do not silently widen the public API.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{Classifier, PollScheduler, SyncGate};
//! ```

pub mod bootstrap;
pub mod channels;
pub mod classifier;
pub mod clock;
pub mod logging;
pub mod registry;
pub mod scheduler;
pub mod snapshot;

// Explicit re-exports for bootstrap module
pub use bootstrap::{run_bootstrap, BootstrapContext, BootstrapReport, BootstrapState, SyncGate};

// Explicit re-exports for channels module
pub use channels::{ChannelBundle, FreshTrade, MonitorNotice, SnapshotFault, DEFAULT_CHANNEL_CAPACITY};

// Explicit re-exports for classifier module
pub use classifier::{
    detect_sub_kind, is_stale_fast_cycle, is_too_old, logical_trade_key, window_start, Classifier,
    FilterFlags, SubKind, Suppressor, Verdict,
};

// Explicit re-exports for clock module
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};

// Explicit re-exports for logging module
pub use logging::{
    init_logging, init_logging_with_config, sanitize, LoggingConfig, SanitizedValue, ShortAddress,
    DEFAULT_LOG_LEVEL,
};

// Explicit re-exports for registry module
pub use registry::{AccountCategory, AccountRecord, AccountRegistry};

// Explicit re-exports for scheduler module
pub use scheduler::{
    AccountFailure, AccountReport, CycleReport, MonitorSettings, PollScheduler, SchedulerChannels,
};

// Explicit re-exports for snapshot module
pub use snapshot::{
    refresh_positions, snapshot_supervisor_task, summarize_positions, PositionSummary, SnapshotUpdater,
};
