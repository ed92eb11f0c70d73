//! # ScrumBot Scheduler
//!
//! Daily scrum meeting lifecycle on top of SQLite.
//!
//! ## Architecture
//! ```text
//! Engine (tokio interval → MinuteGate → one spawned tick per minute)
//!   ├── Matcher: schedules due in their own timezone
//!   └── per due channel (JoinSet task) → Lifecycle
//!         ├── purge completed meetings
//!         ├── date the open meeting
//!         ├── Report → Notifier (pages in order)
//!         └── close + open the next meeting (one transaction)
//!
//! Status resolver
//!   ├── backlog gate → date chooser | pre-filled write form
//!   └── submit → upsert + classify (write / edit / late)
//! ```

pub mod engine;
pub mod lifecycle;
pub mod matcher;
pub mod persistence;
pub mod report;
pub mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{ScrumContext, dispatch_tick, run_tick, spawn_scheduler};
pub use lifecycle::{AdvanceOutcome, advance_channel, open_meeting_report};
pub use persistence::ScrumDb;
pub use status::{DateChoice, StatusDraft, SubmissionKind, WriteEntry};
