//! # ScrumBot Core
//!
//! Shared building blocks for every ScrumBot crate: configuration, the error
//! type, the daily-scrum domain model, the outbound message model and the
//! `Notifier` seam towards the chat platform.

pub mod config;
pub mod error;
pub mod message;
pub mod traits;
pub mod types;

pub use config::ScrumBotConfig;
pub use error::{Result, ScrumError};
pub use traits::{Notifier, TenantContext};
pub use types::{ChannelSchedule, DaySet, MeetingInstance, MeetingWithStatus, StatusEntry};
