//! # ScrumBot Channels
//! Outbound delivery to the messenger: incoming-webhook posts and the dialog API.

pub mod messenger;

pub use messenger::MessengerClient;
