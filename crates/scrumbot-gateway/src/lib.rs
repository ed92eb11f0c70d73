//! # ScrumBot Gateway
//!
//! HTTP surface of the bot: slash commands on `POST /`, interactive
//! components on `POST /req` and the load balancer probe.

pub mod request;
pub mod routes;
pub mod server;
pub mod sessions;
pub mod templates;

pub use server::{AppState, build_router, start};
