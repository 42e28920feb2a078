//! Core domain + application logic for the slackline bot.
//!
//! This crate is intentionally platform-agnostic. The Slack Web API and the
//! RTM event stream live behind ports (traits) implemented in the adapter
//! crate; what lives here is the typed configuration, the event model and
//! dispatch registry, and the reconnect/poll state machine that keeps the
//! service alive.

pub mod config;
pub mod domain;
pub mod errors;
pub mod event;
pub mod logging;
pub mod ports;
pub mod stream;

pub use errors::{Error, Result};
