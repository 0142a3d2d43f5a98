//! Core of the video storer bot.
//!
//! Framework-agnostic: Telegram lives behind the messaging port in the adapter
//! crate. This crate owns the message-context engine (history, media groups,
//! countdown directives), the naming policy and the per-update archive daemon.

pub mod args;
pub mod config;
pub mod context;
pub mod daemon;
pub mod domain;
pub mod errors;
pub mod ip_echo;
pub mod logging;
pub mod messaging;
pub mod metadata;
pub mod naming;
pub mod ports;

pub use errors::{Error, Result};
