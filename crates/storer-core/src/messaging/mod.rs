//! Messenger abstractions (Telegram today, behind the port).

pub mod port;
pub mod throttled;
pub mod types;
