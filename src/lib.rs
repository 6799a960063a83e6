//! Sensu handler that forwards events to Squadcast through its incident webhook.

pub mod config;
pub mod event;
pub mod logging;
pub mod notifications;
pub mod version;
