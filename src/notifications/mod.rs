pub mod builder;
pub mod models;
pub mod senders;
pub mod service;
pub mod templates;
