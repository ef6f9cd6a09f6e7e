//! Confab client core (transport, request factory, typed chat endpoints).

pub mod chat;
pub mod config;
pub mod http;
