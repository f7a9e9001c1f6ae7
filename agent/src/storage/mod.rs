//! Persistent storage: layout and deploy-time configuration

pub mod config;
pub mod layout;
