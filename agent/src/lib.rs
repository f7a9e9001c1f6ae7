//! Dockhand Agent Library
//!
//! Core modules for the dockhand deploy agent: a webhook-triggered
//! continuous-deployment pipeline for a single application instance.

pub mod app;
pub mod backend;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod installer;
pub mod logs;
pub mod server;
pub mod setup;
pub mod storage;
pub mod utils;
