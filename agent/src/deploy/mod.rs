//! Deployment pipeline module

pub mod events;
pub mod fsm;
pub mod git;
pub mod health;
pub mod lock;
pub mod pipeline;
pub mod rollback;
