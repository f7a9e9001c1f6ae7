//! Backend descriptors and supervisor dispatch

pub mod descriptor;
pub mod exec;
pub mod registry;
