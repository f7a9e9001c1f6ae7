//! Runtime and tool installation

pub mod fallback;
pub mod runtime;
