//! Common test utilities for lifecycle and CLI tests.

#![allow(dead_code)]

mod backend;
mod fixtures;

pub use backend::{Call, ScriptedBackend};
pub use fixtures::*;
