//! Core infrastructure for recipe runs
//!
//! Recipe loading, dependency declaration and resolution, the environment
//! probe, build backends and the phase lifecycle that ties them together.

pub mod artifact;
pub mod backend;
pub mod config;
pub mod deps;
pub mod env;
pub mod error;
pub mod export;
pub mod lifecycle;
pub mod lock;
pub mod output;
pub mod recipe;
pub mod resolve;
