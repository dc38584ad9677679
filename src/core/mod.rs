//! Core decision logic: version resolution, tiered acquisition, environment
//! export, and teardown cache reconciliation.

pub mod env;
pub mod error;
pub mod job;
pub mod matrix;
pub mod outcome;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod state;
pub mod verify;
pub mod version;
