#![allow(clippy::cargo_common_metadata)]

pub mod client;
pub mod config;
pub mod daemon_config;
pub mod environment;
pub mod error;
pub mod fixture;
pub mod model;
pub mod orchestrator;
pub mod process;
pub mod runlog;
pub mod verify;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use client::{ClientConnector, MediaClient, QueueEntry};
pub use error::{HarnessError, Result};
pub use orchestrator::{Orchestrator, RunOutcome, RunResult, TestContext, TestUnit, UnitRegistry};
