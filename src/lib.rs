// Ideaflow - blog idea generation workflow
// License: Apache-2.0

pub mod config;
pub mod ideas;
pub mod logger;
pub mod metrics;
pub mod provider;
pub mod workflow;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
