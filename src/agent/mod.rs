//! Chat agent orchestration.

mod runner;

pub use runner::ChatAgent;
