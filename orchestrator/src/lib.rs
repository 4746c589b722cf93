//! Scheduler orchestration core.
//!
//! Maps opaque job and trigger identifiers onto the native (name, group) keys of a
//! scheduling engine and keeps group-scoped lifecycle operations consistent.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod identity;
pub mod models;
pub mod orchestrator;
pub mod permissions;
pub mod schedule;
pub mod telemetry;
pub mod trigger;

pub use orchestrator::SchedulerCore;
pub use permissions::PermittedGroups;
