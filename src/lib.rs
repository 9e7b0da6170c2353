//! bucketwatch - storage endpoint liveness monitor
//!
//! Probes a fixed set of MinIO endpoints, keeps a bounded in-memory history,
//! alerts chat and email channels on failures, and guards the API behind TOTP.

pub mod auth;
pub mod config;
pub mod notify;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod web;
