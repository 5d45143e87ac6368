#![forbid(unsafe_code)]

//! Outbound persistent command session for a node-monitoring agent.
//!
//! The node dials the control plane, keeps a two-leg streaming HTTP channel
//! open and answers control-plane requests (health queries, reboot, package
//! deletion, updates) over it.

pub mod components;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod host;
pub mod models;
pub mod session;
pub mod update;

pub use config::{AgentConfig, SessionOptions};
pub use errors::{AppError, Result};
pub use session::Session;
