//! Coshell Core - tools and sessions for the coshell MCP server
//!
//! This crate provides the core functionality behind the server:
//! - Tool system: ad-hoc shell execution and file editing
//! - Persistent interactive shell sessions with sentinel-framed exec
//! - An in-session editor that transfers file content via base64

pub mod config;
pub mod error;
pub mod session;
pub mod tools;

pub use config::{BashToolConfig, Config, SessionTuning};
pub use error::{Error, Result, SessionError};
pub use session::{
    BashSessionFactory, ExecOutcome, SessionFactory, SessionManager, SessionSpec, SessionSummary,
};
pub use tools::{Tool, ToolRegistry};
