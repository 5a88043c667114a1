//! # flowsync-remote
//!
//! The remote workflow service as seen by the sync engine.
//!
//! [`WorkflowStore`] is the contract; [`HttpStore`] talks to a live n8n
//! instance over its public REST API and [`MemoryStore`] stands in for one in
//! tests.

pub mod error;
pub mod http;
pub mod memory;
pub mod store;

pub use error::RemoteError;
pub use http::{validate_base_url, HttpStore};
pub use memory::MemoryStore;
pub use store::WorkflowStore;
