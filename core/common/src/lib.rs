//! Common utilities and types shared across dbferry crates.
//!
//! This crate provides the error taxonomy, the remote-store interface, and
//! the domain types used by the auth, drive and backup crates.

pub mod error;
pub mod remote;
pub mod types;

pub use error::{Error, Result};
pub use remote::{RemoteObject, RemoteStore};
pub use types::{BackupScope, RetentionPolicy};
