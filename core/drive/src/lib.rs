//! Google Drive backend for dbferry.
//!
//! A small Drive v3 REST client covering the three operations the backup
//! system drives: multipart upload with metadata, folder listing with
//! pagination, and delete-by-id.

pub mod client;

pub use client::{DriveClient, DriveFile};
