//! OAuth2 credential lifecycle for dbferry.
//!
//! This crate covers the three credential concerns of a scheduled backup
//! run: durable storage of the delegated credential, the one-time
//! authorization-code exchange, and transparent refresh of expired access
//! tokens.

pub mod credential;
pub mod flow;
pub mod refresh;
pub mod store;

pub use credential::{Credential, TokenType};
pub use flow::{AuthFlow, AuthOutcome, ClientConfig};
pub use refresh::{CredentialRefresher, RefreshResponse, RefreshTransport};
pub use store::CredentialStore;
