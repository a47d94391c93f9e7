//! PolyVault - an in-memory, multi-type key-value store with a line protocol
//!
//! This library provides:
//! - Typed entries (string, hash, list, set, sorted set) fixed per key at creation
//! - A static operation router built once at startup
//! - A key store whose creation protocol lets unrelated keys run in parallel
//! - A TCP server and client speaking one request and one JSON reply per line

pub mod client;
pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod protocol;
pub mod router;
pub mod server;
pub mod store;

pub use client::{Client, Reply};
pub use dispatcher::Dispatcher;
pub use entry::{Entry, Kind, Value};
pub use error::{PolyVaultError, Result};
pub use protocol::{Request, Response};
pub use router::Router;
pub use server::{PolyVaultServer, ServerConfig};
pub use store::KeyStore;
