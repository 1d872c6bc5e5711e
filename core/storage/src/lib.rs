//! Remote identity and storage access for GraphXfer.
//!
//! This module provides trait-based interfaces for the two remote
//! capabilities the transfer workflow needs (principal lookup and drive
//! object storage), a Microsoft Graph implementation of both, and an
//! in-memory implementation for tests.
//!
//! # Design Principles
//! - Provider isolation: no Graph-specific logic in the transfer crate
//! - Async operations: all remote calls are async
//! - Streaming support: content moves as byte streams, not buffers

pub mod graph;
pub mod memory;
pub mod provider;

pub use graph::{ClientSecretCredential, GraphClient, StaticToken, TokenCredential};
pub use memory::{MemoryGraph, Operation, RemoteCall};
pub use provider::{ByteStream, Drive, DriveItem, IdentityLookup, ObjectStore};
