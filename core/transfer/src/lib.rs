//! Identity resolution and upload/download orchestration for GraphXfer.
//!
//! The transfer layer only talks to the remote side through the
//! `IdentityLookup` and `ObjectStore` traits, so every workflow here can be
//! exercised against `MemoryGraph` without a network.

pub mod config;
pub mod resolver;
pub mod run;
pub mod service;

pub use config::{AppConfig, Settings};
pub use resolver::IdentityResolver;
pub use run::{download_name, execute, RunOutcome, DEFAULT_FILE_NAME};
pub use service::{FileMetadata, TransferService, TransferSettings};
