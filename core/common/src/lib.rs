//! Common utilities and types shared across GraphXfer crates.
//!
//! This module provides the error taxonomy and the identifier types that
//! flow between the credential, storage and transfer layers.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ClientSecret, DriveId, ObjectId, PrincipalName, ResolvedIdentity};
