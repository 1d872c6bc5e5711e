//! Capability traits for the remote identity directory and object store.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use graphxfer_common::{DriveId, ObjectId, PrincipalName, Result};

/// Byte stream type for upload/download operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Storage root owned by an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    /// Drive identifier.
    pub id: DriveId,
    /// Provider-reported drive type (e.g. "business", "personal").
    pub drive_type: Option<String>,
}

/// A file object as confirmed by the store after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItem {
    /// Store-assigned object identifier, unique within the drive.
    pub id: ObjectId,
    /// Remote-confirmed name. May differ from the requested name.
    pub name: String,
    /// Size in bytes as reported by the store.
    pub size: u64,
}

/// Lookup of directory principals.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Resolve a principal name to its opaque object identifier.
    ///
    /// Implementations request only the identifier field. Resolution has no
    /// side effects on the store.
    ///
    /// # Errors
    /// - `NotFound` when no principal matches
    /// - `Transport` / `Authentication` when the call itself fails
    async fn lookup_principal(&self, principal: &PrincipalName) -> Result<ObjectId>;
}

/// Drive-scoped object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the default drive owned by a resolved identity.
    async fn user_drive(&self, owner: &ObjectId) -> Result<Drive>;

    /// Create or replace the object `name` at the drive root from a stream.
    ///
    /// # Preconditions
    /// - `content_length` is the exact number of bytes `content` yields
    ///
    /// # Postconditions
    /// - Returns the item as confirmed by the store
    ///
    /// Overwrite semantics are those of the store. Nothing is cleaned up if
    /// the write fails part way.
    async fn put_content(
        &self,
        drive: &DriveId,
        name: &str,
        content: ByteStream,
        content_length: u64,
    ) -> Result<DriveItem>;

    /// Open a read stream over the content of an object.
    async fn get_content(&self, drive: &DriveId, item: &ObjectId) -> Result<ByteStream>;
}
