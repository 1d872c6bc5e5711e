//! Graph-backed implementations of the capability traits.

use async_trait::async_trait;
use tracing::debug;

use graphxfer_common::{DriveId, Error, ObjectId, PrincipalName, Result};

use crate::provider::{ByteStream, Drive, DriveItem, IdentityLookup, ObjectStore};

use super::client::{GraphClient, GraphDrive, GraphDriveItem, GraphUser};

fn user_object_id(user: GraphUser, principal: &PrincipalName) -> Result<ObjectId> {
    match user.id {
        Some(id) if !id.is_empty() => ObjectId::new(id),
        _ => Err(Error::NotFound(format!(
            "No object id returned for principal '{}'",
            principal
        ))),
    }
}

fn to_drive(drive: GraphDrive) -> Result<Drive> {
    Ok(Drive {
        id: DriveId::new(drive.id)
            .map_err(|_| Error::Transport("Drive response has an empty id".to_string()))?,
        drive_type: drive.drive_type,
    })
}

fn to_drive_item(item: GraphDriveItem) -> Result<DriveItem> {
    Ok(DriveItem {
        id: ObjectId::new(item.id)
            .map_err(|_| Error::Transport("Upload response has an empty item id".to_string()))?,
        name: item.name,
        size: item.size.unwrap_or(0),
    })
}

#[async_trait]
impl IdentityLookup for GraphClient {
    async fn lookup_principal(&self, principal: &PrincipalName) -> Result<ObjectId> {
        let user = self.get_user_id(principal.as_str()).await?;
        user_object_id(user, principal)
    }
}

#[async_trait]
impl ObjectStore for GraphClient {
    async fn user_drive(&self, owner: &ObjectId) -> Result<Drive> {
        let drive = to_drive(self.get_user_drive(owner.as_str()).await?)?;
        debug!(owner = %owner, drive = %drive.id, "Fetched user drive");
        Ok(drive)
    }

    async fn put_content(
        &self,
        drive: &DriveId,
        name: &str,
        content: ByteStream,
        content_length: u64,
    ) -> Result<DriveItem> {
        if name.is_empty() {
            return Err(Error::InvalidInput("Item name cannot be empty".to_string()));
        }

        let item = self
            .put_root_content(drive.as_str(), name, content, content_length)
            .await?;
        to_drive_item(item)
    }

    async fn get_content(&self, drive: &DriveId, item: &ObjectId) -> Result<ByteStream> {
        self.get_item_content(drive.as_str(), item.as_str()).await
    }
}
