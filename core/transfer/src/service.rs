//! Upload and download against the target user's drive.

use futures::TryStreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};

use graphxfer_common::{Error, ObjectId, PrincipalName, Result};
use graphxfer_storage::{ByteStream, DriveItem, IdentityLookup, ObjectStore};

use crate::resolver::IdentityResolver;

/// Metadata of an uploaded file.
///
/// Only produced by a successful upload. Two values with the same `id`
/// refer to the same remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    name: String,
    id: ObjectId,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    downloaded_as: Option<PathBuf>,
}

impl FileMetadata {
    fn from_item(item: DriveItem) -> Self {
        Self {
            name: item.name,
            id: item.id,
            size: item.size,
            downloaded_as: None,
        }
    }

    /// Remote-confirmed file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote object id.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Size as reported by the store.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Local path the object was downloaded to, if any.
    pub fn downloaded_as(&self) -> Option<&Path> {
        self.downloaded_as.as_deref()
    }

    /// Copy of this metadata recording a local download.
    pub fn downloaded_to(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            downloaded_as: Some(path.into()),
            ..self.clone()
        }
    }

    /// Whether both values address the same remote object.
    pub fn same_object(&self, other: &FileMetadata) -> bool {
        self.id == other.id
    }
}

/// Transfer settings.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Directory upload sources are read from.
    pub source_dir: PathBuf,
    /// Principal whose drive is used.
    pub target_user: PrincipalName,
}

/// Orchestrates uploads and downloads for the configured target user.
pub struct TransferService {
    resolver: IdentityResolver,
    store: Arc<dyn ObjectStore>,
    settings: TransferSettings,
}

impl TransferService {
    pub fn new(
        lookup: Arc<dyn IdentityLookup>,
        store: Arc<dyn ObjectStore>,
        settings: TransferSettings,
    ) -> Self {
        info!("TargetUser from config: {}", settings.target_user);
        Self {
            resolver: IdentityResolver::new(lookup),
            store,
            settings,
        }
    }

    /// Upload `source_dir/local_file_name` to the root of the target user's drive.
    ///
    /// # Preconditions
    /// - The local file exists and is readable
    ///
    /// # Postconditions
    /// - A remote object named after the file is created or replaced
    /// - The local file handle is closed on every path
    ///
    /// # Errors
    /// - `FileNotFound` before any remote call if the source is absent
    /// - Resolver, drive lookup or write errors, unchanged
    ///
    /// A failed write is not cleaned up remotely.
    pub async fn upload_file(&self, local_file_name: &str) -> Result<FileMetadata> {
        let path = self.settings.source_dir.join(local_file_name);

        let local = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                warn!("File not found: {}", path.display());
                return Err(Error::FileNotFound(path));
            }
        };

        let remote_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidInput(format!("Not a valid file name: {}", local_file_name))
            })?
            .to_string();

        let file = File::open(&path).await?;

        let identity = self.resolver.resolve(&self.settings.target_user).await?;
        let drive = self.store.user_drive(&identity.object_id).await?;

        debug!(
            drive = %drive.id,
            drive_type = drive.drive_type.as_deref().unwrap_or("unknown"),
            bytes = local.len(),
            "Uploading {} to drive root",
            path.display()
        );

        let content: ByteStream = Box::pin(ReaderStream::new(file).map_err(Error::from));
        let item = self
            .store
            .put_content(&drive.id, &remote_name, content, local.len())
            .await?;

        info!("Uploaded file: {}", item.name);
        Ok(FileMetadata::from_item(item))
    }

    /// Download a remote object from the target user's drive to `save_as`.
    ///
    /// Returns the number of bytes written. The local file is only created
    /// once the remote stream is open; if the copy fails afterwards the
    /// partial file is left in place.
    ///
    /// # Errors
    /// - Resolver, drive lookup or content errors, unchanged
    /// - `Io` if the local file cannot be written
    pub async fn download_file(
        &self,
        remote_object_id: &ObjectId,
        save_as: impl AsRef<Path>,
    ) -> Result<u64> {
        let save_as = save_as.as_ref();

        let identity = self.resolver.resolve(&self.settings.target_user).await?;
        let drive = self.store.user_drive(&identity.object_id).await?;
        let content = self.store.get_content(&drive.id, remote_object_id).await?;
        let mut reader = StreamReader::new(content.map_err(std::io::Error::other));

        let mut file = File::create(save_as).await?;

        // Flush even when the copy fails so the partial file is on disk
        // once this returns.
        let copied = tokio::io::copy(&mut reader, &mut file).await;
        let flushed = file.flush().await;
        let written = copied.map_err(copy_error)?;
        flushed?;

        info!("Downloaded file as: {}", save_as.display());
        Ok(written)
    }
}

/// Recover the remote error a content stream failed with, if any.
fn copy_error(err: std::io::Error) -> Error {
    if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        if let Some(inner) = err.into_inner() {
            if let Ok(remote) = inner.downcast::<Error>() {
                return *remote;
            }
        }
        return Error::Transport("Content stream failed".to_string());
    }
    Error::Io(err)
}
