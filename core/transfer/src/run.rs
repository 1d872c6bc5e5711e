//! One upload-then-download run.
//!
//! `Upload → Download → End` when the upload yields an object id, otherwise
//! `Upload → End` with the download skipped. Each stage returns a typed
//! error; the outcome maps it to a process exit code.

use std::path::Path;
use tracing::{error, info};

use graphxfer_common::Error;

use crate::service::{FileMetadata, TransferService};

/// File uploaded when none is given.
pub const DEFAULT_FILE_NAME: &str = "example.txt";

/// Prefix of the local name a downloaded object is saved under.
pub const DOWNLOAD_PREFIX: &str = "downloaded_";

/// Result of a run.
#[derive(Debug)]
pub enum RunOutcome {
    /// Upload and download both succeeded.
    Completed(FileMetadata),
    /// Upload failed; the download was skipped.
    UploadFailed(Error),
    /// Upload succeeded but the download failed.
    DownloadFailed { uploaded: FileMetadata, error: Error },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// Process exit code: 0 on success, the error's code otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(_) => 0,
            RunOutcome::UploadFailed(error) | RunOutcome::DownloadFailed { error, .. } => {
                error.exit_code()
            }
        }
    }
}

/// Local name for a downloaded copy of `metadata`.
pub fn download_name(metadata: &FileMetadata) -> String {
    format!("{}{}", DOWNLOAD_PREFIX, metadata.name())
}

/// Upload `file_name`, then download it back into `output_dir`.
pub async fn execute(service: &TransferService, file_name: &str, output_dir: &Path) -> RunOutcome {
    let uploaded = match service.upload_file(file_name).await {
        Ok(metadata) => metadata,
        Err(e) => {
            error!("An error occurred during file transfer: {}", e);
            info!("Upload did not produce a file id; skipping download");
            return RunOutcome::UploadFailed(e);
        }
    };

    let save_as = output_dir.join(download_name(&uploaded));
    match service.download_file(uploaded.id(), &save_as).await {
        Ok(bytes) => {
            info!(bytes, "Transfer of {} complete", uploaded.name());
            RunOutcome::Completed(uploaded.downloaded_to(save_as))
        }
        Err(e) => {
            error!("An error occurred during file transfer: {}", e);
            RunOutcome::DownloadFailed { uploaded, error: e }
        }
    }
}
