//! In-memory directory and object store for testing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use graphxfer_common::{DriveId, Error, ObjectId, PrincipalName, Result};

use crate::provider::{ByteStream, Drive, DriveItem, IdentityLookup, ObjectStore};

/// Remote operation kinds, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    LookupPrincipal,
    UserDrive,
    PutContent,
    GetContent,
}

/// A remote call as observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    LookupPrincipal(String),
    UserDrive(ObjectId),
    PutContent { drive: DriveId, name: String },
    GetContent { drive: DriveId, item: ObjectId },
}

impl RemoteCall {
    fn operation(&self) -> Operation {
        match self {
            RemoteCall::LookupPrincipal(_) => Operation::LookupPrincipal,
            RemoteCall::UserDrive(_) => Operation::UserDrive,
            RemoteCall::PutContent { .. } => Operation::PutContent,
            RemoteCall::GetContent { .. } => Operation::GetContent,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: ObjectId,
    name: String,
    data: Bytes,
}

#[derive(Default)]
struct State {
    principals: HashMap<String, ObjectId>,
    drives: HashMap<ObjectId, DriveId>,
    items: HashMap<DriveId, Vec<StoredItem>>,
    next_item: u64,
    calls: Vec<RemoteCall>,
    failing: HashSet<Operation>,
    reported_size: Option<u64>,
    download_cutoff: Option<usize>,
}

/// In-memory stand-in for the directory and drive APIs.
///
/// Item ids are assigned sequentially (`F1`, `F2`, ...). Every call is
/// recorded so tests can assert which remote operations happened.
#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    /// Create an empty directory with no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal owning a drive.
    pub fn with_user(self, principal: &str, object_id: &str, drive_id: &str) -> Result<Self> {
        let object_id = ObjectId::new(object_id)?;
        let drive_id = DriveId::new(drive_id)?;
        {
            let mut state = self.lock();
            state
                .principals
                .insert(principal.to_string(), object_id.clone());
            state.drives.insert(object_id, drive_id.clone());
            state.items.entry(drive_id).or_default();
        }
        Ok(self)
    }

    /// Make every call of the given kind fail with a transport error.
    pub fn fail_on(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    /// Report this size for uploads instead of the received byte count.
    pub fn report_size(&self, size: u64) {
        self.lock().reported_size = Some(size);
    }

    /// Break download streams after `bytes` bytes.
    pub fn fail_downloads_after(&self, bytes: usize) {
        self.lock().download_cutoff = Some(bytes);
    }

    /// Calls observed so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of calls observed so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Stored content of an item, if present.
    pub fn content(&self, drive: &DriveId, item: &ObjectId) -> Option<Bytes> {
        self.lock()
            .items
            .get(drive)
            .and_then(|items| items.iter().find(|i| &i.id == item))
            .map(|i| i.data.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and apply injected failures.
    fn record(&self, call: RemoteCall) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        let operation = call.operation();
        state.calls.push(call);
        if state.failing.contains(&operation) {
            return Err(Error::Transport(format!("Injected failure for {:?}", operation)));
        }
        Ok(state)
    }
}

#[async_trait]
impl IdentityLookup for MemoryGraph {
    async fn lookup_principal(&self, principal: &PrincipalName) -> Result<ObjectId> {
        let state = self.record(RemoteCall::LookupPrincipal(principal.to_string()))?;
        state
            .principals
            .get(principal.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Principal '{}' does not exist", principal)))
    }
}

#[async_trait]
impl ObjectStore for MemoryGraph {
    async fn user_drive(&self, owner: &ObjectId) -> Result<Drive> {
        let state = self.record(RemoteCall::UserDrive(owner.clone()))?;
        let id = state
            .drives
            .get(owner)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No drive for object '{}'", owner)))?;

        Ok(Drive {
            id,
            drive_type: Some("business".to_string()),
        })
    }

    async fn put_content(
        &self,
        drive: &DriveId,
        name: &str,
        mut content: ByteStream,
        _content_length: u64,
    ) -> Result<DriveItem> {
        drop(self.record(RemoteCall::PutContent {
            drive: drive.clone(),
            name: name.to_string(),
        })?);

        let mut data = Vec::new();
        while let Some(chunk) = content.next().await {
            data.extend_from_slice(&chunk?);
        }

        let mut state = self.lock();
        if !state.items.contains_key(drive) {
            return Err(Error::NotFound(format!("Drive '{}' does not exist", drive)));
        }

        let size = state.reported_size.unwrap_or(data.len() as u64);
        let existing = state.items[drive]
            .iter()
            .position(|i| i.name == name);

        let id = match existing {
            Some(index) => {
                let items = state.items.entry(drive.clone()).or_default();
                items[index].data = Bytes::from(data);
                items[index].id.clone()
            }
            None => {
                state.next_item += 1;
                let id = ObjectId::new(format!("F{}", state.next_item))?;
                state.items.entry(drive.clone()).or_default().push(StoredItem {
                    id: id.clone(),
                    name: name.to_string(),
                    data: Bytes::from(data),
                });
                id
            }
        };

        Ok(DriveItem {
            id,
            name: name.to_string(),
            size,
        })
    }

    async fn get_content(&self, drive: &DriveId, item: &ObjectId) -> Result<ByteStream> {
        let state = self.record(RemoteCall::GetContent {
            drive: drive.clone(),
            item: item.clone(),
        })?;

        let data = state
            .items
            .get(drive)
            .and_then(|items| items.iter().find(|i| &i.id == item))
            .map(|i| i.data.clone())
            .ok_or_else(|| Error::NotFound(format!("Item '{}' not found in drive", item)))?;

        let stream: ByteStream = match state.download_cutoff {
            Some(cutoff) if cutoff < data.len() => Box::pin(stream::iter(vec![
                Ok(data.slice(..cutoff)),
                Err(Error::Transport("Connection reset during download".to_string())),
            ])),
            _ => Box::pin(stream::iter(
                data.chunks(4)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect::<Vec<_>>(),
            )),
        };

        Ok(stream)
    }
}
