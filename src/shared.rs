use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    channel::EventReceiver,
    descriptor::Descriptor,
    event::{ChangeEvent, EventKind},
    index::{FolderIndex, FolderRef, KeyKind},
};

/// Shared handle to a [`FolderIndex`].
///
/// Every query takes the read lock for its duration, so queries run
/// alongside each other. [`SharedIndex::apply`] is the only way to mutate
/// the index and takes the write lock.
#[derive(Debug, Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<FolderIndex>>,
}

/// Counts reported by [`SharedIndex::stats`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub root: PathBuf,
    pub folders: usize,
    pub next_id: u64,
    pub contracts: usize,
    pub phones: usize,
    pub addresses: usize,
}

impl SharedIndex {
    pub fn new(index: FolderIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FolderIndex> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FolderIndex> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one change event.
    ///
    /// A new folder's descriptor is read before the write lock is taken, so
    /// readers only wait for the in-memory update. Blocks on file I/O.
    pub fn apply(&self, event: &ChangeEvent) -> bool {
        let name = event.folder_name.as_str();
        match event.event {
            EventKind::New => {
                let path = {
                    let index = self.read();
                    if index.contains(name) {
                        return false;
                    }
                    index.root().join(name)
                };
                let descriptor = Descriptor::read_from_dir(&path);
                self.write().add_with_descriptor(name, descriptor).is_some()
            }
            EventKind::Del => self.write().remove(name).is_some(),
        }
    }

    pub fn search_partial(&self, query: &str) -> Vec<FolderRef> {
        self.read().search_partial(query)
    }

    pub fn search_by_key(&self, query: &str, kind: KeyKind) -> Vec<FolderRef> {
        self.read().search_by_key(query, kind)
    }

    pub fn search_by_key_name(
        &self,
        query: &str,
        kind: &str,
    ) -> Vec<FolderRef> {
        self.read().search_by_key_name(query, kind)
    }

    pub fn get_files(&self, id: u64) -> Option<Vec<PathBuf>> {
        self.read().get_files(id)
    }

    pub fn get_images(&self, id: u64) -> Option<Vec<PathBuf>> {
        self.read().get_images(id)
    }

    pub fn read_descriptor(&self, id: u64) -> Option<Descriptor> {
        self.read().read_descriptor(id)
    }

    pub fn folder_name(&self, id: u64) -> Option<String> {
        self.read().get(id).map(|record| record.name.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let index = self.read();
        IndexStats {
            root: index.root().to_path_buf(),
            folders: index.len(),
            next_id: index.next_id(),
            contracts: index.secondary(KeyKind::Contract).key_count(),
            phones: index.secondary(KeyKind::Phone).key_count(),
            addresses: index.secondary(KeyKind::Address).key_count(),
        }
    }
}

/// Drain `events` into `index`, one event at a time, until the channel
/// closes. This is the index's single writer.
///
/// Each event is applied on the blocking pool, since applying it may read
/// from disk. The next event is not taken until the previous one is done.
pub async fn consume_events(mut events: EventReceiver, index: SharedIndex) {
    while let Some(event) = events.recv().await {
        let writer = index.clone();
        let applied = tokio::task::spawn_blocking(move || {
            let changed = writer.apply(&event);
            (event, changed)
        })
        .await;

        match applied {
            Ok((event, changed)) => tracing::debug!(
                kind = ?event.event,
                folder = %event.folder_name,
                changed,
                "applied folder change"
            ),
            Err(e) => tracing::warn!("failed to apply folder change: {e}"),
        }
    }
    tracing::debug!("event channel closed, consumer exiting");
}
