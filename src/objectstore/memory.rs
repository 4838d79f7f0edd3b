use crate::error::{Error, Result};
use crate::objectstore::{ObjectListing, RemoteObject};
use crate::ObjectStore;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// An in-memory implementation of the ObjectStore trait
///
/// Objects are kept in key order. Listings are paginated with the last key of a page
/// as the continuation token, the way a real bucket pages through its keys. Useful for
/// testing; nothing is persisted.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    /// Storage for objects: map of key -> object
    store: Arc<RwLock<BTreeMap<String, RemoteObject>>>,
    page_size: usize,
    gets: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Creates a new empty InMemoryObjectStore
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a store whose listings return at most `page_size` items per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: page_size.max(1),
            gets: AtomicUsize::new(0),
        }
    }

    /// Adds or replaces an object
    pub fn put(&self, object: RemoteObject) -> Result<()> {
        let mut store = self
            .store
            .write()
            .map_err(|_| Error::ObjectStore("object store lock poisoned".into()))?;
        store.insert(object.key.clone(), object);
        Ok(())
    }

    /// Number of `get_object` calls served so far
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_objects(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing> {
        let store = self
            .store
            .read()
            .map_err(|_| Error::ObjectStore("object store lock poisoned".into()))?;

        let prefix = prefix.unwrap_or("");
        let mut matching = store
            .values()
            .filter(|o| o.key.starts_with(prefix))
            .filter(|o| continuation_token.map_or(true, |token| o.key.as_str() > token));

        let items: Vec<_> = matching
            .by_ref()
            .take(self.page_size)
            .map(RemoteObject::summary)
            .collect();

        let next_token = match (matching.next(), items.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };

        Ok(ObjectListing { items, next_token })
    }

    async fn get_object(&self, key: &str) -> Result<RemoteObject> {
        self.gets.fetch_add(1, Ordering::SeqCst);

        let store = self
            .store
            .read()
            .map_err(|_| Error::ObjectStore("object store lock poisoned".into()))?;

        store
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ObjectStore(format!("no such key: {}", key)))
    }
}
