use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::resource::{ObjectRef, ResourceEvent, ResourceUpdate, StoredResource};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where bundle resources live.
///
/// Updates are optimistic: an update whose `resource_version` is not the
/// current one fails with [`StoreError::Conflict`] and must be retried
/// against a fresh read.
pub trait ResourceStore: Send + Sync {
    fn get<'a>(
        &'a self,
        object: &'a ObjectRef,
    ) -> BoxFuture<'a, Result<StoredResource, StoreError>>;

    fn list(&self) -> BoxFuture<'_, Result<Vec<StoredResource>, StoreError>>;

    /// Replace `status` (and `spec` when given). Returns the new snapshot.
    fn update(&self, update: ResourceUpdate) -> BoxFuture<'_, Result<StoredResource, StoreError>>;
}

/// In-process store with watch-style change notification.
///
/// Every change, from the operator or from [`MemoryStore::apply`], is sent
/// to all subscribers as a [`ResourceEvent`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    objects: HashMap<ObjectRef, StoredResource>,
    last_version: u64,
    subscribers: Vec<mpsc::UnboundedSender<ResourceEvent>>,
}

impl MemoryInner {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn publish(&mut self, event: ResourceEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    pub fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<ResourceEvent>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()?.subscribers.push(tx);
        Ok(rx)
    }

    /// Create a resource or replace its spec, as a user edit would.
    /// The status of an existing resource is kept.
    pub fn apply(&self, object: ObjectRef, spec: Option<Value>) -> Result<StoredResource, StoreError> {
        let mut inner = self.lock()?;
        let resource_version = inner.next_version();
        let status = inner.objects.get(&object).and_then(|r| r.status.clone());
        let stored = StoredResource {
            object: object.clone(),
            resource_version,
            spec,
            status,
        };
        inner.objects.insert(object, stored.clone());
        inner.publish(ResourceEvent::changed(stored.clone()));
        Ok(stored)
    }

    pub fn delete(&self, object: &ObjectRef) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let removed = inner.objects.remove(object).ok_or_else(|| StoreError::NotFound {
            resource: object.to_string(),
        })?;
        inner.publish(ResourceEvent {
            resource: removed,
            deleted: true,
        });
        Ok(())
    }

    /// Point-in-time copy of every stored resource, sorted by key.
    pub fn snapshot(&self) -> Result<Vec<StoredResource>, StoreError> {
        let inner = self.lock()?;
        let mut all: Vec<_> = inner.objects.values().cloned().collect();
        all.sort_by(|a, b| {
            (&a.object.namespace, &a.object.name).cmp(&(&b.object.namespace, &b.object.name))
        });
        Ok(all)
    }
}

impl ResourceStore for MemoryStore {
    fn get<'a>(
        &'a self,
        object: &'a ObjectRef,
    ) -> BoxFuture<'a, Result<StoredResource, StoreError>> {
        Box::pin(async move {
            self.lock()?
                .objects
                .get(object)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    resource: object.to_string(),
                })
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<StoredResource>, StoreError>> {
        Box::pin(async move { self.snapshot() })
    }

    fn update(&self, update: ResourceUpdate) -> BoxFuture<'_, Result<StoredResource, StoreError>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let current = inner
                .objects
                .get(&update.object)
                .ok_or_else(|| StoreError::NotFound {
                    resource: update.object.to_string(),
                })?;
            if current.resource_version != update.resource_version {
                return Err(StoreError::Conflict {
                    resource: update.object.to_string(),
                    expected: update.resource_version,
                    actual: current.resource_version.clone(),
                });
            }

            let spec = match update.spec {
                Some(spec) => Some(spec),
                None => current.spec.clone(),
            };
            let resource_version = inner.next_version();
            let stored = StoredResource {
                object: update.object.clone(),
                resource_version,
                spec,
                status: Some(update.status),
            };
            inner.objects.insert(update.object, stored.clone());
            inner.publish(ResourceEvent::changed(stored.clone()));
            Ok(stored)
        })
    }
}
