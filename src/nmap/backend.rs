//! The KV store surface the name map is built on.

use std::sync::Arc;

use async_trait::async_trait;
use snafu::Snafu;

/// One attribute of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvAttribute {
    pub name: String,
    pub value: Vec<u8>,
}

impl KvAttribute {
    pub fn new(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Error from a single KV operation.
///
/// The store is external; all the client can do with a failure is log it and
/// degrade, so one transparent message is enough structure.
#[derive(Debug, Clone, Snafu)]
#[snafu(display("kv backend error: {message}"))]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Asynchronous client of the external KV store.
///
/// Each method is one submitted operation whose completion is its returned
/// future; the name map client pipelines batches by holding many of these
/// futures in flight at once. Keys are raw 8-byte values, matching the
/// store's fixed-width key encoding.
#[async_trait]
pub trait NmapBackend: Send + Sync {
    /// Write one attribute of the object at `key`.
    async fn put(
        &self,
        space: &str,
        key: [u8; 8],
        attr: KvAttribute,
    ) -> Result<(), BackendError>;

    /// All attributes of the object at `key`; empty if the key is absent.
    async fn get(&self, space: &str, key: [u8; 8]) -> Result<Vec<KvAttribute>, BackendError>;

    /// Delete the object at `key`. Returns whether it existed.
    async fn del(&self, space: &str, key: [u8; 8]) -> Result<bool, BackendError>;

    /// Administrative drop of an entire space.
    async fn drop_space(&self, space: &str) -> Result<(), BackendError>;
}

#[async_trait]
impl<B: NmapBackend + ?Sized> NmapBackend for Arc<B> {
    async fn put(&self, space: &str, key: [u8; 8], attr: KvAttribute) -> Result<(), BackendError> {
        (**self).put(space, key, attr).await
    }

    async fn get(&self, space: &str, key: [u8; 8]) -> Result<Vec<KvAttribute>, BackendError> {
        (**self).get(space, key).await
    }

    async fn del(&self, space: &str, key: [u8; 8]) -> Result<bool, BackendError> {
        (**self).del(space, key).await
    }

    async fn drop_space(&self, space: &str) -> Result<(), BackendError> {
        (**self).drop_space(space).await
    }
}
