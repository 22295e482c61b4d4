//! In-memory stand-in for the external KV store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::nmap::{BackendError, KvAttribute, NmapBackend};

type Space = HashMap<[u8; 8], Vec<KvAttribute>>;

/// A KV backend living entirely in process memory.
///
/// Supports injected failure: while `fail_ops(true)` is set, every operation
/// completes with an error, which is how the name map client's soft-failure
/// paths get exercised.
#[derive(Debug, Default)]
pub struct MemoryKv {
    spaces: Mutex<HashMap<String, Space>>,
    fail: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail until reset.
    pub fn fail_ops(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::new("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl NmapBackend for MemoryKv {
    async fn put(&self, space: &str, key: [u8; 8], attr: KvAttribute) -> Result<(), BackendError> {
        self.check()?;
        let mut spaces = self.spaces.lock();
        let object = spaces
            .entry(space.to_string())
            .or_default()
            .entry(key)
            .or_default();
        object.retain(|existing| existing.name != attr.name);
        object.push(attr);
        Ok(())
    }

    async fn get(&self, space: &str, key: [u8; 8]) -> Result<Vec<KvAttribute>, BackendError> {
        self.check()?;
        let spaces = self.spaces.lock();
        Ok(spaces
            .get(space)
            .and_then(|s| s.get(&key))
            .cloned()
            .unwrap_or_default())
    }

    async fn del(&self, space: &str, key: [u8; 8]) -> Result<bool, BackendError> {
        self.check()?;
        let mut spaces = self.spaces.lock();
        Ok(spaces
            .get_mut(space)
            .is_some_and(|s| s.remove(&key).is_some()))
    }

    async fn drop_space(&self, space: &str) -> Result<(), BackendError> {
        self.check()?;
        self.spaces.lock().remove(space);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_replaces_same_named_attribute() {
        let kv = MemoryKv::new();
        let key = 1u64.to_le_bytes();
        kv.put("s", key, KvAttribute::new("shard", vec![1])).await.unwrap();
        kv.put("s", key, KvAttribute::new("shard", vec![2])).await.unwrap();

        let attrs = kv.get("s", key).await.unwrap();
        assert_eq!(attrs, vec![KvAttribute::new("shard", vec![2])]);
    }

    #[tokio::test]
    async fn injected_failure_hits_every_op() {
        let kv = MemoryKv::new();
        kv.fail_ops(true);
        let key = 1u64.to_le_bytes();
        assert!(kv.put("s", key, KvAttribute::new("a", vec![])).await.is_err());
        assert!(kv.get("s", key).await.is_err());
        assert!(kv.del("s", key).await.is_err());
        assert!(kv.drop_space("s").await.is_err());
    }
}
