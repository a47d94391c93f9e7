//! Concurrent key store and the entry creation protocol
//!
//! Existing keys are served through their entry's own lock only. Unbound keys
//! go through a single store-wide creation lock with a double check, so that
//! exactly one entry is ever created per key while unrelated keys proceed in
//! parallel.

use crate::entry::{Entry, Kind};
use crate::error::{PolyVaultError, Result};
use crate::protocol::Request;
use crate::router::Router;
use dashmap::DashMap;
use serde_json::Value as Json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

/// Thread-safe mapping from key to its bound entry.
///
/// Entries are inserted once and never removed or replaced.
#[derive(Debug, Default)]
pub struct KeyStore {
    entries: DashMap<String, Arc<Entry>>,
    creation_lock: Mutex<()>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the entry bound to `key` without touching the creation lock.
    pub fn lookup(&self, key: &str) -> Option<Arc<Entry>> {
        // Clone out of the shard guard so it is never held across an await.
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Execute `request` against its key, creating the entry if needed.
    ///
    /// The first operation on a new entry runs while both the creation lock
    /// and the entry lock are held, so no other connection can observe the key
    /// bound but not yet initialized.
    pub async fn execute(&self, router: &Router, request: &Request) -> Result<Json> {
        loop {
            if let Some(entry) = self.lookup(&request.key) {
                let mut value = entry.lock().await;
                return value.apply(&request.op, &request.args);
            }

            let kind = router.resolve(&request.op).ok_or(PolyVaultError::NoSuchKey)?;

            let _creation = self.creation_lock.lock().await;
            if self.entries.contains_key(&request.key) {
                trace!(key = %request.key, op = %request.op, "lost creation race, retrying");
                continue;
            }

            let entry = Arc::new(Entry::new(request.key.clone(), kind));
            let mut value = entry.lock().await;
            self.entries.insert(request.key.clone(), Arc::clone(&entry));
            trace!(key = %request.key, %kind, "created entry");
            return value.apply(&request.op, &request.args);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Variant `key` is bound to, if it is bound at all.
    pub fn kind_of(&self, key: &str) -> Option<Kind> {
        self.entries.get(key).map(|entry| entry.kind())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn request(op: &str, key: &str, args: &[&str]) -> Request {
        Request {
            op: op.to_string(),
            key: key.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_first_operation_creates_entry() {
        let store = KeyStore::new();
        let router = Router::new();
        assert!(store.is_empty());

        let result = store.execute(&router, &request("rpush", "q", &["a"])).await.unwrap();
        assert_eq!(result, json!(["a"]));
        assert_eq!(store.kind_of("q"), Some(Kind::List));

        store.execute(&router, &request("rpush", "q", &["b"])).await.unwrap();
        let result = store.execute(&router, &request("lpop", "q", &[])).await.unwrap();
        assert_eq!(result, json!("a"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_allocates_nothing() {
        let store = KeyStore::new();
        let router = Router::new();

        let err = store
            .execute(&router, &request("frobnicate", "k", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, PolyVaultError::NoSuchKey));
        assert!(!store.contains("k"));
        assert!(store.lookup("never-referenced").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_binding_never_changes() {
        let store = KeyStore::new();
        let router = Router::new();

        store.execute(&router, &request("set", "s", &["hi"])).await.unwrap();
        let err = store
            .execute(&router, &request("lpush", "s", &["x"]))
            .await
            .unwrap_err();
        assert!(err.is_operation_failure());
        assert_eq!(store.kind_of("s"), Some(Kind::String));

        let result = store.execute(&router, &request("get", "s", &[])).await.unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn test_failed_first_operation_keeps_binding() {
        let store = KeyStore::new();
        let router = Router::new();

        let err = store
            .execute(&router, &request("zrange", "z", &["a", "b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PolyVaultError::InvalidArgument(_)));
        assert_eq!(store.kind_of("z"), Some(Kind::SortedSet));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_creators_produce_one_entry() {
        let store = Arc::new(KeyStore::new());
        let router = Arc::new(Router::new());
        let mut handles = vec![];

        for i in 0..64 {
            let store = Arc::clone(&store);
            let router = Arc::clone(&router);
            handles.push(tokio::spawn(async move {
                let value = format!("v{}", i);
                store
                    .execute(&router, &request("rpush", "shared", &[value.as_str()]))
                    .await
                    .unwrap()
            }));
        }

        let mut lengths = HashSet::new();
        for handle in handles {
            let list = handle.await.unwrap();
            lengths.insert(list.as_array().unwrap().len());
        }

        // Every push observed a distinct length: no lost updates.
        assert_eq!(lengths, (1..=64).collect::<HashSet<usize>>());
        assert_eq!(store.len(), 1);

        let mut drained = HashSet::new();
        while let Json::String(v) = store
            .execute(&router, &request("lpop", "shared", &[]))
            .await
            .unwrap()
        {
            drained.insert(v);
        }
        assert_eq!(drained.len(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_creators_queued_behind_creation_lock_retry_onto_winner() {
        let store = Arc::new(KeyStore::new());
        let router = Arc::new(Router::new());

        // Every creator sees the key unbound and queues on the creation lock.
        let creation = store.creation_lock.lock().await;
        let mut handles = vec![];
        for i in 0..3 {
            let store = Arc::clone(&store);
            let router = Arc::clone(&router);
            handles.push(tokio::spawn(async move {
                let value = format!("v{}", i);
                store
                    .execute(&router, &request("rpush", "queued", &[value.as_str()]))
                    .await
                    .unwrap()
            }));
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(store.is_empty());
        drop(creation);

        let mut lists = vec![];
        for handle in handles {
            lists.push(handle.await.unwrap());
        }
        lists.sort_by_key(|list| list.as_array().map(Vec::len).unwrap_or(0));

        let lengths: Vec<usize> = lists.iter().map(|l| l.as_array().unwrap().len()).collect();
        assert_eq!(lengths, vec![1, 2, 3]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.kind_of("queued"), Some(Kind::List));

        let members: HashSet<&str> = lists[2]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(members, HashSet::from(["v0", "v1", "v2"]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_keys_proceed_while_one_entry_is_locked() {
        let store = Arc::new(KeyStore::new());
        let router = Router::new();

        store.execute(&router, &request("set", "busy", &["x"])).await.unwrap();
        store.execute(&router, &request("set", "free", &["y"])).await.unwrap();

        let busy = store.lookup("busy").unwrap();
        let _held = busy.lock().await;

        // Neither the fast path on another key nor creating a new key waits on "busy".
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.execute(&router, &request("append", "free", &["z"])),
        )
        .await
        .expect("fast path blocked by unrelated entry lock")
        .unwrap();
        assert_eq!(result, json!("yz"));

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.execute(&router, &request("sadd", "fresh", &["m"])),
        )
        .await
        .expect("creation blocked by unrelated entry lock")
        .unwrap();
        assert_eq!(result, json!(true));
    }
}
