use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Key/value store abstraction for small, disposable records.
pub trait KeyValueStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn upsert(&self, key: K, value: V);
    fn remove(&self, key: &K) -> Option<V>;
    /// All values in key order.
    fn list(&self) -> Vec<V>;

    /// Insert `value` under `key` unless some entry satisfies `conflicts`,
    /// as one step. `Err` carries the first conflicting value, `Ok` the
    /// value previously stored under `key`.
    fn upsert_unless(&self, key: K, value: V, conflicts: &dyn Fn(&K, &V) -> bool) -> Result<Option<V>, V>;
}

impl<K, V, S> KeyValueStore<K, V> for Arc<S>
where
    S: KeyValueStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) {
        (**self).upsert(key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        (**self).remove(key)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn upsert_unless(&self, key: K, value: V, conflicts: &dyn Fn(&K, &V) -> bool) -> Result<Option<V>, V> {
        (**self).upsert_unless(key, value, conflicts)
    }
}

/// In-memory store for tests/dev.
#[derive(Debug)]
pub struct InMemoryStore<K, V> {
    inner: RwLock<BTreeMap<K, V>>,
}

impl<K, V> InMemoryStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyValueStore<K, V> for InMemoryStore<K, V>
where
    K: Clone + Ord + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        self.inner.read().ok()?.get(key).cloned()
    }

    fn upsert(&self, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key, value);
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().ok()?.remove(key)
    }

    fn list(&self) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn upsert_unless(&self, key: K, value: V, conflicts: &dyn Fn(&K, &V) -> bool) -> Result<Option<V>, V> {
        let Ok(mut map) = self.inner.write() else {
            return Err(value);
        };
        if let Some((_, existing)) = map.iter().find(|(k, v)| conflicts(k, v)) {
            return Err(existing.clone());
        }
        Ok(map.insert(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_unless_checks_and_inserts_together() {
        let store: InMemoryStore<u32, &str> = InMemoryStore::new();
        assert_eq!(store.upsert_unless(1, "a", &|_, v| *v == "a"), Ok(None));
        assert_eq!(store.upsert_unless(2, "a", &|_, v| *v == "a"), Err("a"));
        assert_eq!(store.upsert_unless(1, "b", &|k, v| *k != 1 && *v == "b"), Ok(Some("a")));
        assert_eq!(store.list(), vec!["b"]);
    }
}
