use crate::domain::native::NativeHandle;
use std::collections::BTreeMap;

pub struct CacheEntry<D> {
    pub handle: NativeHandle,
    /// The descriptor as last applied to the native object.
    pub descriptor: D,
}

/// Entity id to live native handle, for one map instance.
pub struct ReconciliationCache<D> {
    entries: BTreeMap<String, CacheEntry<D>>,
}

impl<D> Default for ReconciliationCache<D> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<D> ReconciliationCache<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CacheEntry<D>> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CacheEntry<D>> {
        self.entries.get_mut(id)
    }

    pub fn handle(&self, id: &str) -> Option<&NativeHandle> {
        self.entries.get(id).map(|entry| &entry.handle)
    }

    pub fn insert(&mut self, id: impl Into<String>, handle: NativeHandle, descriptor: D) {
        self.entries.insert(id.into(), CacheEntry { handle, descriptor });
    }

    pub fn remove(&mut self, id: &str) -> Option<CacheEntry<D>> {
        self.entries.remove(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry<D>)> {
        self.entries.iter()
    }

    /// Empties the cache, handing back every entry for disposal.
    pub fn drain(&mut self) -> Vec<(String, CacheEntry<D>)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::headless::HeadlessMap;
    use crate::domain::model::ProviderId;
    use crate::domain::native::{NativeObject, UpdateGuard};
    use crate::domain::ports::NativeMap;
    use std::rc::Rc;

    fn handle(id: &str) -> NativeHandle {
        let map: Rc<dyn NativeMap> = HeadlessMap::shared(ProviderId::Google);
        NativeHandle::marker(id, map, NativeObject::from_raw(1), UpdateGuard::default(), Rc::new(|_| {}))
    }

    #[test]
    fn test_insert_remove_and_drain() {
        let mut cache = ReconciliationCache::new();
        cache.insert("b", handle("b"), 2);
        cache.insert("a", handle("a"), 1);
        assert_eq!(cache.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.get("a").map(|e| e.descriptor), Some(1));

        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        assert!(!cache.contains("a"));

        let drained = cache.drain();
        assert_eq!(drained.len(), 1);
        assert!(cache.is_empty());
    }
}
