//! Memo cache for backend state objects
//!
//! Entries are built on first use and kept for the lifetime of the device. The
//! key space (shaders x render states x outputs, or texture sets) stays small
//! over a session, so nothing is evicted.

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Cache of lazily built backend objects
#[derive(Debug)]
pub struct StateCache<K, V> {
    entries: FxHashMap<K, V>,
    misses: u64,
}

impl<K, V> Default for StateCache<K, V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            misses: 0,
        }
    }
}

impl<K: Hash + Eq, V> StateCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, building it with `create` on a miss
    ///
    /// A failed build caches nothing.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        create: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<&V, E> {
        use std::collections::hash_map::Entry;

        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let value = create(entry.key())?;
                self.misses += 1;
                Ok(entry.insert(value))
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries ever built
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Drop the entries for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;
    use crate::shader::Shader;
    use crate::state::{BlendMode, RenderState, StencilMode};
    use crate::variant::PipelineKey;
    use std::convert::Infallible;

    #[test]
    fn identical_keys_share_one_entry() {
        let mut cache: StateCache<PipelineKey<u8>, usize> = StateCache::new();
        let mut built = 0;
        let mut build = |_: &PipelineKey<u8>| -> Result<usize, Infallible> {
            built += 1;
            Ok(built)
        };

        let mut batch = Batch::new(
            Shader::PathSolid,
            RenderState::new(false, true, BlendMode::SrcOver, StencilMode::Disabled, false),
        );
        let first = *cache
            .get_or_try_insert_with(PipelineKey::for_batch(&batch, 0), &mut build)
            .unwrap();
        let again = *cache
            .get_or_try_insert_with(PipelineKey::for_batch(&batch, 0), &mut build)
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(cache.len(), 1);

        batch.stencil_ref = 1;
        let other = *cache
            .get_or_try_insert_with(PipelineKey::for_batch(&batch, 0), &mut build)
            .unwrap();
        assert_ne!(first, other);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn failed_build_caches_nothing() {
        let mut cache: StateCache<u8, u8> = StateCache::new();
        let result = cache.get_or_try_insert_with(1, |_| Err("backend refused"));
        assert_eq!(result, Err("backend refused"));
        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn retain_drops_matching_entries() {
        let mut cache: StateCache<u8, ()> = StateCache::new();
        for key in 0..6 {
            cache
                .get_or_try_insert_with(key, |_| Ok::<_, Infallible>(()))
                .unwrap();
        }
        cache.retain(|key| key % 2 == 0);
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&4));
        assert!(!cache.contains(&5));
    }
}
