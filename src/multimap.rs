use std::{
    borrow::Borrow,
    collections::{btree_map, BTreeMap},
    fmt::{self, Debug},
};

/// A map whose value is an insertion-ordered bucket of values.
///
/// Unlike a set-valued multimap, repeated values are kept: pushing the same
/// value twice under one key yields a bucket of length two. Keys iterate in
/// sorted order.
#[derive(Clone)]
pub struct MultiMap<K, V> {
    inner: BTreeMap<K, Vec<V>>,
}

#[allow(dead_code)] // This is a core library-ish struct, unused stuff is ok
impl<K: Ord, V> MultiMap<K, V> {
    pub fn new() -> Self {
        MultiMap {
            inner: BTreeMap::new(),
        }
    }

    pub fn get<Q: ?Sized>(&self, k: &Q) -> &[V]
    where
        K: Borrow<Q>,
        Q: Ord,
    {
        self.inner.get(k).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key<Q: ?Sized>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord,
    {
        self.inner.contains_key(k)
    }

    pub fn push(&mut self, k: K, v: V) {
        self.inner.entry(k).or_default().push(v);
    }

    pub fn keys(&self) -> btree_map::Keys<'_, K, Vec<V>> {
        self.inner.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, Vec<V>> {
        self.inner.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Total number of values across every bucket.
    pub fn value_count(&self) -> usize {
        self.inner.values().map(Vec::len).sum()
    }
}

impl<K: Debug, V: Debug> Debug for MultiMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(formatter)
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for MultiMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K: Eq, V: Eq> Eq for MultiMap<K, V> {}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
        }
    }
}

impl<K: Ord, V> IntoIterator for MultiMap<K, V> {
    type IntoIter = MultiMapIntoIter<K, V>;
    type Item = (K, Vec<V>);
    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            inner: self.inner.into_iter(),
        }
    }
}

pub struct MultiMapIntoIter<K, V> {
    inner: btree_map::IntoIter<K, Vec<V>>,
}

impl<K, V> Iterator for MultiMapIntoIter<K, V> {
    type Item = (K, Vec<V>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
