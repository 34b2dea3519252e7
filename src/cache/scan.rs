//! Scan-shaped collection of weakly-owned entities.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Small collection searched linearly by a logical key.
///
/// Dead entries are dropped during every scan instead of by a separate
/// sweep.
pub struct WeakList<T> {
    entries: Mutex<Vec<Weak<T>>>,
}

impl<T> Default for WeakList<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> WeakList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// First live entry matching `pred`.
    pub fn find<P>(&self, mut pred: P) -> Option<Arc<T>>
    where
        P: FnMut(&T) -> bool,
    {
        let mut found = None;
        self.entries.lock().retain(|weak| match weak.upgrade() {
            Some(entity) => {
                if found.is_none() && pred(&entity) {
                    found = Some(entity);
                }
                true
            }
            None => false,
        });
        found
    }

    /// Live entry matching `pred`, or the one produced by `create`,
    /// decided under a single lock so racing callers agree.
    ///
    /// The flag is `true` when the entry was created.
    pub fn find_or_insert_with<P, F, E>(&self, mut pred: P, create: F) -> Result<(Arc<T>, bool), E>
    where
        P: FnMut(&T) -> bool,
        F: FnOnce() -> Result<Arc<T>, E>,
    {
        let mut entries = self.entries.lock();
        let mut found = None;
        entries.retain(|weak| match weak.upgrade() {
            Some(entity) => {
                if found.is_none() && pred(&entity) {
                    found = Some(entity);
                }
                true
            }
            None => false,
        });
        if let Some(existing) = found {
            return Ok((existing, false));
        }
        let created = create()?;
        entries.push(Arc::downgrade(&created));
        Ok((created, true))
    }

    pub fn push(&self, entity: &Arc<T>) {
        self.entries.lock().push(Arc::downgrade(entity));
    }

    /// Remove every entry matching `pred`, returning the live ones removed.
    pub fn remove_where<P>(&self, mut pred: P) -> Vec<Arc<T>>
    where
        P: FnMut(&T) -> bool,
    {
        let mut removed = Vec::new();
        self.entries.lock().retain(|weak| match weak.upgrade() {
            Some(entity) if pred(&entity) => {
                removed.push(entity);
                false
            }
            Some(_) => true,
            None => false,
        });
        removed
    }

    /// Snapshot of every live entry.
    pub fn live(&self) -> Vec<Arc<T>> {
        let mut live = Vec::new();
        self.entries.lock().retain(|weak| match weak.upgrade() {
            Some(entity) => {
                live.push(entity);
                true
            }
            None => false,
        });
        live
    }

    /// Number of stored entries, dead ones included until the next scan.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T> std::fmt::Debug for WeakList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakList").field("len", &self.len()).finish()
    }
}
