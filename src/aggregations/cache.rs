use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::composed::Composed;

/// Per-record-instance cache of composed values, keyed by property name.
///
/// Lives inside the owning record and is dropped with it. Not thread-safe:
/// records holding a cache are `!Send` and `!Sync`.
#[derive(Default)]
pub struct AggregationCache {
    entries: RefCell<HashMap<String, Rc<dyn Any>>>,
}

impl AggregationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `name` if it holds a `Composed<V>`.
    pub fn get<V: 'static>(&self, name: &str) -> Option<Rc<Composed<V>>> {
        let entry = self.entries.borrow().get(name).cloned()?;
        entry.downcast::<Composed<V>>().ok()
    }

    pub fn insert<V: 'static>(&self, name: &str, value: Rc<Composed<V>>) {
        self.entries.borrow_mut().insert(name.to_string(), value);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.borrow_mut().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for AggregationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        let mut names: Vec<&String> = entries.keys().collect();
        names.sort();
        f.debug_struct("AggregationCache")
            .field("entries", &names)
            .finish()
    }
}
